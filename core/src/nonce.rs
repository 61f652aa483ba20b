//! Session nonces.

use std::num::NonZeroUsize;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Length of the reader and card nonces exchanged by the protocol.
pub const NONCE_LEN: usize = 8;

/// A source of cryptographically secure random octets.
pub trait NonceSource {
    /// Generates exactly `length` random octets.
    fn generate(&self, length: NonZeroUsize) -> Result<Vec<u8>>;
}

/// Nonce source backed by the operating system CSPRNG.
pub struct SystemNonceSource {
    rng: SystemRandom,
}

impl SystemNonceSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemNonceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceSource for SystemNonceSource {
    fn generate(&self, length: NonZeroUsize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length.get()];

        self.rng
            .fill(&mut buf)
            .map_err(|_| Error::RandomnessUnavailable)?;

        Ok(buf)
    }
}

impl<T> NonceSource for &T
where
    T: NonceSource + ?Sized,
{
    fn generate(&self, length: NonZeroUsize) -> Result<Vec<u8>> {
        (**self).generate(length)
    }
}

/// A single-use nonce. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Draws a fresh nonce from the source.
    /// A source returning anything but [`NONCE_LEN`] octets is treated as unavailable.
    pub fn generate(source: &impl NonceSource) -> Result<Self> {
        let length = NonZeroUsize::new(NONCE_LEN).ok_or(Error::RandomnessUnavailable)?;
        let mut buf = source.generate(length)?;

        let nonce = match <[u8; NONCE_LEN]>::try_from(buf.as_slice()) {
            Ok(bytes) => Ok(Self(bytes)),
            Err(_) => Err(Error::RandomnessUnavailable),
        };

        buf.zeroize();
        nonce
    }

    /// Takes a nonce sent by the card. The payload must be the nonce and nothing else.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < NONCE_LEN {
            return Err(Error::PayloadTooShort {
                end: NONCE_LEN,
                len: payload.len(),
            });
        }

        <[u8; NONCE_LEN]>::try_from(payload)
            .map(Self)
            .map_err(|_| Error::UnexpectedPayloadLength {
                expected: NONCE_LEN,
                actual: payload.len(),
            })
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Nonce(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<u8>);

    impl NonceSource for FixedSource {
        fn generate(&self, _: NonZeroUsize) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl NonceSource for BrokenSource {
        fn generate(&self, _: NonZeroUsize) -> Result<Vec<u8>> {
            Err(Error::RandomnessUnavailable)
        }
    }

    #[test]
    fn test_generate_exact_length() {
        let source = SystemNonceSource::new();

        for n in [1, 2, 7, 8, 16, 32, 255, 1024] {
            let bytes = source.generate(NonZeroUsize::new(n).unwrap()).unwrap();
            assert_eq!(n, bytes.len());
        }
    }

    #[test]
    fn test_consecutive_nonces_differ() {
        let source = SystemNonceSource::new();

        let a = Nonce::generate(&source).unwrap();
        let b = Nonce::generate(&source).unwrap();

        assert_ne!(a, b);
        assert_ne!(&[0u8; NONCE_LEN], a.as_bytes());
    }

    #[test]
    fn test_short_source_output_is_rejected() {
        assert_eq!(
            Err(Error::RandomnessUnavailable),
            Nonce::generate(&FixedSource(vec![0x01; 7])),
        );
        assert_eq!(
            Err(Error::RandomnessUnavailable),
            Nonce::generate(&FixedSource(vec![0x01; 9])),
        );
    }

    #[test]
    fn test_source_failure_propagates() {
        assert_eq!(
            Err(Error::RandomnessUnavailable),
            Nonce::generate(&BrokenSource),
        );
    }

    #[test]
    fn test_from_payload() {
        let payload = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11];
        assert_eq!(&payload, Nonce::from_payload(&payload).unwrap().as_bytes());

        assert_eq!(
            Err(Error::PayloadTooShort { end: 8, len: 4 }),
            Nonce::from_payload(&payload[..4]),
        );
        assert_eq!(
            Err(Error::UnexpectedPayloadLength {
                expected: 8,
                actual: 9
            }),
            Nonce::from_payload(&[0x00; 9]),
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let nonce = Nonce::from_payload(&[0xAB; 8]).unwrap();

        assert_eq!("Nonce(..)", format!("{:?}", nonce));
    }
}
