//! Authorization cryptogram for the credit update.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

pub const CRYPTOGRAM_LEN: usize = 32;

/// An opaque cryptogram computed by an external authorization service.
/// The octets are forwarded to the card as they are.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Cryptogram([u8; CRYPTOGRAM_LEN]);

impl Cryptogram {
    /// The fragment sent first in the credit update.
    pub fn leading_fragment(&self) -> &[u8] {
        &self.0[16..32]
    }

    /// The fragment sent after the leading one.
    pub fn trailing_fragment(&self) -> &[u8] {
        &self.0[8..16]
    }
}

impl From<[u8; CRYPTOGRAM_LEN]> for Cryptogram {
    fn from(bytes: [u8; CRYPTOGRAM_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Cryptogram {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        <[u8; CRYPTOGRAM_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::MalformedCommand {
                expected: CRYPTOGRAM_LEN,
                actual: bytes.len(),
            })
    }
}

impl std::fmt::Debug for Cryptogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cryptogram(..)")
    }
}
