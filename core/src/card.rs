#[cfg(feature = "tracing")]
use tracing::debug;

use crate::apdu::Response;
use crate::error::Result;
use crate::nfc;

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

/// An adapter to communicate with the card through the delegate
pub struct Card<T>
where
    T: nfc::Transport,
{
    delegate: Box<T>,
}

impl<T> Card<T>
where
    T: nfc::Transport,
{
    /// Initiates an adapter with the delegate.
    pub fn new(delegate: Box<T>) -> Self {
        Self { delegate }
    }

    /// Sends an encoded command and parses the response.
    /// Only the header and the lengths are logged, the body may carry secrets.
    pub fn send(&self, command: &[u8]) -> Result<Response> {
        debug!(
            "TX: {} ({} octets)",
            hex::encode(command.get(..4).unwrap_or(command)),
            command.len(),
        );

        let rx = self.delegate.transmit(command)?;
        let response = Response::from_bytes(rx)?;

        debug!(
            "RX: {} octets, SW {:02X}{:02X}",
            response.payload().len(),
            response.trailer().0,
            response.trailer().1,
        );

        Ok(response)
    }

    /// Gives the delegate back.
    pub fn into_inner(self) -> Box<T> {
        self.delegate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::nfc::{Transport, TransportError};

    struct Echo(std::result::Result<Vec<u8>, TransportError>);

    impl Transport for Echo {
        fn transmit(&self, _: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_send() {
        let card = Card::new(Box::new(Echo(Ok(vec![0x01, 0x02, 0x90, 0x00]))));
        let response = card.send(&[0x00, 0x84, 0x00, 0x00, 0x02]).unwrap();

        assert_eq!(&[0x01, 0x02], response.payload());
        assert!(response.is_success());
    }

    #[test]
    fn test_send_truncated() {
        let card = Card::new(Box::new(Echo(Ok(vec![0x90]))));

        assert_eq!(
            Err(Error::TruncatedResponse { len: 1 }),
            card.send(&[0x00, 0x84, 0x00, 0x00, 0x08]),
        );
    }

    #[test]
    fn test_send_transport_errors() {
        let card = Card::new(Box::new(Echo(Err(TransportError::Timeout))));
        assert_eq!(Err(Error::TransportTimeout), card.send(&[0x00]));

        let card = Card::new(Box::new(Echo(Err(TransportError::NotConnected))));
        assert_eq!(
            Err(Error::TransportRejected(TransportError::NotConnected)),
            card.send(&[0x00]),
        );
    }
}
