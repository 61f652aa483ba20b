//! Communicating with the card using NFC technology

/// Errors reported by the transport while delivering a command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("No card is connected")]
    NotConnected,

    #[error("Timed out")]
    Timeout,

    #[error("The card was disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// A delegate to communicate with the card outside
pub trait Transport {
    /// Transmits the encoded command.
    /// Implementations must deliver the octets to the card through a reader,
    /// then return the raw response including the status word.
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl<T> Transport for &T
where
    T: Transport + ?Sized,
{
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).transmit(command)
    }
}

impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    fn transmit(&self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).transmit(command)
    }
}
