use crate::nfc::TransportError;
use crate::session::Phase;

/// Errors occurred while talking to the purse.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Secure random number generator is unavailable")]
    RandomnessUnavailable,

    #[error("Malformed command: expected {expected} octets, got {actual}")]
    MalformedCommand { expected: usize, actual: usize },

    #[error("Response is too short to carry a status word ({len} octets)")]
    TruncatedResponse { len: usize },

    #[error("Payload is too short: field ends at {end}, payload has {len} octets")]
    PayloadTooShort { end: usize, len: usize },

    #[error("Invalid field range {start}..{end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Unexpected payload length: expected {expected} octets, got {actual}")]
    UnexpectedPayloadLength { expected: usize, actual: usize },

    #[error("Numeric field of {len} octets cannot be decoded")]
    InvalidNumber { len: usize },

    #[error("The card returned an error ({sw1:#04X}, {sw2:#04X})")]
    StatusError { sw1: u8, sw2: u8 },

    #[error("The transport rejected the command: {0}")]
    TransportRejected(TransportError),

    #[error("The transport timed out waiting for the card")]
    TransportTimeout,

    #[error("The session was cancelled")]
    Cancelled,

    #[error("The session has already terminated")]
    SessionAlreadyTerminated,

    #[error("Operation expects the session in {expected}, but it is in {actual}")]
    OutOfSequence { expected: Phase, actual: Phase },
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => Error::TransportTimeout,
            e => Error::TransportRejected(e),
        }
    }
}

impl From<(u8, u8)> for Error {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Error::StatusError { sw1, sw2 }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
