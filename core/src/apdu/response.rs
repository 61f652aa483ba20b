use crate::apdu::SW_SUCCESS;
use crate::error::{Error, Result};

/// An response that was received from the card
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    payload: Vec<u8>,
    trailer: (u8, u8),
}

impl Response {
    /// Creates a response from its parts.
    pub fn new(payload: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self {
            payload,
            trailer: (sw1, sw2),
        }
    }

    /// Parses a response from the octets.
    /// The last two octets are the status word and everything before them is the payload.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::TruncatedResponse { len: bytes.len() });
        }

        let trailer = bytes.split_off(bytes.len() - 2);

        Ok(Self {
            payload: bytes,
            trailer: (trailer[0], trailer[1]),
        })
    }

    /// Determines whether the response indicates success or not.
    pub fn is_success(&self) -> bool {
        self.trailer == SW_SUCCESS
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// SW1 and SW2.
    pub fn trailer(&self) -> (u8, u8) {
        self.trailer
    }

    /// Converts the response to a result of octets.
    pub fn into_result(self) -> Result<Vec<u8>> {
        let is_success = self.is_success();
        let Self { payload, trailer } = self;

        match is_success {
            true => Ok(payload),
            _ => Err(trailer.into()),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("payload_len", &self.payload.len())
            .field("sw", &format_args!("{:02X}{:02X}", self.trailer.0, self.trailer.1))
            .finish()
    }
}
