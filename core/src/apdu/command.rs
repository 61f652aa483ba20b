use crate::error::{Error, Result};

/// An APDU command to be transmitted.
///
/// A command is built from an immutable template (CLA, INS, P1, P2, the
/// declared body length and a fixed body prefix), then the variable fields
/// are appended right before sending.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    lc: Option<u8>,
    payload: Vec<u8>,
    le: Option<u8>,
}

impl Command {
    /// Constructs an command with CLA, INS, P1, and P2.
    /// No payloads will be transmitted or received.
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            lc: None,
            payload: Vec::new(),
            le: None,
        }
    }

    /// Constructs an command with CLA, INS, P1, P2, and Le.
    /// A payload will be received.
    pub fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            le: Some(le),
            ..Self::new(cla, ins, p1, p2)
        }
    }

    /// Constructs an command with CLA, INS, P1, P2, the declared body length, the fixed prefix
    /// of the body, and Le. The rest of the body must be appended before encoding.
    pub fn new_with_payload_le(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        lc: u8,
        prefix: &[u8],
        le: u8,
    ) -> Self {
        Self {
            lc: Some(lc),
            payload: prefix.to_vec(),
            le: Some(le),
            ..Self::new(cla, ins, p1, p2)
        }
    }

    /// Appends a variable field to the body.
    pub fn append(mut self, field: &[u8]) -> Self {
        self.payload.extend_from_slice(field);
        self
    }

    /// CLA, INS, P1 and P2 of the command.
    pub fn header(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Length of the encoded command, as declared by the template.
    pub fn encoded_len(&self) -> usize {
        4 + self.lc.map_or(0, |lc| 1 + lc as usize) + self.le.map_or(0, |_| 1)
    }

    /// Converts the command into octets.
    /// Fails if the assembled body does not match the declared length; nothing is truncated or
    /// padded.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let expected_len = self.encoded_len();
        let Self {
            cla,
            ins,
            p1,
            p2,
            lc,
            mut payload,
            le,
        } = self;

        let declared = lc.map_or(0, |lc| lc as usize);
        if payload.len() != declared {
            return Err(Error::MalformedCommand {
                expected: declared,
                actual: payload.len(),
            });
        }

        let mut buffer: Vec<u8> = Vec::with_capacity(expected_len);
        buffer.extend_from_slice(&[cla, ins, p1, p2]);
        if let Some(lc) = lc {
            buffer.push(lc);
            buffer.append(&mut payload);
        }

        if let Some(l) = le {
            buffer.push(l);
        }

        Ok(buffer)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The body carries nonces and cryptograms.
        f.debug_struct("Command")
            .field("header", &hex::encode(self.header()))
            .field("lc", &self.lc)
            .field("body_len", &self.payload.len())
            .field("le", &self.le)
            .finish()
    }
}
