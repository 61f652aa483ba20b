//! Field extraction from the secure-read payload.
//!
//! Every field lives at a fixed octet range of the payload. The ranges differ slightly between
//! card generations, so they are kept in a [`CardLayout`] table rather than hard-coded into the
//! session.

use std::ops::Range;

use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::nonce::Nonce;

/// Slices `payload[start..end]`, failing instead of padding when the payload is shorter.
pub fn extract_range(payload: &[u8], start: usize, end: usize) -> Result<&[u8]> {
    if start > end {
        return Err(Error::InvalidRange { start, end });
    }

    if end > payload.len() {
        return Err(Error::PayloadTooShort {
            end,
            len: payload.len(),
        });
    }

    Ok(&payload[start..end])
}

/// Decodes a big-endian unsigned integer of one to four octets.
pub fn read_be_uint(bytes: &[u8]) -> Result<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(Error::InvalidNumber { len: bytes.len() });
    }

    Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// A piece of the session data that is handed to the credit update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Fixed octets defined by the protocol.
    Constant(&'static [u8]),

    /// Octets copied from the secure-read payload.
    Payload(Range<usize>),

    ReaderNonce,
    CardNonce,
}

const SESSION_DATA: &[Segment] = &[
    Segment::Constant(&[0x00, 0x00]),
    Segment::Payload(8..24),
    Segment::ReaderNonce,
    Segment::CardNonce,
    Segment::Constant(&[0x00, 0x00, 0x00, 0x00]),
    Segment::Payload(1..5),
    Segment::Payload(28..40),
    Segment::Payload(42..62),
    Segment::Payload(63..64),
    Segment::Payload(94..111),
];

/// Offsets of the purse fields in the secure-read payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardLayout {
    pub balance: Range<usize>,
    pub card_number: Range<usize>,
    pub max_balance: Range<usize>,
    pub session_data: &'static [Segment],
}

impl CardLayout {
    /// Layout of the current card generation.
    pub fn standard() -> Self {
        Self {
            balance: 2..5,
            card_number: 8..16,
            max_balance: 78..81,
            session_data: SESSION_DATA,
        }
    }

    /// Layout used by earlier readers, where the balance is two octets wide.
    pub fn legacy() -> Self {
        Self {
            balance: 3..5,
            ..Self::standard()
        }
    }

    /// Smallest payload that carries every field of this layout.
    pub fn min_payload_len(&self) -> usize {
        self.session_data
            .iter()
            .filter_map(|segment| match segment {
                Segment::Payload(range) => Some(range.end),
                _ => None,
            })
            .chain([
                self.balance.end,
                self.card_number.end,
                self.max_balance.end,
            ])
            .max()
            .unwrap_or(0)
    }

    /// Extracts the fields from the payload and assembles the session data with the nonces.
    pub fn extract(
        &self,
        payload: &[u8],
        reader_nonce: &Nonce,
        card_nonce: &Nonce,
    ) -> Result<CardRecord> {
        extract_range(payload, 0, self.min_payload_len())?;

        let balance = read_be_uint(self.field(payload, &self.balance)?)?;
        let max_balance = read_be_uint(self.field(payload, &self.max_balance)?)?;
        let card_number = self.field(payload, &self.card_number)?.to_vec();

        let mut session_data = Vec::new();
        for segment in self.session_data {
            match segment {
                Segment::Constant(bytes) => session_data.extend_from_slice(bytes),
                Segment::Payload(range) => {
                    session_data.extend_from_slice(self.field(payload, range)?)
                }
                Segment::ReaderNonce => session_data.extend_from_slice(reader_nonce.as_bytes()),
                Segment::CardNonce => session_data.extend_from_slice(card_nonce.as_bytes()),
            }
        }

        Ok(CardRecord {
            card_number,
            balance,
            max_balance,
            purse: payload.to_vec(),
            session_data,
        })
    }

    fn field<'a>(&self, payload: &'a [u8], range: &Range<usize>) -> Result<&'a [u8]> {
        extract_range(payload, range.start, range.end)
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// Purse information read from the card.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CardRecord {
    #[cfg_attr(feature = "serde", serde(with = "hex"))]
    pub card_number: Vec<u8>,
    pub balance: u32,
    pub max_balance: u32,

    /// The secure-read payload as received.
    #[cfg_attr(feature = "serde", serde(with = "hex"))]
    pub purse: Vec<u8>,

    /// Carries both nonces, so it never leaves the process through serialization.
    #[cfg_attr(feature = "serde", serde(skip))]
    session_data: Vec<u8>,
}

impl CardRecord {
    pub fn card_number_hex(&self) -> String {
        hex::encode(&self.card_number)
    }

    /// Fields and nonces interleaved in the order the credit authorization expects.
    pub fn session_data(&self) -> &[u8] {
        &self.session_data
    }
}

impl Drop for CardRecord {
    fn drop(&mut self) {
        self.session_data.zeroize();
    }
}

impl std::fmt::Debug for CardRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardRecord")
            .field("card_number", &self.card_number_hex())
            .field("balance", &self.balance)
            .field("max_balance", &self.max_balance)
            .field("purse_len", &self.purse.len())
            .finish_non_exhaustive()
    }
}
