//! A crate to read and credit contactless stored-value cards through an APDU transport.

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod apdu;
pub mod card;
pub mod cryptogram;
pub mod error;
pub mod layout;
pub mod nfc;
pub mod nonce;
pub mod session;

pub use card::Card;
pub use cryptogram::Cryptogram;
pub use error::Error;
pub use layout::{CardLayout, CardRecord};
pub use session::{CardSession, Failure, Phase, SessionState};
