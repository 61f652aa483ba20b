//! Commands understood by the purse application.

use crate::apdu::Command;
use crate::cryptogram::Cryptogram;
use crate::nonce::{Nonce, NONCE_LEN};

const CHALLENGE_CLA: u8 = 0x00;
const CHALLENGE_INS: u8 = 0x84;

const PURSE_CLA: u8 = 0x90;

const SECURE_READ_INS: u8 = 0x32;
const SECURE_READ_P1: u8 = 0x03;
const SECURE_READ_P2: u8 = 0x00;
const SECURE_READ_LC: u8 = 0x0A;
const SECURE_READ_PREFIX: [u8; 2] = [0x12, 0x01];
const SECURE_READ_LE: u8 = 0x00;

const CREDIT_UPDATE_INS: u8 = 0x36;
const CREDIT_UPDATE_P1: u8 = 0x14;
const CREDIT_UPDATE_P2: u8 = 0x01;
const CREDIT_UPDATE_LC: u8 = 0x25;
const CREDIT_UPDATE_PREFIX: [u8; 5] = [0x03, 0x14, 0x02, 0x14, 0x03];
const CREDIT_UPDATE_LE: u8 = 0x18;

/// `GET CHALLENGE`: asks the card for its nonce.
pub fn challenge() -> Command {
    Command::new_with_le(CHALLENGE_CLA, CHALLENGE_INS, 0x00, 0x00, NONCE_LEN as u8)
}

/// Reads the purse, binding the response to the reader nonce.
pub fn secure_read(reader_nonce: &Nonce) -> Command {
    Command::new_with_payload_le(
        PURSE_CLA,
        SECURE_READ_INS,
        SECURE_READ_P1,
        SECURE_READ_P2,
        SECURE_READ_LC,
        &SECURE_READ_PREFIX,
        SECURE_READ_LE,
    )
    .append(reader_nonce.as_bytes())
}

/// Credits the purse with the externally authorized cryptogram.
pub fn credit_update(reader_nonce: &Nonce, cryptogram: &Cryptogram) -> Command {
    Command::new_with_payload_le(
        PURSE_CLA,
        CREDIT_UPDATE_INS,
        CREDIT_UPDATE_P1,
        CREDIT_UPDATE_P2,
        CREDIT_UPDATE_LC,
        &CREDIT_UPDATE_PREFIX,
        CREDIT_UPDATE_LE,
    )
    .append(reader_nonce.as_bytes())
    .append(cryptogram.leading_fragment())
    .append(cryptogram.trailing_fragment())
}
