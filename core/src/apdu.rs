//! ISO/IEC 7816-4 command and response encoding.

pub mod commands;

mod command;
mod response;

pub use command::Command;
pub use response::Response;

/// The only status word recognised as success.
pub const SW_SUCCESS: (u8, u8) = (0x90, 0x00);
