//! PC/SC support for purse library.
//! Can be enabled by turning `pcsc` feature on.
//!
//! ## What is PC/SC?
//! PC/SC (Personal Computer/Smart Card) is an abstraction layer for communicating with Smart Cards
//! from desktops. Most contactless USB readers are exposed through it, so the purse can be read
//! without depending on a specific reader driver. Windows and macOS supports PC/SC by themselves,
//! Linux also supports by installing pcsc-lite shared library.
//!
//! ## Usage
//! ```rust,no_run
//! use purse::pcsc::Context;
//! use purse::{Card, CardSession};
//!
//! let ctx = Context::try_new().unwrap();
//! let device = ctx.open(None).unwrap();
//! let pcsc_card = device.connect(&ctx).unwrap();
//!
//! let card = Card::new(Box::new(pcsc_card));
//! let mut session = CardSession::new();
//! let record = session.read(&card).unwrap();
//! ```

use std::ffi::{CStr, CString};
use std::thread::sleep;
use std::time::Duration;

use pcsc::{Card, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::nfc::{Transport, TransportError};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {};
}

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// PC/SC context.
pub struct Context {
    ctx: pcsc::Context,
}

impl Context {
    /// Creates a PC/SC context in user scope.
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            ctx: pcsc::Context::establish(Scope::User).map_err(Error::PcscError)?,
        })
    }

    /// Lists the names of the readers attached.
    pub fn readers(&self) -> Result<Vec<String>> {
        let mut buf = [0u8; 2048];

        Ok(self
            .ctx
            .list_readers(&mut buf)
            .map_err(Error::PcscError)?
            .map(|reader| reader.to_string_lossy().into_owned())
            .collect())
    }

    /// Finds a PC/SC device, then opens a connection to them.
    /// Picks the first reader whose name contains `name`, or the first reader if omitted.
    pub fn open(&self, name: Option<&str>) -> Result<Device> {
        let mut buf = [0u8; 2048];

        let reader = self
            .ctx
            .list_readers(&mut buf)
            .map_err(Error::PcscError)?
            .find(|reader| match name {
                Some(name) => reader.to_string_lossy().contains(name),
                None => true,
            })
            .ok_or(Error::ReaderNotFound)?;

        Ok(Device::new(reader))
    }
}

/// PC/SC device handle.
pub struct Device {
    reader: CString,
}

impl Device {
    fn new(reader: &CStr) -> Self {
        debug!("Using device: {}", reader.to_str().unwrap_or_default());

        Self {
            reader: reader.to_owned(),
        }
    }

    /// Connects to the card presented to the device after waiting them.
    pub fn connect(&self, ctx: &Context) -> Result<PcscCard> {
        // Waits for touching card, polling for each seconds.
        debug!("Waiting for a card");

        loop {
            match ctx
                .ctx
                .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            {
                Ok(card) => {
                    debug!("Connected to the card");

                    return Ok(PcscCard::new(card));
                }
                Err(e) => match e {
                    pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => {
                        info!("Still waiting for the card...");
                        sleep(POLL_INTERVAL);

                        continue;
                    }
                    _ => return Err(Error::PcscError(e)),
                },
            }
        }
    }
}

/// A card to be communicated through PC/SC.
pub struct PcscCard {
    card: Card,
}

impl PcscCard {
    fn new(card: Card) -> Self {
        Self { card }
    }
}

impl Transport for PcscCard {
    fn transmit(&self, command: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = self
            .card
            .transmit(command, &mut rx)
            .map_err(transport_error)?;

        Ok(Vec::from(rx))
    }
}

fn transport_error(e: pcsc::Error) -> TransportError {
    match e {
        pcsc::Error::NoSmartcard => TransportError::NotConnected,
        pcsc::Error::RemovedCard | pcsc::Error::ResetCard => TransportError::Disconnected,
        pcsc::Error::Timeout => TransportError::Timeout,
        e => TransportError::Other(e.to_string()),
    }
}
