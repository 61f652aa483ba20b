//! The purse transaction: challenge, secure read and credit update.
//!
//! A [`CardSession`] drives exactly one transaction with one card. Each step sends a single
//! command and waits for its response before anything else happens; the session never has more
//! than one command outstanding. Any failure is terminal, and a terminated session refuses to
//! talk to the card again. Retrying means starting a new session with fresh nonces.
//!
//! ```rust,no_run
//! use purse::nfc::{Transport, TransportError};
//! use purse::{Card, CardSession, Cryptogram};
//!
//! struct Reader;
//!
//! impl Transport for Reader {
//!     fn transmit(&self, _command: &[u8]) -> Result<Vec<u8>, TransportError> {
//!         // Hand the octets to the contactless reader here.
//!         Err(TransportError::NotConnected)
//!     }
//! }
//!
//! let card = Card::new(Box::new(Reader));
//! let mut session = CardSession::new();
//!
//! let record = session
//!     .run(&card, |record| {
//!         println!("Balance: {}", record.balance);
//!         Some(Cryptogram::from([0u8; 32]))
//!     })
//!     .unwrap();
//! ```

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::apdu::{commands, Command, Response};
use crate::card::Card;
use crate::cryptogram::Cryptogram;
use crate::error::Error;
use crate::layout::{CardLayout, CardRecord};
use crate::nfc::Transport;
use crate::nonce::{Nonce, NonceSource, SystemNonceSource};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($t: tt)*) => {};
}

/// State of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ChallengeSent,

    /// Holds the nonce the card answered with.
    ChallengeOk(Nonce),

    SecureReadSent,
    SecureReadOk(CardRecord),
    CreditUpdateSent,
    Completed,
    Failed(Error),
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        use SessionState::*;

        match self {
            Idle => Phase::Idle,
            ChallengeSent => Phase::ChallengeSent,
            ChallengeOk(_) => Phase::ChallengeOk,
            SecureReadSent => Phase::SecureReadSent,
            SecureReadOk(_) => Phase::SecureReadOk,
            CreditUpdateSent => Phase::CreditUpdateSent,
            Completed => Phase::Completed,
            Failed(_) => Phase::Failed,
        }
    }
}

/// Name of a [`SessionState`] without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    ChallengeSent,
    ChallengeOk,
    SecureReadSent,
    SecureReadOk,
    CreditUpdateSent,
    Completed,
    Failed,
}

impl Phase {
    /// Whether the session can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::ChallengeSent => "ChallengeSent",
            Phase::ChallengeOk => "ChallengeOk",
            Phase::SecureReadSent => "SecureReadSent",
            Phase::SecureReadOk => "SecureReadOk",
            Phase::CreditUpdateSent => "CreditUpdateSent",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        };

        f.write_str(name)
    }
}

/// An error paired with the phase the session was in when it occurred.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{error} (in {phase})")]
pub struct Failure {
    pub phase: Phase,
    pub error: Error,
}

/// A handle to cancel a session from another thread.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One transaction with one card.
pub struct CardSession<N = SystemNonceSource>
where
    N: NonceSource,
{
    nonce_source: N,
    layout: CardLayout,
    state: SessionState,
    reader_nonce: Option<Nonce>,

    /// The record once the session has moved past `SecureReadOk`.
    record: Option<CardRecord>,

    cancellation: Cancellation,
}

impl CardSession {
    /// Creates a session using the system CSPRNG and the standard card layout.
    pub fn new() -> Self {
        Self::with_layout(CardLayout::standard())
    }

    /// Creates a session using the system CSPRNG and the layout.
    pub fn with_layout(layout: CardLayout) -> Self {
        Self::with_nonce_source(SystemNonceSource::new(), layout)
    }
}

impl Default for CardSession {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> CardSession<N>
where
    N: NonceSource,
{
    pub fn with_nonce_source(nonce_source: N, layout: CardLayout) -> Self {
        Self {
            nonce_source,
            layout,
            state: SessionState::Idle,
            reader_nonce: None,
            record: None,
            cancellation: Cancellation::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// The record read from the card, once the secure read succeeded.
    pub fn record(&self) -> Option<&CardRecord> {
        match &self.state {
            SessionState::SecureReadOk(record) => Some(record),
            _ => self.record.as_ref(),
        }
    }

    /// Consumes the session, handing out the record if one was read.
    pub fn into_record(mut self) -> Option<CardRecord> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::SecureReadOk(record) => Some(record),
            _ => self.record.take(),
        }
    }

    /// Returns a handle to cancel this session.
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Generates the reader nonce and sends the challenge.
    /// The returned response is to be passed to [`Self::on_challenge_response`].
    pub fn begin<T>(&mut self, card: &Card<T>) -> Result<Response, Failure>
    where
        T: Transport,
    {
        self.expect(Phase::Idle)?;

        let reader_nonce = Nonce::generate(&self.nonce_source).map_err(|e| self.fail(e))?;
        self.reader_nonce = Some(reader_nonce);

        self.exchange(card, commands::challenge(), SessionState::ChallengeSent)
    }

    /// Takes the card nonce from the challenge response.
    pub fn on_challenge_response(&mut self, response: Response) -> Result<(), Failure> {
        self.expect(Phase::ChallengeSent)?;
        self.check_cancelled()?;

        if !response.is_success() {
            return Err(self.fail(response.trailer().into()));
        }

        let card_nonce = Nonce::from_payload(response.payload()).map_err(|e| self.fail(e))?;
        self.transition(SessionState::ChallengeOk(card_nonce));

        Ok(())
    }

    /// Reads the purse and assembles the [`CardRecord`].
    pub fn continue_secure_read<T>(&mut self, card: &Card<T>) -> Result<&CardRecord, Failure>
    where
        T: Transport,
    {
        let card_nonce = match &self.state {
            SessionState::ChallengeOk(nonce) => nonce.clone(),
            _ => return Err(self.refuse(Phase::ChallengeOk)),
        };
        self.check_cancelled()?;
        let reader_nonce = self.reader_nonce()?;

        let response = self.exchange(
            card,
            commands::secure_read(&reader_nonce),
            SessionState::SecureReadSent,
        )?;

        let record = self
            .layout
            .extract(response.payload(), &reader_nonce, &card_nonce)
            .map_err(|e| self.fail(e))?;

        self.transition(SessionState::SecureReadOk(record));

        self.retained()
    }

    /// Credits the purse. The card acknowledges with the status word only.
    pub fn continue_credit_update<T>(
        &mut self,
        card: &Card<T>,
        cryptogram: &Cryptogram,
    ) -> Result<(), Failure>
    where
        T: Transport,
    {
        self.expect(Phase::SecureReadOk)?;
        self.check_cancelled()?;
        let reader_nonce = self.reader_nonce()?;

        self.exchange(
            card,
            commands::credit_update(&reader_nonce, cryptogram),
            SessionState::CreditUpdateSent,
        )?;

        self.complete();

        Ok(())
    }

    /// Ends a read-only session after the secure read, handing back the record.
    pub fn finish(&mut self) -> Result<&CardRecord, Failure> {
        self.expect(Phase::SecureReadOk)?;
        self.check_cancelled()?;
        self.complete();

        self.retained()
    }

    /// Fails the session on behalf of the caller, e.g. when the transport lost the card.
    pub fn abort(&mut self, reason: Error) -> Result<(), Failure> {
        if self.phase().is_terminal() {
            return Err(self.refuse(Phase::Idle));
        }

        self.fail(reason);

        Ok(())
    }

    /// Challenges the card and reads the purse.
    pub fn read<T>(&mut self, card: &Card<T>) -> Result<&CardRecord, Failure>
    where
        T: Transport,
    {
        let response = self.begin(card)?;
        self.on_challenge_response(response)?;

        self.continue_secure_read(card)
    }

    /// Runs the whole transaction.
    /// `authorize` receives the record and returns the cryptogram to credit the purse with, or
    /// `None` to end the session after reading.
    pub fn run<T, F>(&mut self, card: &Card<T>, authorize: F) -> Result<&CardRecord, Failure>
    where
        T: Transport,
        F: FnOnce(&CardRecord) -> Option<Cryptogram>,
    {
        let cryptogram = authorize(self.read(card)?);

        match cryptogram {
            Some(cryptogram) => self.continue_credit_update(card, &cryptogram)?,
            None => {
                self.finish()?;
            }
        }

        self.retained()
    }

    /// Encodes and sends the command, then checks the status word.
    fn exchange<T>(
        &mut self,
        card: &Card<T>,
        command: Command,
        sent: SessionState,
    ) -> Result<Response, Failure>
    where
        T: Transport,
    {
        self.check_cancelled()?;
        let mut tx = command.into_bytes().map_err(|e| self.fail(e))?;

        self.transition(sent);
        let result = card.send(&tx);
        tx.zeroize();

        // Whatever came back is void once cancelled.
        self.check_cancelled()?;

        let response = result.map_err(|e| self.fail(e))?;
        if !response.is_success() {
            return Err(self.fail(response.trailer().into()));
        }

        Ok(response)
    }

    fn check_cancelled(&mut self) -> Result<(), Failure> {
        match self.cancellation.is_cancelled() {
            true => Err(self.fail(Error::Cancelled)),
            _ => Ok(()),
        }
    }

    fn retained(&self) -> Result<&CardRecord, Failure> {
        self.record().ok_or_else(|| self.refuse(Phase::SecureReadOk))
    }

    fn reader_nonce(&mut self) -> Result<Nonce, Failure> {
        match &self.reader_nonce {
            Some(nonce) => Ok(nonce.clone()),
            None => Err(self.fail(Error::OutOfSequence {
                expected: Phase::ChallengeOk,
                actual: Phase::Idle,
            })),
        }
    }

    /// Checks the phase before an operation, without touching the state.
    fn expect(&self, expected: Phase) -> Result<(), Failure> {
        match self.phase() == expected {
            true => Ok(()),
            _ => Err(self.refuse(expected)),
        }
    }

    fn refuse(&self, expected: Phase) -> Failure {
        let phase = self.phase();
        let error = match phase.is_terminal() {
            true => Error::SessionAlreadyTerminated,
            _ => Error::OutOfSequence {
                expected,
                actual: phase,
            },
        };

        Failure { phase, error }
    }

    /// Moves to the state. The record outlives `SecureReadOk` in `self.record`.
    fn transition(&mut self, state: SessionState) {
        debug!("Session: {} -> {}", self.phase(), state.phase());

        if let SessionState::SecureReadOk(record) = std::mem::replace(&mut self.state, state) {
            self.record = Some(record);
        }
    }

    fn complete(&mut self) {
        self.reader_nonce = None;
        self.transition(SessionState::Completed);
    }

    fn fail(&mut self, error: Error) -> Failure {
        let phase = self.phase();
        warn!("Session failed in {}: {}", phase, error);

        self.reader_nonce = None;
        self.record = None;
        self.state = SessionState::Failed(error.clone());

        Failure { phase, error }
    }
}
