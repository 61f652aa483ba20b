use std::cell::RefCell;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

use purse::error::Error;
use purse::nfc::{Transport, TransportError};
use purse::nonce::{NonceSource, NONCE_LEN};
use purse::{Card, CardLayout, CardSession, Cryptogram, Failure, Phase, SessionState};

const CARD_NONCE: [u8; 8] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11];

type Reply = Result<Vec<u8>, TransportError>;

/// A card that answers from a script and remembers every command it received.
#[derive(Default)]
struct ScriptedCard {
    replies: RefCell<VecDeque<Reply>>,
    received: RefCell<Vec<Vec<u8>>>,
}

impl ScriptedCard {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            received: RefCell::default(),
        }
    }

    fn received(&self) -> Vec<Vec<u8>> {
        self.received.borrow().clone()
    }
}

impl Transport for ScriptedCard {
    fn transmit(&self, command: &[u8]) -> Reply {
        self.received.borrow_mut().push(command.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(TransportError::Disconnected))
    }
}

/// Counts up from a seed so every nonce is distinct but predictable.
struct CountingSource(RefCell<u8>);

impl NonceSource for CountingSource {
    fn generate(&self, length: NonZeroUsize) -> purse::error::Result<Vec<u8>> {
        let mut next = self.0.borrow_mut();
        let bytes = (0..length.get())
            .map(|i| next.wrapping_add(i as u8))
            .collect();
        *next = next.wrapping_add(length.get() as u8);

        Ok(bytes)
    }
}

fn success(mut payload: Vec<u8>) -> Reply {
    payload.extend_from_slice(&[0x90, 0x00]);
    Ok(payload)
}

fn purse_payload() -> Vec<u8> {
    let mut payload: Vec<u8> = (0..111).map(|i| i as u8).collect();
    payload[2..5].copy_from_slice(&[0x00, 0x04, 0xD2]);
    payload[78..81].copy_from_slice(&[0x00, 0x27, 0x10]);
    payload
}

fn session() -> CardSession<CountingSource> {
    CardSession::with_nonce_source(CountingSource(RefCell::new(0x40)), CardLayout::standard())
}

fn cryptogram() -> (Vec<u8>, Cryptogram) {
    let bytes: Vec<u8> = (0x80..0xA0).collect();
    let cryptogram = Cryptogram::try_from(bytes.as_slice()).unwrap();

    (bytes, cryptogram)
}

#[test]
fn test_end_to_end() {
    let script = ScriptedCard::new([
        success(CARD_NONCE.to_vec()),
        success(purse_payload()),
        success(vec![]),
    ]);
    let card = Card::new(Box::new(&script));
    let mut session = session();
    let (bytes, cryptogram) = cryptogram();

    let response = session.begin(&card).unwrap();
    session.on_challenge_response(response).unwrap();
    assert_eq!(Phase::ChallengeOk, session.phase());

    let record = session.continue_secure_read(&card).unwrap().clone();
    assert_eq!(Phase::SecureReadOk, session.phase());

    assert_eq!(hex::encode(&purse_payload()[8..16]), record.card_number_hex());
    assert_eq!(1234, record.balance);
    assert_eq!(10_000, record.max_balance);

    session.continue_credit_update(&card, &cryptogram).unwrap();
    assert_eq!(&SessionState::Completed, session.state());

    let reader_nonce: Vec<u8> = (0x40..0x48).collect();
    let received = script.received();
    assert_eq!(3, received.len());

    assert_eq!(vec![0x00, 0x84, 0x00, 0x00, 0x08], received[0]);

    let mut secure_read = vec![0x90, 0x32, 0x03, 0x00, 0x0A, 0x12, 0x01];
    secure_read.extend_from_slice(&reader_nonce);
    secure_read.push(0x00);
    assert_eq!(secure_read, received[1]);

    let mut credit_update = vec![0x90, 0x36, 0x14, 0x01, 0x25, 0x03, 0x14, 0x02, 0x14, 0x03];
    credit_update.extend_from_slice(&reader_nonce);
    credit_update.extend_from_slice(&bytes[16..32]);
    credit_update.extend_from_slice(&bytes[8..16]);
    credit_update.push(0x18);
    assert_eq!(credit_update, received[2]);

    // Session data carries both nonces right after the card identifier.
    assert_eq!(&reader_nonce[..], &record.session_data()[18..18 + NONCE_LEN]);
    assert_eq!(&CARD_NONCE[..], &record.session_data()[26..26 + NONCE_LEN]);
}

#[test]
fn test_run_with_authorization() {
    let script = ScriptedCard::new([
        success(CARD_NONCE.to_vec()),
        success(purse_payload()),
        success(vec![]),
    ]);
    let card = Card::new(Box::new(&script));
    let mut session = session();

    let record = session
        .run(&card, |record| {
            assert_eq!(92, record.session_data().len());
            Some(cryptogram().1)
        })
        .unwrap()
        .clone();

    assert_eq!(1234, record.balance);
    assert_eq!(Some(&record), session.record());
    assert_eq!(Phase::Completed, session.phase());
    assert_eq!(3, script.received().len());
}

#[test]
fn test_secure_read_rejected_stops_transaction() {
    let script = ScriptedCard::new([success(CARD_NONCE.to_vec()), Ok(vec![0x6A, 0x82])]);
    let card = Card::new(Box::new(&script));
    let mut session = session();
    let mut authorized = false;

    let failure = session
        .run(&card, |_| {
            authorized = true;
            Some(cryptogram().1)
        })
        .unwrap_err();

    assert_eq!(
        Failure {
            phase: Phase::SecureReadSent,
            error: Error::StatusError {
                sw1: 0x6A,
                sw2: 0x82
            },
        },
        failure,
    );
    assert_eq!(
        &SessionState::Failed(Error::StatusError {
            sw1: 0x6A,
            sw2: 0x82
        }),
        session.state(),
    );
    assert!(!authorized);

    // No credit update, not now and not later.
    assert_eq!(2, script.received().len());
    assert_eq!(
        Error::SessionAlreadyTerminated,
        session
            .continue_credit_update(&card, &cryptogram().1)
            .unwrap_err()
            .error,
    );
    assert_eq!(2, script.received().len());
}

#[test]
fn test_credit_update_rejected() {
    let script = ScriptedCard::new([
        success(CARD_NONCE.to_vec()),
        success(purse_payload()),
        Ok(vec![0x69, 0x82]),
    ]);
    let card = Card::new(Box::new(&script));
    let mut session = session();

    let failure = session
        .run(&card, |_| Some(cryptogram().1))
        .unwrap_err();

    let rejected = Error::StatusError {
        sw1: 0x69,
        sw2: 0x82,
    };
    assert_eq!(
        Failure {
            phase: Phase::CreditUpdateSent,
            error: rejected.clone(),
        },
        failure,
    );
    assert_eq!(&SessionState::Failed(rejected), session.state());
    assert!(session.record().is_none());

    assert_eq!(
        Error::SessionAlreadyTerminated,
        session
            .continue_credit_update(&card, &cryptogram().1)
            .unwrap_err()
            .error,
    );
    assert_eq!(
        Error::SessionAlreadyTerminated,
        session.finish().unwrap_err().error,
    );
    assert_eq!(3, script.received().len());
}

#[test]
fn test_short_purse_is_a_decode_failure() {
    let script = ScriptedCard::new([
        success(CARD_NONCE.to_vec()),
        success(purse_payload()[..81].to_vec()),
    ]);
    let card = Card::new(Box::new(&script));
    let mut session = session();

    let failure = session.read(&card).unwrap_err();

    assert_eq!(Phase::SecureReadSent, failure.phase);
    assert_eq!(Error::PayloadTooShort { end: 111, len: 81 }, failure.error);
    assert!(session.record().is_none());
}

#[test]
fn test_truncated_response() {
    let script = ScriptedCard::new([Ok(vec![0x90])]);
    let card = Card::new(Box::new(&script));
    let mut session = session();

    assert_eq!(
        Error::TruncatedResponse { len: 1 },
        session.begin(&card).unwrap_err().error,
    );
}

#[test]
fn test_terminated_sessions_do_no_io() {
    let script = ScriptedCard::new([
        success(CARD_NONCE.to_vec()),
        success(purse_payload()),
        success(vec![]),
    ]);
    let card = Card::new(Box::new(&script));
    let mut completed = session();
    completed.run(&card, |_| Some(cryptogram().1)).unwrap();

    let mut failed = session();
    failed.abort(Error::Cancelled).unwrap();

    let sent = script.received().len();

    for session in [&mut completed, &mut failed] {
        let phase = session.phase();
        let terminated = Failure {
            phase,
            error: Error::SessionAlreadyTerminated,
        };

        assert_eq!(Err(terminated.clone()), session.begin(&card).map(|_| ()));
        assert_eq!(
            Err(terminated.clone()),
            session.continue_secure_read(&card).map(|_| ()),
        );
        assert_eq!(
            Err(terminated.clone()),
            session.continue_credit_update(&card, &cryptogram().1),
        );
        assert_eq!(Err(terminated.clone()), session.finish().map(|_| ()));
        assert_eq!(phase, session.phase());
    }

    assert_eq!(sent, script.received().len());
}

#[test]
fn test_retry_uses_fresh_nonce() {
    let script = ScriptedCard::new([
        Err(TransportError::Timeout),
        success(CARD_NONCE.to_vec()),
        success(purse_payload()),
    ]);
    let card = Card::new(Box::new(&script));
    let source = CountingSource(RefCell::new(0x00));

    let mut first = CardSession::with_nonce_source(&source, CardLayout::standard());
    assert_eq!(
        Error::TransportTimeout,
        first.read(&card).unwrap_err().error,
    );

    let mut second = CardSession::with_nonce_source(&source, CardLayout::standard());
    second.read(&card).unwrap();

    let received = script.received();
    assert_eq!(&(0x08..0x10).collect::<Vec<u8>>()[..], &received[2][7..15]);
}
