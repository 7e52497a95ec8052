//! Speech capture capability
//!
//! The assistant does not recognise speech itself. A capture capability
//! opens a session for a locale and reports what it heard through a
//! `CaptureSink`. Every event carries the session it was opened for, so the
//! controller can tell a stale event from a live one.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::controller::ControllerMessage;

/// Most alternatives considered for a single utterance
pub const MAX_ALTERNATIVES: usize = 3;

/// Identifies one listening session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a capture session can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Ranked alternatives for one utterance, best first
    Result { alternatives: Vec<String> },
    /// The capability failed, e.g. `not-allowed` or `no-speech`
    Error { code: String },
    /// The capability concluded the session on its own
    End,
}

/// Errors raised when opening a capture session
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture session is already open")]
    Busy,

    #[error("failed to open capture session: {0}")]
    Start(String),
}

/// Delivers capture events for one session into the controller queue
#[derive(Debug, Clone)]
pub struct CaptureSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<ControllerMessage>,
}

impl CaptureSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<ControllerMessage>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report an utterance; alternatives beyond `MAX_ALTERNATIVES` are dropped
    pub fn result(&self, mut alternatives: Vec<String>) -> bool {
        alternatives.truncate(MAX_ALTERNATIVES);
        self.emit(CaptureEvent::Result { alternatives })
    }

    pub fn error(&self, code: impl Into<String>) -> bool {
        self.emit(CaptureEvent::Error { code: code.into() })
    }

    pub fn end(&self) -> bool {
        self.emit(CaptureEvent::End)
    }

    /// Returns false once the controller has gone away
    fn emit(&self, event: CaptureEvent) -> bool {
        self.tx
            .send(ControllerMessage::Capture {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// A speech-to-text provider that can be driven by the controller
pub trait SpeechCapture: Send {
    /// Open a session listening for `locale` (e.g. `en-US`)
    fn start(&mut self, locale: &str, sink: CaptureSink) -> Result<(), CaptureError>;

    /// Ask the open session to end
    fn stop(&mut self);
}

/// Capture support, resolved once when the controller is built
pub enum Capability {
    Available(Box<dyn SpeechCapture>),
    Unavailable,
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(_) => write!(f, "Available"),
            Capability::Unavailable => write!(f, "Unavailable"),
        }
    }
}

struct BridgeSession {
    sink: CaptureSink,
}

/// Capture capability fed by an external recogniser
///
/// The recogniser runs in the client front end, which reports its output
/// over IPC. Sessions are single-utterance: a result is followed by an end.
#[derive(Clone, Default)]
pub struct BridgeCapture {
    active: Arc<Mutex<Option<BridgeSession>>>,
}

impl BridgeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver_result(&self, alternatives: Vec<String>) -> bool {
        match self.lock().take() {
            Some(session) => {
                session.sink.result(alternatives);
                session.sink.end()
            }
            None => {
                debug!("recognition result with no open session dropped");
                false
            }
        }
    }

    pub fn deliver_error(&self, code: impl Into<String>) -> bool {
        match self.lock().take() {
            Some(session) => session.sink.error(code),
            None => {
                debug!("recognition error with no open session dropped");
                false
            }
        }
    }

    pub fn deliver_end(&self) -> bool {
        match self.lock().take() {
            Some(session) => session.sink.end(),
            None => {
                debug!("recognition end with no open session dropped");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<BridgeSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechCapture for BridgeCapture {
    fn start(&mut self, locale: &str, sink: CaptureSink) -> Result<(), CaptureError> {
        let mut active = self.lock();
        if active.is_some() {
            return Err(CaptureError::Busy);
        }
        debug!(session = %sink.session(), locale, "bridge session opened");
        *active = Some(BridgeSession { sink });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(session) = self.lock().take() {
            debug!(session = %session.sink.session(), "bridge session stopped");
            session.sink.end();
        }
    }
}
