//! Voice session state machine
//!
//! Cycles between Idle and Listening. A session is opened by `start`, bounded
//! by a deadline, and closed by whichever terminal event arrives first: the
//! capability's end or error, the deadline, or a user stop. Everything that
//! drives the machine arrives as a `ControllerMessage` on one queue, so
//! events are handled one at a time in arrival order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_LISTEN_TIMEOUT;
use crate::events::{AssistantEvent, StopReason};
use crate::i18n::{translate, LanguageCode, LanguageRegistry};
use crate::notify::{NotificationChannel, Severity};
use crate::router::Navigator;

use super::capture::{
    Capability, CaptureError, CaptureEvent, CaptureSink, SessionId, MAX_ALTERNATIVES,
};
use super::interpreter::{interpret, Interpretation};

pub const STARTED_MESSAGE: &str = "Voice assistant started. Speak now.";
pub const STOPPED_MESSAGE: &str = "Voice assistant stopped";
pub const NOT_RECOGNIZED_MESSAGE: &str = "Command not recognized. Please try again.";
pub const START_FAILED_MESSAGE: &str = "Error starting voice assistant";

/// Inputs to the controller
#[derive(Debug)]
pub enum ControllerMessage {
    /// User asked to start listening
    Start,
    /// User asked to stop listening
    Stop,
    /// User picked a different language
    ChangeLanguage(LanguageCode),
    /// Reported by the capture capability for `session`
    Capture {
        session: SessionId,
        event: CaptureEvent,
    },
    /// The deadline armed for `session` elapsed
    Deadline { session: SessionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
        }
    }
}

/// What the outside world may know about the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session: Option<SessionId>,
    /// Top alternative of the latest utterance; empty while idle
    pub transcript: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("speech capture is not available")]
    CapabilityUnavailable,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// The open session; present exactly while listening
struct Session {
    id: SessionId,
    transcript: String,
    deadline: JoinHandle<()>,
}

pub struct VoiceController {
    capability: Capability,
    session: Option<Session>,
    last_session: u64,
    timeout: Duration,
    language: LanguageRegistry,
    notifications: NotificationChannel,
    navigator: Arc<dyn Navigator>,
    /// Queue this controller reads from; handed to sinks and deadline timers
    inbox: mpsc::UnboundedSender<ControllerMessage>,
    event_tx: broadcast::Sender<AssistantEvent>,
    status_tx: watch::Sender<SessionStatus>,
}

impl VoiceController {
    pub fn new(
        capability: Capability,
        language: LanguageRegistry,
        notifications: NotificationChannel,
        navigator: Arc<dyn Navigator>,
        inbox: mpsc::UnboundedSender<ControllerMessage>,
        event_tx: broadcast::Sender<AssistantEvent>,
    ) -> Self {
        Self {
            capability,
            session: None,
            last_session: 0,
            timeout: DEFAULT_LISTEN_TIMEOUT,
            language,
            notifications,
            navigator,
            inbox,
            event_tx,
            status_tx: watch::channel(SessionStatus::default()).0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Listening
        } else {
            SessionState::Idle
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Top alternative of the latest utterance in this session
    pub fn transcript(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.transcript.as_str())
    }

    /// Follow the session state; always holds the latest value
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Process messages until every sender is gone
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ControllerMessage>) {
        info!(capture = ?self.capability, "voice controller started in Idle state");

        while let Some(message) = inbox.recv().await {
            self.handle(message);
        }

        info!("voice controller stopped");
    }

    pub fn handle(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Start => {
                if let Err(e) = self.start() {
                    warn!(error = %e, "could not start listening");
                }
            }
            ControllerMessage::Stop => self.stop(),
            ControllerMessage::ChangeLanguage(code) => self.change_language(code),
            ControllerMessage::Capture { session, event } => self.on_capture(session, event),
            ControllerMessage::Deadline { session } => self.on_deadline(session),
        }
    }

    /// Open a capture session and arm the deadline
    ///
    /// Starting while already listening leaves the open session untouched
    /// and returns its id.
    pub fn start(&mut self) -> Result<SessionId, AssistantError> {
        if let Some(session) = &self.session {
            debug!(session = %session.id, "already listening, start ignored");
            return Ok(session.id);
        }

        let language = self.language.current();
        let capture = match &mut self.capability {
            Capability::Available(capture) => capture,
            Capability::Unavailable => {
                warn!("speech capture unavailable");
                self.notifications
                    .publish(translate(&language, "voiceNotSupported"), Severity::Error);
                return Err(AssistantError::CapabilityUnavailable);
            }
        };

        let id = SessionId::new(self.last_session + 1);
        let locale = language.locale();
        if let Err(e) = capture.start(locale, CaptureSink::new(id, self.inbox.clone())) {
            error!(error = %e, "failed to open capture session");
            self.notifications.publish(START_FAILED_MESSAGE, Severity::Error);
            return Err(e.into());
        }
        self.last_session = id.get();

        let deadline = self.arm_deadline(id);
        self.session = Some(Session {
            id,
            transcript: String::new(),
            deadline,
        });

        info!(
            session = %id,
            locale,
            from = %SessionState::Idle,
            to = %SessionState::Listening,
            "state transition"
        );
        self.sync_status();
        self.notifications.publish(STARTED_MESSAGE, Severity::Info);
        self.emit(AssistantEvent::ListeningStarted {
            session: id,
            locale: locale.to_string(),
        });
        Ok(id)
    }

    /// End the session on the user's request; no-op while idle
    pub fn stop(&mut self) {
        if self.session.is_none() {
            debug!("stop while idle ignored");
            return;
        }
        self.stop_capture();
        self.finish(StopReason::Stopped);
        self.notifications.publish(STOPPED_MESSAGE, Severity::Info);
    }

    /// Switch language and confirm it to the user
    pub fn change_language(&mut self, code: LanguageCode) {
        let label = code.as_str().to_uppercase();
        self.language.change(code);
        self.notifications
            .publish(format!("Language changed to {}", label), Severity::Success);
    }

    fn on_capture(&mut self, session: SessionId, event: CaptureEvent) {
        if self.session_id() != Some(session) {
            debug!(%session, ?event, "discarding event for stale session");
            return;
        }

        match event {
            CaptureEvent::Result { alternatives } => self.on_result(alternatives),
            CaptureEvent::Error { code } => {
                warn!(%session, code = %code, "capture error");
                self.finish(StopReason::Error);
                self.notifications
                    .publish(format!("Speech recognition error: {}", code), Severity::Error);
            }
            CaptureEvent::End => self.finish(StopReason::Ended),
        }
    }

    fn on_result(&mut self, mut alternatives: Vec<String>) {
        alternatives.truncate(MAX_ALTERNATIVES);
        let transcript = alternatives.first().cloned().unwrap_or_default();
        if let Some(session) = self.session.as_mut() {
            session.transcript = transcript.clone();
        }
        self.sync_status();

        // The grammar is whatever is active now, not when the session opened.
        let language = self.language.current();
        match interpret(&alternatives, &language) {
            Interpretation::Resolved {
                intent,
                confirmation,
            } => {
                let view = intent.view();
                info!(%intent, %view, %language, transcript = %transcript, "command resolved");
                self.navigator.navigate(view);
                self.notifications.publish(confirmation, Severity::Success);
                self.emit(AssistantEvent::CommandResolved {
                    intent,
                    view,
                    transcript,
                });
            }
            Interpretation::NoMatch => {
                info!(%language, ?alternatives, "command not recognized");
                self.notifications
                    .publish(NOT_RECOGNIZED_MESSAGE, Severity::Error);
                self.emit(AssistantEvent::CommandRejected { transcript });
            }
        }
    }

    fn on_deadline(&mut self, session: SessionId) {
        if self.session_id() != Some(session) {
            debug!(%session, "deadline for closed session ignored");
            return;
        }
        self.stop_capture();
        self.finish(StopReason::Timeout);
        self.notifications.publish(
            format!("Listening timeout after {}", seconds_label(self.timeout)),
            Severity::Info,
        );
    }

    fn arm_deadline(&self, session: SessionId) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = inbox.send(ControllerMessage::Deadline { session });
        })
    }

    fn stop_capture(&mut self) {
        if let Capability::Available(capture) = &mut self.capability {
            capture.stop();
        }
    }

    /// Close the session: disarm the deadline, drop the transcript, go idle
    fn finish(&mut self, reason: StopReason) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.deadline.abort();

        info!(
            session = %session.id,
            ?reason,
            from = %SessionState::Listening,
            to = %SessionState::Idle,
            "state transition"
        );
        self.sync_status();
        self.emit(AssistantEvent::ListeningStopped {
            session: session.id,
            reason,
        });
    }

    fn emit(&self, event: AssistantEvent) {
        debug!(%event, "emitting assistant event");
        let _ = self.event_tx.send(event);
    }

    fn sync_status(&self) {
        self.status_tx.send_replace(SessionStatus {
            state: self.state(),
            session: self.session_id(),
            transcript: self.transcript().to_string(),
        });
    }
}

/// "5 seconds", "1 second", "1.5 seconds"; millisecond precision
fn seconds_label(duration: Duration) -> String {
    let millis = duration.as_millis();
    let (whole, frac) = (millis / 1000, millis % 1000);
    let number = if frac == 0 {
        whole.to_string()
    } else {
        let digits = format!("{:03}", frac);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    };
    if millis == 1000 {
        format!("{} second", number)
    } else {
        format!("{} seconds", number)
    }
}
