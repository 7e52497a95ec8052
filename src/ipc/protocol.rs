//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::AssistantEvent;
use crate::i18n::LanguageCode;
use crate::notify::Notification;
use crate::router::View;

/// Largest frame accepted from a client
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from the client front end to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request a status snapshot
    GetStatus,

    /// Open a listening session
    StartListening,

    /// Close the listening session
    StopListening,

    /// Switch the active language
    ChangeLanguage { code: String },

    /// Switch view directly, e.g. from the navbar; accepts a view name or
    /// a hash fragment such as `#weather`
    Navigate { view: String },

    /// Hide the notification currently shown
    DismissNotification,

    /// The recogniser heard an utterance
    Recognized { alternatives: Vec<String> },

    /// The recogniser failed
    RecognitionError { code: String },

    /// The recogniser ended its session
    RecognitionEnd,

    /// Receive every assistant event on this connection
    Subscribe,
}

/// Responses and pushed events from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current status snapshot
    Status(AssistantStatus),

    /// Request handed to the assistant
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Event { event: AssistantEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Snapshot of everything a client needs to render the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantStatus {
    /// Daemon version
    pub version: String,

    /// Whether speech capture is offered
    pub capture_available: bool,

    /// Whether a session is open
    pub listening: bool,

    /// Top alternative of the last utterance in the open session
    pub transcript: String,

    pub language: LanguageCode,

    pub view: View,

    pub notification: Notification,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for AssistantStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            capture_available: false,
            listening: false,
            transcript: String::new(),
            language: LanguageCode::default(),
            view: View::default(),
            notification: Notification::default(),
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::ChangeLanguage { code: "te".into() };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("change_language"));
        assert!(json.contains("\"code\":\"te\""));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"recognized","alternatives":["go home","go hone"]}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::Recognized {
                alternatives: vec!["go home".into(), "go hone".into()]
            }
        );

        let req: Request =
            serde_json::from_str(r##"{"type":"navigate","view":"#nasa"}"##).unwrap();
        assert_eq!(req, Request::Navigate { view: "#nasa".into() });

        let req: Request = serde_json::from_str(r#"{"type":"dismiss_notification"}"#).unwrap();
        assert_eq!(req, Request::DismissNotification);
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(AssistantStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"language\":\"en\""));
    }

    #[test]
    fn test_event_push_serialization() {
        let resp = Response::Event {
            event: AssistantEvent::Navigated { view: View::Soil },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"type\":\"navigated\""));
    }
}
