//! Events broadcast by the assistant
//!
//! Session transitions come from the voice controller; notification,
//! language and navigation changes are bridged in from their services.

use serde::{Deserialize, Serialize};

use crate::i18n::LanguageCode;
use crate::notify::Notification;
use crate::router::View;
use crate::voice::{NavigationIntent, SessionId};

/// Why a listening session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The capture capability concluded the session
    Ended,
    /// The user asked to stop
    Stopped,
    /// Nothing was heard before the deadline
    Timeout,
    /// The capture capability reported an error
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// A capture session was opened
    ListeningStarted { session: SessionId, locale: String },

    /// The session returned to idle
    ListeningStopped { session: SessionId, reason: StopReason },

    /// An utterance mapped to an intent
    CommandResolved {
        intent: NavigationIntent,
        view: View,
        transcript: String,
    },

    /// An utterance matched nothing in the active grammar
    CommandRejected { transcript: String },

    NotificationChanged { notification: Notification },

    LanguageChanged { code: LanguageCode },

    Navigated { view: View },
}

impl std::fmt::Display for AssistantEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantEvent::ListeningStarted { session, locale } => {
                write!(f, "LISTENING_STARTED ({} {})", session, locale)
            }
            AssistantEvent::ListeningStopped { session, reason } => {
                write!(f, "LISTENING_STOPPED ({} {:?})", session, reason)
            }
            AssistantEvent::CommandResolved { intent, view, .. } => {
                write!(f, "COMMAND_RESOLVED ({} -> {})", intent, view)
            }
            AssistantEvent::CommandRejected { transcript } => {
                write!(f, "COMMAND_REJECTED ({:?})", transcript)
            }
            AssistantEvent::NotificationChanged { notification } => {
                write!(
                    f,
                    "NOTIFICATION_CHANGED ({} visible={})",
                    notification.id, notification.visible
                )
            }
            AssistantEvent::LanguageChanged { code } => write!(f, "LANGUAGE_CHANGED ({})", code),
            AssistantEvent::Navigated { view } => write!(f, "NAVIGATED ({})", view),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AssistantEvent::CommandResolved {
            intent: NavigationIntent::Weather,
            view: View::Weather,
            transcript: "go to weather".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"command_resolved\""));
        assert!(json.contains("\"intent\":\"weather\""));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"listening_stopped","session":4,"reason":"timeout"}"#;
        let event: AssistantEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AssistantEvent::ListeningStopped {
                session: SessionId::new(4),
                reason: StopReason::Timeout,
            }
        );
    }

    #[test]
    fn test_display() {
        let event = AssistantEvent::Navigated { view: View::Nasa };
        assert_eq!(event.to_string(), "NAVIGATED (nasa)");
    }
}
