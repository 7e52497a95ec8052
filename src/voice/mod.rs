//! Voice command assistant
//!
//! - `capture`: the speech capture capability and the events it reports
//! - `interpreter`: per-language keyword grammars mapping phrases to intents
//! - `controller`: the Idle/Listening session state machine

mod capture;
mod controller;
mod interpreter;

pub use capture::{
    BridgeCapture, Capability, CaptureEvent, CaptureSink, SessionId, SpeechCapture,
};
pub use controller::{ControllerMessage, SessionState, SessionStatus, VoiceController};
pub use interpreter::NavigationIntent;
