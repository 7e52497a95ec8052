//! Page router seam
//!
//! The assistant never renders pages itself. It asks a `Navigator` to switch
//! the client to a view, and the front end follows the router's current view.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Views the client can show, named by their hash fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Home,
    Scan,
    Weather,
    Nasa,
    Expert,
    Soil,
    Forum,
    Yield,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Home,
        View::Scan,
        View::Weather,
        View::Nasa,
        View::Expert,
        View::Soil,
        View::Forum,
        View::Yield,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Home => "home",
            View::Scan => "scan",
            View::Weather => "weather",
            View::Nasa => "nasa",
            View::Expert => "expert",
            View::Soil => "soil",
            View::Forum => "forum",
            View::Yield => "yield",
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::Home
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown view: {0}")]
pub struct ViewParseError(pub String);

impl FromStr for View {
    type Err = ViewParseError;

    /// Accepts `weather` or `#weather`; an empty fragment means home
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fragment = s.trim().trim_start_matches('#');
        if fragment.is_empty() {
            return Ok(View::Home);
        }
        View::ALL
            .into_iter()
            .find(|v| v.as_str() == fragment)
            .ok_or_else(|| ViewParseError(fragment.to_string()))
    }
}

/// Something that can switch the client to a view
pub trait Navigator: Send + Sync {
    fn navigate(&self, view: View);
}

/// Router holding the current view; observers follow it through `watch`
#[derive(Debug, Clone)]
pub struct PageRouter {
    tx: watch::Sender<View>,
}

impl PageRouter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(View::Home);
        Self { tx }
    }

    pub fn current(&self) -> View {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.tx.subscribe()
    }
}

impl Default for PageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for PageRouter {
    fn navigate(&self, view: View) {
        let previous = self.tx.send_replace(view);
        info!(from = %previous, to = %view, "navigated");
    }
}
