//! Process-wide current language with change notification

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A language code such as `en`, `te` or `hi`
///
/// The set is open: any code is accepted and lookups degrade to defaults
/// when nothing is defined for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub const ENGLISH: &'static str = "en";
    pub const TELUGU: &'static str = "te";
    pub const HINDI: &'static str = "hi";

    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locale requested from the speech capture capability
    pub fn locale(&self) -> &'static str {
        match self.0.as_str() {
            Self::TELUGU => "te-IN",
            Self::HINDI => "hi-IN",
            _ => "en-US",
        }
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self(Self::ENGLISH.to_string())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    code: LanguageCode,
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

/// Shared handle to the active language
///
/// Cloning yields another handle to the same state. Listeners are called
/// with no payload and re-read `current()`.
#[derive(Clone)]
pub struct LanguageRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl LanguageRegistry {
    pub fn new(initial: LanguageCode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                code: initial,
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn current(&self) -> LanguageCode {
        self.lock().code.clone()
    }

    /// Set the active language and notify every listener before returning
    pub fn change(&self, code: LanguageCode) {
        let listeners: Vec<Listener> = {
            let mut inner = self.lock();
            info!(from = %inner.code, to = %code, "language changed");
            inner.code = code;
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in listeners {
            listener();
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        debug!(?id, "language listener added");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(LanguageCode::default())
    }
}

impl fmt::Debug for LanguageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageRegistry")
            .field("code", &self.current())
            .finish()
    }
}
