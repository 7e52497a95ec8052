//! Publish/subscribe slot holding the one live notification
//!
//! A new publish replaces the previous notification rather than queueing
//! behind it. Each publish arms its own auto-hide timer; the timer only
//! hides the notification it was armed for, so an older timer firing after
//! a newer publish leaves the newer message visible.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_NOTIFICATION_TTL;

/// How a notification should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the notification slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Version assigned at publish; 0 before anything was published
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub visible: bool,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            id: 0,
            message: String::new(),
            severity: Severity::Info,
            visible: false,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Inner {
    state: Notification,
    next_listener: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

/// Shared handle to the notification slot
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Mutex<Inner>>,
    /// Held from a state change until its listeners have run, so changes
    /// reach listeners in the order they were applied
    delivery: Arc<Mutex<()>>,
    ttl: Duration,
}

impl NotificationChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: Notification::default(),
                next_listener: 0,
                listeners: Vec::new(),
            })),
            delivery: Arc::new(Mutex::new(())),
            ttl,
        }
    }

    /// Replace the current notification and arm its auto-hide timer
    ///
    /// Listeners have observed the new value by the time this returns.
    /// Listeners must not publish or dismiss from inside the callback.
    /// Auto-hide needs a tokio runtime; outside one the message stays
    /// visible until dismissed.
    pub fn publish(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let message = message.into();
        let _delivery = self.begin_delivery();
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            let id = inner.state.id + 1;
            inner.state = Notification {
                id,
                message,
                severity,
                visible: true,
            };
            (inner.state.clone(), Self::listeners_of(&inner))
        };

        info!(
            id = snapshot.id,
            severity = %snapshot.severity,
            message = %snapshot.message,
            "notification published"
        );
        Self::fan_out(&snapshot, listeners);
        self.arm_auto_hide(snapshot.id);
        snapshot.id
    }

    /// Hide whatever is currently shown
    pub fn dismiss(&self) {
        let _delivery = self.begin_delivery();
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            inner.state.visible = false;
            (inner.state.clone(), Self::listeners_of(&inner))
        };
        debug!(id = snapshot.id, "notification dismissed");
        Self::fan_out(&snapshot, listeners);
    }

    pub fn current_state(&self) -> Notification {
        self.lock().state.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    /// Hide notification `id` if it is still the current one
    fn expire(&self, id: u64) {
        let _delivery = self.begin_delivery();
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            if inner.state.id != id || !inner.state.visible {
                debug!(id, current = inner.state.id, "stale auto-hide ignored");
                return;
            }
            inner.state.visible = false;
            (inner.state.clone(), Self::listeners_of(&inner))
        };
        debug!(id, "notification expired");
        Self::fan_out(&snapshot, listeners);
    }

    fn arm_auto_hide(&self, id: u64) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(id, "no runtime available, notification will not auto-hide");
                return;
            }
        };

        let channel = self.clone();
        let ttl = self.ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            channel.expire(id);
        });
    }

    fn listeners_of(inner: &Inner) -> Vec<Listener> {
        inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    // Called with the state lock released so listeners may read the channel.
    fn fan_out(snapshot: &Notification, listeners: Vec<Listener>) {
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn begin_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("state", &self.current_state())
            .field("ttl", &self.ttl)
            .finish()
    }
}
