//! agrivoice-daemon: voice command assistant for the farm advisory client
//!
//! The daemon runs next to the client front end and provides:
//! - A voice session state machine with a bounded listening window
//! - Per-language command grammars mapping speech to page navigation
//! - A single-slot notification channel and the active-language registry
//! - An IPC server the front end uses to drive the assistant, feed it
//!   recogniser output, and follow its events
//!
//! Speech recognition itself happens in the front end; the daemon never
//! touches audio.

mod config;
mod events;
mod i18n;
mod ipc;
mod lifecycle;
mod notify;
mod router;
mod voice;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::AssistantEvent;
use crate::i18n::{LanguageCode, LanguageRegistry};
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::notify::NotificationChannel;
use crate::router::PageRouter;
use crate::voice::{BridgeCapture, Capability, VoiceController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "agrivoice-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        socket = ?config.socket_path,
        language = %config.default_language,
        listen_timeout_ms = config.listen_timeout.as_millis() as u64,
        capture = config.capture_enabled,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    // Process-wide services, built once and handed to whoever needs them
    let language = LanguageRegistry::new(LanguageCode::new(&config.default_language));
    let notifications = NotificationChannel::new(config.notification_ttl);
    let router = PageRouter::new();

    // Assistant events -> IPC subscribers and the event log
    let (event_tx, _event_rx) = broadcast::channel::<AssistantEvent>(64);

    {
        let tx = event_tx.clone();
        notifications.subscribe(move |notification| {
            let _ = tx.send(AssistantEvent::NotificationChanged {
                notification: notification.clone(),
            });
        });
    }
    {
        let tx = event_tx.clone();
        let reader = language.clone();
        language.subscribe(move || {
            let _ = tx.send(AssistantEvent::LanguageChanged {
                code: reader.current(),
            });
        });
    }

    // Capture capability is resolved once, before the controller exists
    let bridge = BridgeCapture::new();
    let capability = if config.capture_enabled {
        Capability::Available(Box::new(bridge.clone()))
    } else {
        warn!("speech capture disabled by configuration");
        Capability::Unavailable
    };
    let capture_available = capability.is_available();

    // IPC server + timers + capture sinks -> voice controller
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let controller = VoiceController::new(
        capability,
        language.clone(),
        notifications.clone(),
        Arc::new(router.clone()),
        command_tx.clone(),
        event_tx.clone(),
    )
    .with_timeout(config.listen_timeout);
    let session = controller.status();

    let server = Server::new(
        &config.socket_path,
        ServerContext {
            commands: command_tx,
            bridge,
            router: router.clone(),
            language,
            notifications,
            events: event_tx.clone(),
            session,
            capture_available,
        },
    )?;

    let mut log_rx = event_tx.subscribe();
    let mut view_rx = router.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = controller.run(command_rx) => {
            info!("voice controller exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "assistant event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "assistant event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("assistant event handler exited");
        }

        // Router changes become navigation events
        _ = async {
            while view_rx.changed().await.is_ok() {
                let view = *view_rx.borrow_and_update();
                let _ = event_tx.send(AssistantEvent::Navigated { view });
            }
        } => {
            info!("router watcher exited");
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    info!("shutting down...");

    server.shutdown().await;

    info!("agrivoice-daemon stopped");

    Ok(())
}
