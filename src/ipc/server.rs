//! Unix domain socket server for IPC
//!
//! Provides request-response communication and pushes assistant events to
//! subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::AssistantEvent;
use crate::i18n::{LanguageCode, LanguageRegistry};
use crate::notify::NotificationChannel;
use crate::router::{Navigator, PageRouter, View};
use crate::voice::{BridgeCapture, ControllerMessage, SessionState, SessionStatus};

use super::protocol::{AssistantStatus, Request, Response, MAX_FRAME_LEN};

/// Services the server talks to on behalf of clients
pub struct ServerContext {
    /// Queue into the voice controller
    pub commands: mpsc::UnboundedSender<ControllerMessage>,
    /// Where recogniser output from the front end is delivered
    pub bridge: BridgeCapture,
    pub router: PageRouter,
    pub language: LanguageRegistry,
    pub notifications: NotificationChannel,
    pub events: broadcast::Sender<AssistantEvent>,
    /// Latest session state published by the voice controller
    pub session: watch::Receiver<SessionStatus>,
    pub capture_available: bool,
}

struct Shared {
    ctx: ServerContext,
    start_time: std::time::Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn new(socket_path: &Path, ctx: ServerContext) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            shared: Arc::new(Shared {
                ctx,
                start_time: std::time::Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let mut pusher = None;

        let outcome = Self::serve(&mut reader, &writer, &shared, &mut pusher).await;

        if let Some(task) = pusher {
            task.abort();
        }
        outcome
    }

    async fn serve<R>(
        reader: &mut R,
        writer: &Arc<Mutex<OwnedWriteHalf>>,
        shared: &Shared,
        pusher: &mut Option<JoinHandle<()>>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let Some(frame) = read_frame(reader).await? else {
                debug!("client disconnected");
                return Ok(());
            };

            let request: Request = match serde_json::from_slice(&frame) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "malformed request");
                    let response = Response::error("bad_request", e.to_string());
                    write_frame(&mut *writer.lock().await, &response).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            // Subscribe before answering so no event slips between the two
            let events = matches!(request, Request::Subscribe).then(|| shared.ctx.events.subscribe());

            let (response, subscribe) = Self::process_request(request, shared).await;
            write_frame(&mut *writer.lock().await, &response).await?;

            if subscribe && pusher.is_none() {
                if let Some(events) = events {
                    debug!("client subscribed to events");
                    *pusher = Some(Self::spawn_pusher(events, Arc::clone(writer)));
                }
            }
        }
    }

    /// Forward assistant events to a subscribed client until it goes away
    fn spawn_pusher(
        mut events: broadcast::Receiver<AssistantEvent>,
        writer: Arc<Mutex<OwnedWriteHalf>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let frame = Response::Event { event };
                        if let Err(e) = write_frame(&mut *writer.lock().await, &frame).await {
                            debug!(?e, "subscriber went away");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
        let ctx = &shared.ctx;
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let (listening, transcript) = {
                    let session = ctx.session.borrow();
                    (
                        session.state == SessionState::Listening,
                        session.transcript.clone(),
                    )
                };
                let status = AssistantStatus {
                    capture_available: ctx.capture_available,
                    listening,
                    transcript,
                    language: ctx.language.current(),
                    view: ctx.router.current(),
                    notification: ctx.notifications.current_state(),
                    uptime_secs: shared.start_time.elapsed().as_secs(),
                    ..AssistantStatus::default()
                };
                (Response::Status(status), false)
            }

            Request::StartListening => (Self::command(ctx, ControllerMessage::Start), false),

            Request::StopListening => (Self::command(ctx, ControllerMessage::Stop), false),

            Request::ChangeLanguage { code } => {
                if code.trim().is_empty() {
                    return (
                        Response::error("invalid_language", "language code is empty"),
                        false,
                    );
                }
                let message = ControllerMessage::ChangeLanguage(LanguageCode::new(&code));
                (Self::command(ctx, message), false)
            }

            Request::Navigate { view } => match view.parse::<View>() {
                Ok(view) => {
                    ctx.router.navigate(view);
                    (Response::Accepted, false)
                }
                Err(e) => (Response::error("unknown_view", e.to_string()), false),
            },

            Request::DismissNotification => {
                ctx.notifications.dismiss();
                (Response::Accepted, false)
            }

            Request::Recognized { alternatives } => {
                let delivered = ctx.bridge.deliver_result(alternatives);
                (Self::delivery(delivered), false)
            }

            Request::RecognitionError { code } => {
                let delivered = ctx.bridge.deliver_error(code);
                (Self::delivery(delivered), false)
            }

            Request::RecognitionEnd => (Self::delivery(ctx.bridge.deliver_end()), false),

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    fn command(ctx: &ServerContext, message: ControllerMessage) -> Response {
        match ctx.commands.send(message) {
            Ok(()) => Response::Accepted,
            Err(_) => Response::error("unavailable", "voice controller is not running"),
        }
    }

    fn delivery(delivered: bool) -> Response {
        if delivered {
            Response::Accepted
        } else {
            Response::error("no_session", "no capture session is open")
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Read one length-prefixed frame; `None` on clean disconnect or oversize
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        warn!(len, "message too large, disconnecting");
        return Ok(None);
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Send a length-prefixed JSON message
pub(crate) async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(msg)?;
    let len = u32::try_from(bytes.len())
        .context("message too large")?
        .to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{CaptureEvent, SessionId, SpeechCapture};

    struct Fixture {
        server: Arc<Server>,
        path: PathBuf,
        commands: mpsc::UnboundedReceiver<ControllerMessage>,
        bridge: BridgeCapture,
        events: broadcast::Sender<AssistantEvent>,
        session: watch::Sender<SessionStatus>,
        router: PageRouter,
        notifications: NotificationChannel,
        runner: JoinHandle<()>,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "agrivoice-{}-{}.sock",
                std::process::id(),
                name
            ));
            let (commands_tx, commands) = mpsc::unbounded_channel();
            let (events, _) = broadcast::channel(16);
            let bridge = BridgeCapture::new();
            let router = PageRouter::new();
            let notifications = NotificationChannel::default();
            let (session, session_rx) = watch::channel(SessionStatus::default());
            let ctx = ServerContext {
                commands: commands_tx,
                bridge: bridge.clone(),
                router: router.clone(),
                language: LanguageRegistry::default(),
                notifications: notifications.clone(),
                events: events.clone(),
                session: session_rx,
                capture_available: true,
            };
            let server = Arc::new(Server::new(&path, ctx).unwrap());
            let runner = {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let _ = server.run().await;
                })
            };
            Self {
                server,
                path,
                commands,
                bridge,
                events,
                session,
                router,
                notifications,
                runner,
            }
        }

        async fn connect(&self) -> UnixStream {
            UnixStream::connect(&self.path).await.unwrap()
        }

        async fn finish(self) {
            self.runner.abort();
            self.server.shutdown().await;
            assert!(!self.path.exists());
        }
    }

    async fn call(stream: &mut UnixStream, request: &Request) -> Response {
        write_frame(stream, request).await.unwrap();
        recv(stream).await
    }

    async fn recv(stream: &mut UnixStream) -> Response {
        let frame = read_frame(stream).await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_commands() {
        let mut fx = Fixture::new("commands");
        let mut stream = fx.connect().await;

        assert_eq!(call(&mut stream, &Request::Ping).await, Response::Pong);
        assert_eq!(
            call(&mut stream, &Request::StartListening).await,
            Response::Accepted
        );
        assert!(matches!(fx.commands.recv().await, Some(ControllerMessage::Start)));

        let change = Request::ChangeLanguage { code: "TE".into() };
        assert_eq!(call(&mut stream, &change).await, Response::Accepted);
        match fx.commands.recv().await {
            Some(ControllerMessage::ChangeLanguage(code)) => assert_eq!(code.as_str(), "te"),
            other => panic!("unexpected {other:?}"),
        }

        fx.finish().await;
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let fx = Fixture::new("bad-input");
        let mut stream = fx.connect().await;

        let empty = Request::ChangeLanguage { code: "  ".into() };
        assert!(matches!(
            call(&mut stream, &empty).await,
            Response::Error { code, .. } if code == "invalid_language"
        ));

        let heard = Request::Recognized {
            alternatives: vec!["go home".into()],
        };
        assert!(matches!(
            call(&mut stream, &heard).await,
            Response::Error { code, .. } if code == "no_session"
        ));

        write_frame(&mut stream, &serde_json::json!({"type": "fly"}))
            .await
            .unwrap();
        assert!(matches!(
            recv(&mut stream).await,
            Response::Error { code, .. } if code == "bad_request"
        ));

        fx.finish().await;
    }

    #[tokio::test]
    async fn test_recognition_forwarded_to_session() {
        let fx = Fixture::new("bridge");
        let mut stream = fx.connect().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut capture = fx.bridge.clone();
        capture
            .start("en-US", crate::voice::CaptureSink::new(SessionId::new(5), tx))
            .unwrap();

        let heard = Request::Recognized {
            alternatives: vec!["weather".into()],
        };
        assert_eq!(call(&mut stream, &heard).await, Response::Accepted);

        match rx.recv().await {
            Some(ControllerMessage::Capture { session, event }) => {
                assert_eq!(session, SessionId::new(5));
                assert_eq!(
                    event,
                    CaptureEvent::Result {
                        alternatives: vec!["weather".into()]
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        fx.finish().await;
    }

    #[tokio::test]
    async fn test_status_and_navigation() {
        let fx = Fixture::new("status");
        let mut stream = fx.connect().await;

        fx.session.send_replace(SessionStatus {
            state: SessionState::Listening,
            session: Some(SessionId::new(1)),
            transcript: "banana".into(),
        });

        let nav = Request::Navigate {
            view: "#forum".into(),
        };
        assert_eq!(call(&mut stream, &nav).await, Response::Accepted);
        assert_eq!(fx.router.current(), View::Forum);

        let bad = Request::Navigate {
            view: "#market".into(),
        };
        assert!(matches!(
            call(&mut stream, &bad).await,
            Response::Error { code, .. } if code == "unknown_view"
        ));
        assert_eq!(fx.router.current(), View::Forum);

        match call(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => {
                assert!(status.listening);
                assert!(status.capture_available);
                assert_eq!(status.transcript, "banana");
                assert_eq!(status.view, View::Forum);
                assert_eq!(status.language.as_str(), "en");
            }
            other => panic!("unexpected {other:?}"),
        }

        fx.finish().await;
    }

    #[tokio::test]
    async fn test_status_tracks_session_without_events() {
        let fx = Fixture::new("status-watch");
        let mut stream = fx.connect().await;

        // nobody is subscribed to events; the status still moves
        fx.session.send_replace(SessionStatus {
            state: SessionState::Listening,
            session: Some(SessionId::new(3)),
            transcript: String::new(),
        });
        match call(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => assert!(status.listening),
            other => panic!("unexpected {other:?}"),
        }

        fx.session.send_replace(SessionStatus::default());
        match call(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => {
                assert!(!status.listening);
                assert_eq!(status.transcript, "");
            }
            other => panic!("unexpected {other:?}"),
        }

        fx.finish().await;
    }

    #[tokio::test]
    async fn test_dismiss_notification() {
        let fx = Fixture::new("dismiss");
        let mut stream = fx.connect().await;

        fx.notifications
            .publish("Navigating to soil", crate::notify::Severity::Success);
        assert!(fx.notifications.current_state().visible);

        assert_eq!(
            call(&mut stream, &Request::DismissNotification).await,
            Response::Accepted
        );
        let state = fx.notifications.current_state();
        assert!(!state.visible);
        assert_eq!(state.message, "Navigating to soil");

        fx.finish().await;
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let fx = Fixture::new("subscribe");
        let mut stream = fx.connect().await;

        assert_eq!(call(&mut stream, &Request::Subscribe).await, Response::Subscribed);

        let event = AssistantEvent::Navigated { view: View::Yield };
        fx.events.send(event.clone()).unwrap();

        assert_eq!(recv(&mut stream).await, Response::Event { event });

        fx.finish().await;
    }
}
