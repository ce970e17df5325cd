//! Reconnecting consumer for the notification stream.
//!
//! One `NotificationStream` exists per signed-in session; it is constructed
//! on login, torn down on logout, and injected wherever consumed. Token
//! rotation means stopping this instance and spawning a new one. Status is
//! observable through a watch channel and parsed events flow to the owner
//! over an mpsc channel; stream failures never surface as errors to callers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use shared::config::server::StreamClientConfig;
use shared::models::{NotificationPush, PUSH_SCHEMA_VERSION};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiClient, ClientError, ClientResult};
use crate::sse::SseFrameParser;

/// Lifecycle of the stream consumer. `PendingReconnect` re-enters
/// `Connecting` after the fixed backoff delay unless a deliberate stop lands
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Connecting,
    Connected,
    PendingReconnect,
    Stopped,
}

pub type ByteChunkStream = BoxStream<'static, ClientResult<Vec<u8>>>;

/// Transport seam so the state machine is testable without a server.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self) -> ClientResult<ByteChunkStream>;
}

#[async_trait]
impl StreamTransport for ApiClient {
    async fn open(&self) -> ClientResult<ByteChunkStream> {
        let response = self.open_stream().await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
            .boxed())
    }
}

/// Handle to the running stream task.
#[derive(Debug)]
pub struct NotificationStream {
    status: watch::Receiver<StreamStatus>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    last_event_at: Arc<Mutex<Option<Instant>>>,
}

impl NotificationStream {
    /// Spawns the consumer task. Dispatched `event: notification` frames are
    /// sent into `events`.
    #[must_use]
    pub fn spawn(
        transport: Arc<dyn StreamTransport>,
        config: StreamClientConfig,
        events: mpsc::Sender<NotificationPush>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(StreamStatus::Idle);
        let last_event_at = Arc::new(Mutex::new(None));

        let handle = tokio::spawn(run_loop(
            transport,
            config,
            events,
            status_tx,
            cancel.clone(),
            Arc::clone(&last_event_at),
        ));

        Self {
            status: status_rx,
            cancel,
            handle,
            last_event_at,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    /// Watch channel for observing state transitions.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    /// Instant of the last dispatched event, if any.
    #[must_use]
    pub fn last_event_at(&self) -> Option<Instant> {
        *self.last_event_at.lock().expect("status mutex poisoned")
    }

    /// Deliberate stop: cancels the in-flight read and any pending reconnect
    /// timer, then waits for the task to settle in `Stopped`.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn run_loop(
    transport: Arc<dyn StreamTransport>,
    config: StreamClientConfig,
    events: mpsc::Sender<NotificationPush>,
    status: watch::Sender<StreamStatus>,
    cancel: CancellationToken,
    last_event_at: Arc<Mutex<Option<Instant>>>,
) {
    let delay = Duration::from_millis(config.reconnect_delay_ms);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        status.send_replace(StreamStatus::Connecting);
        let opened = tokio::select! {
            () = cancel.cancelled() => break,
            opened = transport.open() => opened,
        };

        match opened {
            Ok(stream) => {
                status.send_replace(StreamStatus::Connected);
                read_stream(stream, &events, &cancel, &last_event_at).await;
                if cancel.is_cancelled() {
                    break;
                }
            }
            Err(ClientError::Auth(message)) => {
                // An expired token never heals by retrying; tear down and
                // let the session layer rebuild the stream after sign-in.
                warn!("notification stream rejected: {message}");
                break;
            }
            Err(err) => {
                debug!("notification stream connect failed: {err}");
            }
        }

        status.send_replace(StreamStatus::PendingReconnect);
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    status.send_replace(StreamStatus::Stopped);
}

async fn read_stream(
    mut stream: ByteChunkStream,
    events: &mpsc::Sender<NotificationPush>,
    cancel: &CancellationToken,
    last_event_at: &Mutex<Option<Instant>>,
) {
    let mut parser = SseFrameParser::new();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                for frame in parser.push(&text) {
                    if frame.event != "notification" {
                        continue;
                    }

                    let push: NotificationPush = match serde_json::from_str(&frame.data) {
                        Ok(push) => push,
                        Err(err) => {
                            // Malformed frames are logged and skipped; the
                            // stream keeps running.
                            warn!("skipping malformed notification frame: {err}");
                            continue;
                        }
                    };

                    if push.version != PUSH_SCHEMA_VERSION {
                        debug!(version = push.version, "ignoring frame with unknown payload version");
                        continue;
                    }

                    *last_event_at.lock().expect("status mutex poisoned") = Some(Instant::now());
                    if events.send(push).await.is_err() {
                        // Owner went away; nothing left to dispatch to.
                        return;
                    }
                }
            }
            Some(Err(err)) => {
                debug!("notification stream read failed: {err}");
                return;
            }
            None => return, // clean end; caller schedules the reconnect
        }
    }
}
