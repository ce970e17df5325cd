//! Per-user SSE stream hub.
//!
//! Each connected user holds one long-lived channel; notifications created
//! while connected are pushed as `event: notification` frames. Delivery is
//! best-effort and at-least-once: a full channel drops the frame and the
//! client catches up over the REST pull path. There is no replay buffer.

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use metrics::counter;
use serde_json::json;
use shared::{config::server::Config, models::NotificationPush, models::NotificationView};
use std::{collections::HashMap, convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{debug, info};
use uuid::Uuid;

use crate::middleware::request_context::RequestContext;

pub type SharedHub = Arc<NotificationHub>;

#[derive(Clone, Debug)]
struct StreamFrame {
    event: String,
    data: String,
}

/// Registry of live per-user streams.
#[derive(Debug)]
pub struct NotificationHub {
    capacity: usize,
    inner: Mutex<HashMap<Uuid, mpsc::Sender<StreamFrame>>>,
}

impl NotificationHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<mpsc::Receiver<StreamFrame>, SubscriptionError> {
        let (sender, receiver) = {
            let mut guard = self.inner.lock().await;

            if let Some(existing) = guard.get(&user_id) {
                if !existing.is_closed() {
                    return Err(SubscriptionError::AlreadyConnected);
                }
            }

            let (tx, rx) = mpsc::channel(self.capacity);
            guard.insert(user_id, tx.clone());
            (tx, rx)
        };

        counter!("briefwire_stream_connects_total").increment(1);

        // Connection acknowledgement so clients can flip to connected state
        // on the first frame.
        let ack = StreamFrame {
            event: "message".to_string(),
            data: json!({ "type": "connection" }).to_string(),
        };
        let _ = sender.send(ack).await;

        Ok(receiver)
    }

    /// Pushes one notification frame to the user's stream, if connected.
    pub async fn push_notification(&self, user_id: Uuid, view: &NotificationView) {
        let payload = NotificationPush::from_view(view);
        let data = match serde_json::to_string(&payload) {
            Ok(data) => data,
            Err(err) => {
                debug!(user = %user_id, "failed to encode push payload: {err}");
                return;
            }
        };

        self.publish(
            user_id,
            StreamFrame {
                event: "notification".to_string(),
                data,
            },
        )
        .await;
    }

    async fn publish(&self, user_id: Uuid, frame: StreamFrame) {
        let sender = {
            let guard = self.inner.lock().await;
            guard.get(&user_id).cloned()
        };

        let Some(sender) = sender else {
            return;
        };

        match sender.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Slow consumer; the REST pull path is the catch-up
                // mechanism, so the frame is dropped rather than queued.
                counter!("briefwire_stream_frames_dropped_total").increment(1);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.unregister(user_id).await;
            }
        }
    }

    /// Spawns the per-connection heartbeat; ends once the stream is gone.
    pub fn spawn_heartbeat(self: &Arc<Self>, user_id: Uuid, heartbeat_seconds: u64) {
        let cadence = heartbeat_seconds.max(5);
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(cadence));
            loop {
                interval.tick().await;
                if !hub.send_ping(user_id).await {
                    break;
                }
            }
        });
    }

    async fn send_ping(&self, user_id: Uuid) -> bool {
        let sender = {
            let guard = self.inner.lock().await;
            guard.get(&user_id).cloned()
        };

        let Some(sender) = sender else {
            return false;
        };

        let ping = StreamFrame {
            event: "ping".to_string(),
            data: json!({}).to_string(),
        };

        match sender.try_send(ping) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true, // drop ping silently
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.unregister(user_id).await;
                false
            }
        }
    }

    async fn unregister(&self, user_id: Uuid) {
        let mut guard = self.inner.lock().await;
        if guard.remove(&user_id).is_some() {
            counter!("briefwire_stream_disconnects_total").increment(1);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SubscriptionError {
    AlreadyConnected,
}

/// Server-sent events endpoint delivering per-user notification frames.
#[utoipa::path(
    get,
    path = "/notifications/stream",
    responses(
        (status = 200, description = "SSE stream established", content_type = "text/event-stream"),
        (status = 401, description = "Missing or expired session"),
        (status = 409, description = "A stream is already active for this user")
    ),
    tag = "Notifications"
)]
pub async fn sse_handler(
    Extension(config): Extension<Arc<Config>>,
    Extension(hub): Extension<SharedHub>,
    Extension(context): Extension<RequestContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, axum::http::StatusCode> {
    let user_id = context
        .user_id
        .ok_or(axum::http::StatusCode::UNAUTHORIZED)?;

    info!("Establishing notification stream for user {}", user_id);

    let receiver = hub.subscribe(user_id).await.map_err(|err| match err {
        SubscriptionError::AlreadyConnected => axum::http::StatusCode::CONFLICT,
    })?;

    hub.spawn_heartbeat(user_id, config.sse.heartbeat_seconds);

    let stream = ReceiverStream::new(receiver)
        .map(|frame| Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data)));

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(config.sse.heartbeat_seconds.max(5)))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::{NotificationCategory, Timestamp};
    use tokio::time::timeout;

    fn view() -> NotificationView {
        NotificationView {
            id: Uuid::new_v4(),
            category: NotificationCategory::Message,
            title: "New message".into(),
            body: "Avery Chen replied in Estate of Morrow.".into(),
            link: None,
            entity: None,
            metadata: serde_json::Value::Null,
            created_at: Timestamp(Utc::now()),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn push_reaches_the_subscriber() {
        let hub = NotificationHub::new(8);
        let user_id = Uuid::new_v4();

        let mut receiver = hub.subscribe(user_id).await.expect("subscription");
        // Drain the connection acknowledgement.
        let ack = receiver.recv().await.expect("ack frame");
        assert_eq!(ack.event, "message");

        let view = view();
        hub.push_notification(user_id, &view).await;

        let frame = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("frame in time")
            .expect("frame present");
        assert_eq!(frame.event, "notification");

        let payload: NotificationPush = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(payload.notification_id, view.id);
        assert_eq!(payload.category, NotificationCategory::Message);
    }

    #[tokio::test]
    async fn second_subscribe_is_rejected_while_connected() {
        let hub = NotificationHub::new(8);
        let user_id = Uuid::new_v4();

        let _receiver = hub.subscribe(user_id).await.expect("first subscription");
        let second = hub.subscribe(user_id).await;
        assert!(matches!(second, Err(SubscriptionError::AlreadyConnected)));
    }

    #[tokio::test]
    async fn dropped_receiver_frees_the_slot() {
        let hub = NotificationHub::new(8);
        let user_id = Uuid::new_v4();

        let receiver = hub.subscribe(user_id).await.expect("subscription");
        drop(receiver);

        // Publishing into the closed channel unregisters the user...
        hub.push_notification(user_id, &view()).await;
        // ...so a fresh subscribe succeeds.
        assert!(hub.subscribe(user_id).await.is_ok());
    }

    #[tokio::test]
    async fn full_channel_drops_frames_instead_of_queueing() {
        let hub = NotificationHub::new(1);
        let user_id = Uuid::new_v4();

        let mut receiver = hub.subscribe(user_id).await.expect("subscription");

        // The ack occupies the single slot; both pushes are dropped.
        hub.push_notification(user_id, &view()).await;
        hub.push_notification(user_id, &view()).await;

        let ack = receiver.recv().await.expect("ack frame");
        assert_eq!(ack.event, "message");
        assert!(
            timeout(Duration::from_millis(50), receiver.recv())
                .await
                .is_err(),
            "dropped frames must not arrive late"
        );
    }

    #[tokio::test]
    async fn heartbeat_stops_once_the_user_disconnects() {
        let hub = NotificationHub::new(8);
        let user_id = Uuid::new_v4();

        let receiver = hub.subscribe(user_id).await.expect("subscription");
        drop(receiver);

        // The closed channel is detected on the next ping and unregistered.
        assert!(!hub.send_ping(user_id).await);
        assert!(!hub.send_ping(user_id).await);
    }
}
