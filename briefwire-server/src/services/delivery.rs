//! External delivery queue seam.
//!
//! Push and email delivery is owned by an external worker; the core only
//! enqueues. Queue failures are logged by callers, never retried here.

use async_trait::async_trait;
use shared::models::{DeliveryChannel, NotificationCategory};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// One push/email delivery unit handed to the external worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryJob {
    /// Inbox row backing this job; absent for push/email-only deliveries.
    pub notification_id: Option<Uuid>,
    pub user_id: Uuid,
    pub category: NotificationCategory,
    pub channel: DeliveryChannel,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, job: DeliveryJob) -> anyhow::Result<()>;
}

/// In-process buffered queue backed by an mpsc channel; the receiving half is
/// handed to whatever worker drains it.
#[derive(Debug, Clone)]
pub struct BufferedDeliveryQueue {
    sender: mpsc::Sender<DeliveryJob>,
}

impl BufferedDeliveryQueue {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DeliveryJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeliveryQueue for BufferedDeliveryQueue {
    async fn enqueue(&self, job: DeliveryJob) -> anyhow::Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|err| anyhow::anyhow!("delivery queue closed: {err}"))
    }
}

/// Drains the buffered queue, logging each hand-off. Stands in for the
/// external push/email worker in deployments that have not wired one up.
pub fn spawn_logging_worker(mut receiver: mpsc::Receiver<DeliveryJob>) {
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            info!(
                notification = ?job.notification_id,
                user = %job.user_id,
                channel = job.channel.as_str(),
                category = job.category.as_str(),
                "handing delivery job to external worker"
            );
        }
    });
}
