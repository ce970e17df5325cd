//! Notification fan-out.
//!
//! One domain event becomes one notification row per eligible recipient.
//! Channel eligibility merges the organization policy with the recipient's
//! personal preference; locked policy entries always win, and the system
//! category is delivered in-app unconditionally. Push/email channels only
//! enqueue onto the external delivery queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use shared::models::{
    DeliveryChannel, EntityRef, NotificationCategory, NotificationView, Timestamp,
};
use sqlx::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::delivery::{DeliveryJob, DeliveryQueue};
use super::CoreResult;
use crate::handlers::streaming::NotificationHub;

/// Per-channel entry of an organization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRule {
    pub channel: DeliveryChannel,
    pub enabled: bool,
    /// Locked entries cannot be overridden by member preferences.
    pub locked: bool,
}

/// Per-channel personal preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPref {
    pub channel: DeliveryChannel,
    pub enabled: bool,
}

/// Resolves the channels a notification is delivered on for one recipient.
///
/// Resolution per channel: a locked policy entry is final; otherwise the
/// personal preference applies, falling back to the policy default, falling
/// back to "in-app on, push/email off". System notifications are always
/// delivered in-app.
#[must_use]
pub fn effective_channels(
    category: NotificationCategory,
    rules: &[ChannelRule],
    prefs: &[ChannelPref],
) -> Vec<DeliveryChannel> {
    const CHANNELS: [DeliveryChannel; 3] = [
        DeliveryChannel::InApp,
        DeliveryChannel::Push,
        DeliveryChannel::Email,
    ];

    CHANNELS
        .into_iter()
        .filter(|channel| {
            if category == NotificationCategory::System && *channel == DeliveryChannel::InApp {
                return true;
            }

            let rule = rules.iter().find(|rule| rule.channel == *channel);
            let pref = prefs.iter().find(|pref| pref.channel == *channel);
            let policy_default =
                rule.map_or(*channel == DeliveryChannel::InApp, |rule| rule.enabled);

            match rule {
                Some(rule) if rule.locked => rule.enabled,
                _ => pref.map_or(policy_default, |pref| pref.enabled),
            }
        })
        .collect()
}

/// A domain event to fan out. Recipients are resolved by the caller
/// ("conversation participants", "practice admins", ...); this service only
/// applies channel policy and persists.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub org_id: Uuid,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub entity: Option<EntityRef>,
    pub metadata: Value,
    pub recipients: Vec<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    category: String,
    title: String,
    body: String,
    link: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<Uuid>,
    metadata: Value,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl NotificationRow {
    fn into_view(self) -> NotificationView {
        let category = NotificationCategory::try_from(self.category.as_str())
            .unwrap_or(NotificationCategory::System);
        let entity = match (self.entity_type.as_deref(), self.entity_id) {
            (Some(kind), Some(id)) => shared::models::EntityKind::try_from(kind)
                .ok()
                .map(|entity_type| EntityRef {
                    entity_type,
                    entity_id: id,
                }),
            _ => None,
        };

        NotificationView {
            id: self.id,
            category,
            title: self.title,
            body: self.body,
            link: self.link,
            entity,
            metadata: self.metadata,
            created_at: Timestamp(self.created_at),
            read_at: self.read_at.map(Timestamp),
        }
    }
}

/// Service turning domain events into per-recipient notifications.
#[derive(Clone)]
pub struct FanoutService {
    pool: PgPool,
    queue: Arc<dyn DeliveryQueue>,
}

impl std::fmt::Debug for FanoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutService").finish()
    }
}

impl FanoutService {
    pub fn new(pool: PgPool, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self { pool, queue }
    }

    /// Persists one notification per eligible recipient, pushes each row to
    /// live streams, and enqueues push/email delivery.
    ///
    /// # Errors
    /// Database failures while persisting. Stream and queue delivery are
    /// best-effort and never fail the call.
    #[instrument(name = "fanout.publish", skip(self, event, hub), fields(category = %event.category, recipients = event.recipients.len()), err)]
    pub async fn publish(
        &self,
        event: &NotificationEvent,
        hub: &NotificationHub,
    ) -> CoreResult<Vec<NotificationView>> {
        let rules = self.load_rules(event.org_id, event.category).await?;

        let mut persisted: Vec<(Uuid, NotificationView, Vec<DeliveryChannel>)> = Vec::new();
        let mut tx = self.pool.begin().await?;

        for recipient in &event.recipients {
            let prefs = self.load_prefs(*recipient, event.category).await?;
            let channels = effective_channels(event.category, &rules, &prefs);
            if channels.is_empty() {
                continue;
            }

            let view = if channels.contains(&DeliveryChannel::InApp) {
                let row = sqlx::query_as::<_, NotificationRow>(
                    "INSERT INTO notifications
                         (id, user_id, category, title, body, link, entity_type, entity_id, metadata, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                     RETURNING id, category, title, body, link, entity_type, entity_id, metadata, created_at, read_at",
                )
                .bind(Uuid::new_v4())
                .bind(recipient)
                .bind(event.category.as_str())
                .bind(&event.title)
                .bind(&event.body)
                .bind(&event.link)
                .bind(event.entity.map(|entity| entity.entity_type.as_str()))
                .bind(event.entity.map(|entity| entity.entity_id))
                .bind(&event.metadata)
                .fetch_one(&mut *tx)
                .await?;

                Some(row.into_view())
            } else {
                None
            };

            if let Some(view) = view {
                persisted.push((*recipient, view, channels));
            } else {
                // Push/email only; nothing lands in the inbox.
                for channel in channels {
                    self.enqueue(*recipient, None, event, channel).await;
                }
            }
        }

        tx.commit().await?;
        counter!("briefwire_notifications_fanned_out_total").increment(persisted.len() as u64);

        let mut views = Vec::with_capacity(persisted.len());
        for (recipient, view, channels) in persisted {
            hub.push_notification(recipient, &view).await;
            for channel in channels {
                if channel != DeliveryChannel::InApp {
                    self.enqueue(recipient, Some(view.id), event, channel).await;
                }
            }
            views.push(view);
        }

        Ok(views)
    }

    async fn enqueue(
        &self,
        recipient: Uuid,
        notification_id: Option<Uuid>,
        event: &NotificationEvent,
        channel: DeliveryChannel,
    ) {
        let job = DeliveryJob {
            notification_id,
            user_id: recipient,
            category: event.category,
            channel,
            title: event.title.clone(),
            body: event.body.clone(),
        };

        if let Err(err) = self.queue.enqueue(job).await {
            warn!(user = %recipient, channel = channel.as_str(), "delivery enqueue failed: {err}");
            counter!("briefwire_delivery_enqueue_failures_total").increment(1);
        }
    }

    async fn load_rules(
        &self,
        org_id: Uuid,
        category: NotificationCategory,
    ) -> CoreResult<Vec<ChannelRule>> {
        #[derive(sqlx::FromRow)]
        struct RuleRow {
            channel: String,
            enabled: bool,
            locked: bool,
        }

        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT channel, enabled, locked
             FROM org_notification_policies
             WHERE org_id = $1 AND category = $2",
        )
        .bind(org_id)
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                DeliveryChannel::try_from(row.channel.as_str())
                    .ok()
                    .map(|channel| ChannelRule {
                        channel,
                        enabled: row.enabled,
                        locked: row.locked,
                    })
            })
            .collect())
    }

    async fn load_prefs(
        &self,
        user_id: Uuid,
        category: NotificationCategory,
    ) -> CoreResult<Vec<ChannelPref>> {
        #[derive(sqlx::FromRow)]
        struct PrefRow {
            channel: String,
            enabled: bool,
        }

        let rows = sqlx::query_as::<_, PrefRow>(
            "SELECT channel, enabled
             FROM user_notification_prefs
             WHERE user_id = $1 AND category = $2",
        )
        .bind(user_id)
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                DeliveryChannel::try_from(row.channel.as_str())
                    .ok()
                    .map(|channel| ChannelPref {
                        channel,
                        enabled: row.enabled,
                    })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(channel: DeliveryChannel, enabled: bool, locked: bool) -> ChannelRule {
        ChannelRule {
            channel,
            enabled,
            locked,
        }
    }

    fn pref(channel: DeliveryChannel, enabled: bool) -> ChannelPref {
        ChannelPref { channel, enabled }
    }

    #[test]
    fn defaults_to_in_app_only_without_policy_or_prefs() {
        let channels = effective_channels(NotificationCategory::Matter, &[], &[]);
        assert_eq!(channels, vec![DeliveryChannel::InApp]);
    }

    #[test]
    fn personal_pref_enables_an_unlocked_channel() {
        let channels = effective_channels(
            NotificationCategory::Payment,
            &[rule(DeliveryChannel::Email, false, false)],
            &[pref(DeliveryChannel::Email, true)],
        );
        assert!(channels.contains(&DeliveryChannel::Email));
    }

    #[test]
    fn locked_policy_beats_personal_pref() {
        // Org locks email off; the member trying to enable it changes nothing.
        let channels = effective_channels(
            NotificationCategory::Payment,
            &[rule(DeliveryChannel::Email, false, true)],
            &[pref(DeliveryChannel::Email, true)],
        );
        assert!(!channels.contains(&DeliveryChannel::Email));

        // Org locks push on; the member cannot opt out.
        let channels = effective_channels(
            NotificationCategory::Matter,
            &[rule(DeliveryChannel::Push, true, true)],
            &[pref(DeliveryChannel::Push, false)],
        );
        assert!(channels.contains(&DeliveryChannel::Push));
    }

    #[test]
    fn member_can_disable_unlocked_in_app() {
        let channels = effective_channels(
            NotificationCategory::Message,
            &[],
            &[pref(DeliveryChannel::InApp, false)],
        );
        assert!(!channels.contains(&DeliveryChannel::InApp));
    }

    #[test]
    fn system_in_app_cannot_be_disabled() {
        let channels = effective_channels(
            NotificationCategory::System,
            &[rule(DeliveryChannel::InApp, false, true)],
            &[pref(DeliveryChannel::InApp, false)],
        );
        assert!(channels.contains(&DeliveryChannel::InApp));
    }

    #[test]
    fn policy_default_applies_when_member_has_no_pref() {
        let channels = effective_channels(
            NotificationCategory::Intake,
            &[rule(DeliveryChannel::Push, true, false)],
            &[],
        );
        assert!(channels.contains(&DeliveryChannel::Push));
        assert!(channels.contains(&DeliveryChannel::InApp));
    }
}
