use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

pub mod webhook;

/// Fire-and-forget notification request handed to the delivery layer.
/// Delivery itself (push/email) lives outside this service.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub event: NotificationEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    SubscriptionApproved { plan_name: String },
    SubscriptionRejected { reason: String },
    ExpiryWarning { plan_name: String, days_left: i64 },
    SubscriptionExpired { plan_name: String },
    RenewalRequested { plan_name: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Fans notifications out to all registered notifiers. Failures are logged
/// and swallowed: notification is never part of the transactional contract,
/// so a dead webhook must not roll back a committed state transition.
pub struct NotifierSet {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self {
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        if notifier.is_enabled() {
            let mut notifiers = self.notifiers.write().await;
            tracing::info!("Registered notifier: {}", notifier.name());
            notifiers.push(notifier);
        }
    }

    pub async fn dispatch(&self, notification: Notification) {
        let notifiers = self.notifiers.read().await;

        for notifier in notifiers.iter() {
            if !notifier.is_enabled() {
                continue;
            }

            match notifier.notify(&notification).await {
                Ok(_) => {
                    tracing::debug!(
                        "Notifier {} delivered {:?} for user {}",
                        notifier.name(),
                        notification.event,
                        notification.user_id
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Notifier {} failed to deliver {:?}: {:?}",
                        notifier.name(),
                        notification.event,
                        e
                    );
                }
            }
        }
    }
}

impl Default for NotifierSet {
    fn default() -> Self {
        Self::new()
    }
}
