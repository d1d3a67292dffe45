use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    config::SchedulerConfig,
    domain::{
        EntitlementStatus, EntitlementSummary, Subscription, SubscriptionStatus, WarningStage,
    },
    error::{AppError, Result},
    notifier::{Notification, NotificationEvent, NotifierSet},
    repository::{EntitlementRepository, SubscriptionRepository},
};

/// Outcome counts for one sweep pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub warned: usize,
    pub expired: usize,
    pub renewals_spawned: usize,
}

/// Periodic background reconciliation over the subscription store.
///
/// Three independent, idempotent duties: staged expiry warnings, grace-window
/// expiration, and auto-renewal spawning. Each record failure is logged and
/// skipped so one bad record never halts a sweep, and every mutation is
/// guarded (warning stage, CAS status) so overlapping sweeps are no-ops for
/// already-processed records.
pub struct Scheduler {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    entitlement_repo: Arc<dyn EntitlementRepository>,
    notifier: Arc<NotifierSet>,
}

impl Scheduler {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        entitlement_repo: Arc<dyn EntitlementRepository>,
        notifier: Arc<NotifierSet>,
    ) -> Self {
        Self {
            subscription_repo,
            entitlement_repo,
            notifier,
        }
    }

    /// Daily duties: warnings then renewals. Runs forever.
    pub async fn run_daily_loop(self: Arc<Self>, config: SchedulerConfig) {
        loop {
            let now = Utc::now();
            match self.warning_sweep(now).await {
                Ok(stats) => tracing::info!("Warning sweep done: {} warned", stats.warned),
                Err(e) => tracing::error!("Warning sweep failed: {}", e),
            }
            match self.renewal_sweep(now).await {
                Ok(stats) => {
                    tracing::info!("Renewal sweep done: {} spawned", stats.renewals_spawned)
                }
                Err(e) => tracing::error!("Renewal sweep failed: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(config.daily_sweep_interval_secs)).await;
        }
    }

    /// Expiration runs on a tighter cadence to bound how long a lapsed
    /// entitlement still reads as active.
    pub async fn run_expiration_loop(self: Arc<Self>, config: SchedulerConfig) {
        loop {
            let now = Utc::now();
            match self.expiration_sweep(now).await {
                Ok(stats) => tracing::info!("Expiration sweep done: {} expired", stats.expired),
                Err(e) => tracing::error!("Expiration sweep failed: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(config.expiration_sweep_interval_secs)).await;
        }
    }

    /// Send the deepest warning threshold (7/3/1 days) now due for each
    /// approved subscription, recording the stage so re-runs skip it. A sweep
    /// outage across one threshold never suppresses the later ones.
    pub async fn warning_sweep(&self, now: DateTime<Utc>) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let ending = self.subscription_repo.list_ending_within(now, 7).await?;

        for subscription in ending {
            if let Err(e) = self.warn_one(&subscription, now, &mut stats).await {
                tracing::error!(
                    "Warning sweep failed for subscription {}: {}",
                    subscription.id,
                    e
                );
            }
        }
        Ok(stats)
    }

    async fn warn_one(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
        stats: &mut SweepStats,
    ) -> Result<()> {
        let end_date = subscription.end_date.ok_or_else(|| {
            AppError::Internal("Approved subscription without end date".to_string())
        })?;
        let days_left = (end_date - now).num_days().max(0);
        let due = WarningStage::due_for(days_left);
        if due <= subscription.warning_stage {
            return Ok(());
        }

        self.subscription_repo
            .set_warning_stage(subscription.id, due)
            .await?;
        self.notifier
            .dispatch(Notification {
                user_id: subscription.user_id,
                subscription_id: subscription.id,
                event: NotificationEvent::ExpiryWarning {
                    plan_name: subscription.plan_name.clone(),
                    days_left,
                },
            })
            .await;
        stats.warned += 1;
        Ok(())
    }

    /// Demote approved subscriptions whose grace period has elapsed. The CAS
    /// guard makes a concurrent or repeated sweep a no-op, so exactly one
    /// expiration notification goes out per record.
    pub async fn expiration_sweep(&self, now: DateTime<Utc>) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let lapsed = self.subscription_repo.list_grace_elapsed(now).await?;

        for subscription in lapsed {
            match self.expire_one(&subscription, now).await {
                Ok(true) => stats.expired += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        "Expiration sweep failed for subscription {}: {}",
                        subscription.id,
                        e
                    );
                }
            }
        }
        Ok(stats)
    }

    async fn expire_one(&self, subscription: &Subscription, now: DateTime<Utc>) -> Result<bool> {
        let moved = self.subscription_repo.expire(subscription.id, now).await?;
        if !moved {
            // Another sweep or a reviewer got there first.
            return Ok(false);
        }

        // A stacked upgrade may still be inside its window; the summary
        // reflects the user's overall standing, not this record alone.
        let summary = match self
            .subscription_repo
            .find_active_for_user(subscription.user_id, now, Some(subscription.id))
            .await?
        {
            Some(active) => EntitlementSummary {
                user_id: subscription.user_id,
                status: EntitlementStatus::Active,
                plan_name: Some(active.plan_name.clone()),
                expires_at: active.end_date,
                updated_at: now,
            },
            None => EntitlementSummary {
                user_id: subscription.user_id,
                status: EntitlementStatus::Expired,
                plan_name: Some(subscription.plan_name.clone()),
                expires_at: subscription.end_date,
                updated_at: now,
            },
        };
        self.entitlement_repo.upsert(summary).await?;

        self.notifier
            .dispatch(Notification {
                user_id: subscription.user_id,
                subscription_id: subscription.id,
                event: NotificationEvent::SubscriptionExpired {
                    plan_name: subscription.plan_name.clone(),
                },
            })
            .await;
        Ok(true)
    }

    /// Spawn pending renewal requests for opt-in subscriptions ending within
    /// 24 hours. The renewal re-enters the normal approval workflow; the
    /// one-pending-per-user constraint suppresses duplicate spawns.
    pub async fn renewal_sweep(&self, now: DateTime<Utc>) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let due = self.subscription_repo.list_auto_renewals_due(now).await?;

        for subscription in due {
            match self.renew_one(&subscription, now).await {
                Ok(true) => stats.renewals_spawned += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        "Renewal sweep failed for subscription {}: {}",
                        subscription.id,
                        e
                    );
                }
            }
        }
        Ok(stats)
    }

    async fn renew_one(&self, expiring: &Subscription, now: DateTime<Utc>) -> Result<bool> {
        // Pre-fill from the expiring record's snapshot: renewals honor the
        // terms the user already agreed to, even if the plan changed since.
        let renewal = Subscription {
            id: Uuid::new_v4(),
            user_id: expiring.user_id,
            plan_id: expiring.plan_id,
            plan_name: expiring.plan_name.clone(),
            plan_duration_days: expiring.plan_duration_days,
            amount: expiring.amount,
            payment_method: expiring.payment_method,
            upi_amount: expiring.upi_amount,
            cash_amount: expiring.cash_amount,
            status: SubscriptionStatus::Pending,
            start_date: None,
            end_date: None,
            grace_period_end: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            invoice_id: None,
            payment_proof: None,
            refund_amount: None,
            refund_reason: None,
            refunded_by: None,
            refunded_at: None,
            auto_renew: true,
            warning_stage: WarningStage::None,
            created_at: now,
            updated_at: now,
        };

        match self.subscription_repo.create(renewal).await {
            Ok(created) => {
                self.notifier
                    .dispatch(Notification {
                        user_id: created.user_id,
                        subscription_id: created.id,
                        event: NotificationEvent::RenewalRequested {
                            plan_name: created.plan_name.clone(),
                        },
                    })
                    .await;
                Ok(true)
            }
            Err(AppError::Conflict(_)) => {
                // A pending request already exists (possibly this renewal,
                // spawned by an earlier sweep).
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
