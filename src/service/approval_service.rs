use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    billing::window,
    domain::{
        BulkDecisionOutcome, EntitlementStatus, EntitlementSummary, RefundRequest, Subscription,
        SubscriptionStatus,
    },
    error::{AppError, Result},
    notifier::{Notification, NotificationEvent, NotifierSet},
    repository::{EntitlementRepository, SubscriptionRepository},
    service::invoice_service::InvoiceService,
};

const DEFAULT_REJECTION_REASON: &str = "Payment could not be verified";

/// Reviewer-driven state machine over subscription records.
///
/// Every transition is compare-and-set at the store; losing a race against
/// another reviewer or the scheduler surfaces as a Conflict, never a silent
/// overwrite.
pub struct ApprovalService {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    entitlement_repo: Arc<dyn EntitlementRepository>,
    invoice_service: Arc<InvoiceService>,
    notifier: Arc<NotifierSet>,
    grace_period_days: i64,
}

impl ApprovalService {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        entitlement_repo: Arc<dyn EntitlementRepository>,
        invoice_service: Arc<InvoiceService>,
        notifier: Arc<NotifierSet>,
        grace_period_days: i64,
    ) -> Self {
        Self {
            subscription_repo,
            entitlement_repo,
            invoice_service,
            notifier,
            grace_period_days,
        }
    }

    /// pending → approved. Stacks onto the user's current active window when
    /// one exists, otherwise starts now. Also serves as the repair entry
    /// point: re-invoking on an approved record that lost its invoice step
    /// re-runs only the invoice step.
    pub async fn approve(&self, id: Uuid, reviewer: Uuid) -> Result<Subscription> {
        let subscription = self.load(id).await?;
        let now = Utc::now();

        match subscription.status {
            SubscriptionStatus::Pending => {}
            SubscriptionStatus::Approved if subscription.invoice_id.is_none() => {
                // A prior approval committed but its invoice didn't.
                return self.repair_missing_invoice(subscription, now).await;
            }
            _ => {
                return Err(AppError::Conflict(format!(
                    "Subscription is {:?}, not pending review",
                    subscription.status
                )));
            }
        }

        let active = self
            .subscription_repo
            .find_active_for_user(subscription.user_id, now, Some(id))
            .await?;
        let window = window::approval_window(
            now,
            subscription.plan_duration_days,
            self.grace_period_days,
            active.and_then(|s| s.end_date),
        );

        let moved = self
            .subscription_repo
            .approve(id, window, reviewer, now)
            .await?;
        if !moved {
            return Err(AppError::Conflict(
                "Subscription was already reviewed by another actor".to_string(),
            ));
        }

        let approved = self.load(id).await?;

        self.set_entitlement(
            approved.user_id,
            EntitlementStatus::Active,
            Some(approved.plan_name.clone()),
            approved.end_date,
        )
        .await?;

        // Invoice failure leaves the record approved-without-invoice; the
        // caller is told to retry the approval, which lands in the repair
        // path above.
        let invoice = match self
            .invoice_service
            .issue_for_subscription(&approved, now)
            .await
        {
            Ok(invoice) => invoice,
            Err(e) => {
                tracing::error!(
                    "Invoice issuance failed for approved subscription {}: {}",
                    id,
                    e
                );
                return Err(AppError::PartialFailure(
                    "Subscription approved but invoice issuance failed; retry the approval to issue the invoice".to_string(),
                ));
            }
        };
        if !self.subscription_repo.set_invoice(id, invoice.id).await? {
            tracing::warn!(
                "Invoice {} for subscription {} left unlinked; the slot was already filled",
                invoice.id,
                id
            );
        }

        self.notifier
            .dispatch(Notification {
                user_id: approved.user_id,
                subscription_id: approved.id,
                event: NotificationEvent::SubscriptionApproved {
                    plan_name: approved.plan_name.clone(),
                },
            })
            .await;

        self.load(id).await
    }

    /// pending → rejected. Terminal; the user submits a new request.
    pub async fn reject(&self, id: Uuid, reviewer: Uuid, reason: Option<String>) -> Result<Subscription> {
        let subscription = self.load(id).await?;
        if subscription.status != SubscriptionStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Subscription is {:?}, not pending review",
                subscription.status
            )));
        }

        let now = Utc::now();
        let reason = reason.unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        let moved = self
            .subscription_repo
            .reject(id, &reason, reviewer, now)
            .await?;
        if !moved {
            return Err(AppError::Conflict(
                "Subscription was already reviewed by another actor".to_string(),
            ));
        }

        self.refresh_entitlement(subscription.user_id, id, now)
            .await?;

        self.notifier
            .dispatch(Notification {
                user_id: subscription.user_id,
                subscription_id: subscription.id,
                event: NotificationEvent::SubscriptionRejected { reason },
            })
            .await;

        self.load(id).await
    }

    /// approved → cancelled. Dates and the issued invoice stay on record.
    pub async fn cancel(&self, id: Uuid) -> Result<Subscription> {
        let subscription = self.load(id).await?;
        let now = Utc::now();
        let moved = self.subscription_repo.cancel(id, now).await?;
        if !moved {
            return Err(AppError::Conflict(format!(
                "Subscription is {:?}, only approved subscriptions can be cancelled",
                subscription.status
            )));
        }

        self.refresh_entitlement(subscription.user_id, id, now)
            .await?;

        self.load(id).await
    }

    /// {cancelled, expired} → approved with a fresh non-stacking window and a
    /// new invoice. The invoice is best-effort here: reactivation stands even
    /// if numbering fails, and the repair path can issue it later.
    pub async fn reactivate(&self, id: Uuid, reviewer: Uuid) -> Result<Subscription> {
        let subscription = self.load(id).await?;
        if !matches!(
            subscription.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            return Err(AppError::Conflict(format!(
                "Subscription is {:?}, only cancelled or expired subscriptions can be reactivated",
                subscription.status
            )));
        }

        let now = Utc::now();
        let window = window::reactivation_window(
            now,
            subscription.plan_duration_days,
            self.grace_period_days,
        );
        let moved = self
            .subscription_repo
            .reactivate(id, window, reviewer, now)
            .await?;
        if !moved {
            return Err(AppError::Conflict(
                "Subscription was already transitioned by another actor".to_string(),
            ));
        }

        let reactivated = self.load(id).await?;
        self.set_entitlement(
            reactivated.user_id,
            EntitlementStatus::Active,
            Some(reactivated.plan_name.clone()),
            reactivated.end_date,
        )
        .await?;

        match self
            .invoice_service
            .issue_for_subscription(&reactivated, now)
            .await
        {
            Ok(invoice) => {
                if !self.subscription_repo.set_invoice(id, invoice.id).await? {
                    tracing::warn!(
                        "Invoice {} for reactivated subscription {} left unlinked; the slot was already filled",
                        invoice.id,
                        id
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Invoice issuance failed during reactivation of {}: {}; reactivation stands",
                    id,
                    e
                );
            }
        }

        self.notifier
            .dispatch(Notification {
                user_id: reactivated.user_id,
                subscription_id: reactivated.id,
                event: NotificationEvent::SubscriptionApproved {
                    plan_name: reactivated.plan_name.clone(),
                },
            })
            .await;

        self.load(id).await
    }

    /// Refund overlay on an approved or cancelled subscription. Status and
    /// dates are untouched.
    pub async fn refund(&self, id: Uuid, actor: Uuid, request: RefundRequest) -> Result<Subscription> {
        let subscription = self.load(id).await?;
        if !matches!(
            subscription.status,
            SubscriptionStatus::Approved | SubscriptionStatus::Cancelled
        ) {
            return Err(AppError::Conflict(format!(
                "Refunds only apply to approved or cancelled subscriptions, found {:?}",
                subscription.status
            )));
        }
        if request.amount <= 0 {
            return Err(AppError::Validation(
                "Refund amount must be positive".to_string(),
            ));
        }
        if request.amount > subscription.amount {
            return Err(AppError::Validation(format!(
                "Refund amount {} exceeds subscription amount {}",
                request.amount, subscription.amount
            )));
        }

        self.subscription_repo
            .record_refund(id, request.amount, &request.reason, actor, Utc::now())
            .await?;

        self.load(id).await
    }

    /// Per-record approval over a batch. Records are independent; partial
    /// success is reported as counts, not rolled back.
    pub async fn bulk_approve(&self, ids: &[Uuid], reviewer: Uuid) -> Result<BulkDecisionOutcome> {
        let mut processed = 0;
        let mut failed = 0;
        for &id in ids {
            match self.approve(id, reviewer).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::warn!("Bulk approve skipped {}: {}", id, e);
                    failed += 1;
                }
            }
        }
        Ok(BulkDecisionOutcome { processed, failed })
    }

    pub async fn bulk_reject(
        &self,
        ids: &[Uuid],
        reviewer: Uuid,
        reason: Option<String>,
    ) -> Result<BulkDecisionOutcome> {
        let mut processed = 0;
        let mut failed = 0;
        for &id in ids {
            match self.reject(id, reviewer, reason.clone()).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::warn!("Bulk reject skipped {}: {}", id, e);
                    failed += 1;
                }
            }
        }
        Ok(BulkDecisionOutcome { processed, failed })
    }

    async fn repair_missing_invoice(
        &self,
        subscription: Subscription,
        now: chrono::DateTime<Utc>,
    ) -> Result<Subscription> {
        tracing::info!(
            "Repairing approved subscription {} with missing invoice",
            subscription.id
        );
        // A racing repair may already have issued the invoice for this
        // window; reuse it rather than minting an orphan. Invoices from
        // earlier windows (pre-reactivation) never match the current dates.
        let existing = self
            .invoice_service
            .latest_for_subscription(subscription.id)
            .await?
            .filter(|inv| {
                subscription.start_date == Some(inv.period_start)
                    && subscription.end_date == Some(inv.period_end)
            });
        let invoice = match existing {
            Some(invoice) => invoice,
            None => {
                self.invoice_service
                    .issue_for_subscription(&subscription, now)
                    .await?
            }
        };
        if !self
            .subscription_repo
            .set_invoice(subscription.id, invoice.id)
            .await?
        {
            tracing::warn!(
                "Subscription {} was linked by a concurrent repair",
                subscription.id
            );
        }
        self.load(subscription.id).await
    }

    /// Recompute the cached summary after one record leaves the approved set.
    /// The summary tracks the user's overall standing, not the departing
    /// record: a stacked upgrade still inside its window keeps the user
    /// Active.
    async fn refresh_entitlement(
        &self,
        user_id: Uuid,
        departing: Uuid,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        match self
            .subscription_repo
            .find_active_for_user(user_id, now, Some(departing))
            .await?
        {
            Some(active) => {
                self.set_entitlement(
                    user_id,
                    EntitlementStatus::Active,
                    Some(active.plan_name.clone()),
                    active.end_date,
                )
                .await
            }
            None => self.set_entitlement(user_id, EntitlementStatus::None, None, None).await,
        }
    }

    async fn set_entitlement(
        &self,
        user_id: Uuid,
        status: EntitlementStatus,
        plan_name: Option<String>,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<()> {
        self.entitlement_repo
            .upsert(EntitlementSummary {
                user_id,
                status,
                plan_name,
                expires_at,
                updated_at: Utc::now(),
            })
            .await
    }

    async fn load(&self, id: Uuid) -> Result<Subscription> {
        self.subscription_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
    }
}
