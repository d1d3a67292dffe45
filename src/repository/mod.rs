use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod entitlement_repository;
pub mod invoice_repository;
pub mod plan_repository;
pub mod sequence_repository;
pub mod subscription_repository;

pub use entitlement_repository::SqliteEntitlementRepository;
pub use invoice_repository::SqliteInvoiceRepository;
pub use plan_repository::SqlitePlanRepository;
pub use sequence_repository::SqliteSequenceRepository;
pub use subscription_repository::SqliteSubscriptionRepository;

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn create(&self, request: CreatePlanRequest) -> Result<Plan>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Plan>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Plan>>;
    async fn update(&self, id: Uuid, update: UpdatePlanRequest) -> Result<Plan>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn count_subscriptions(&self, plan_id: Uuid) -> Result<i64>;
}

/// Status transitions are compare-and-set: the expected prior status rides in
/// the WHERE clause and a transition that moved zero rows returns `false`,
/// which callers surface as a conflict rather than double-processing.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, subscription: Subscription) -> Result<Subscription>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>>;
    async fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>>;
    /// The user's approved subscription whose end_date is still ahead of
    /// `now`, excluding `exclude` (the record being approved).
    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Subscription>>;

    async fn approve(
        &self,
        id: Uuid,
        window: EntitlementWindow,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    async fn reject(
        &self,
        id: Uuid,
        reason: &str,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;
    async fn reactivate(
        &self,
        id: Uuid,
        window: EntitlementWindow,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Demote to Expired, guarded on the record still being Approved with an
    /// elapsed grace period.
    async fn expire(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Link the invoice issued for the current approval. Only fills an empty
    /// slot; the reference is never reassigned within an approval cycle.
    async fn set_invoice(&self, id: Uuid, invoice_id: Uuid) -> Result<bool>;
    async fn set_payment_proof(&self, id: Uuid, path: &str) -> Result<()>;
    async fn set_warning_stage(&self, id: Uuid, stage: WarningStage) -> Result<()>;
    async fn record_refund(
        &self,
        id: Uuid,
        amount: i64,
        reason: &str,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Approved subscriptions ending within `within_days` of `now` (warning
    /// sweep input).
    async fn list_ending_within(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<Subscription>>;
    /// Approved subscriptions whose grace period has fully elapsed.
    async fn list_grace_elapsed(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;
    /// Approved auto-renew subscriptions ending within the next 24 hours.
    async fn list_auto_renewals_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;

    /// Administrative bulk delete. Outside the normal lifecycle; records are
    /// otherwise never physically removed.
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert; a duplicate invoice_number surfaces as a Conflict so the
    /// numbering service can retry.
    async fn create(&self, invoice: Invoice) -> Result<Invoice>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>>;
    async fn find_by_subscription(&self, subscription_id: Uuid) -> Result<Option<Invoice>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>>;
    /// Highest sequential number already issued in the month partition, for
    /// the scan-based fallback path.
    async fn max_sequence_for_period(&self, period: &str) -> Result<Option<i64>>;
}

/// Atomic per-month counter. One upsert-returning statement, so concurrent
/// approvals each observe a distinct value.
#[async_trait]
pub trait SequenceRepository: Send + Sync {
    async fn next(&self, period: &str) -> Result<i64>;
}

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<EntitlementSummary>>;
    async fn upsert(&self, summary: EntitlementSummary) -> Result<()>;
}
