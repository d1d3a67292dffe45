use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        EntitlementWindow, PaymentMethod, Subscription, SubscriptionStatus, WarningStage,
    },
    error::{AppError, Result},
    repository::SubscriptionRepository,
};

#[derive(FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: String,
    plan_id: String,
    plan_name: String,
    plan_duration_days: i64,
    amount: i64,
    payment_method: String,
    upi_amount: i64,
    cash_amount: i64,
    status: String,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
    grace_period_end: Option<NaiveDateTime>,
    reviewed_by: Option<String>,
    reviewed_at: Option<NaiveDateTime>,
    rejection_reason: Option<String>,
    invoice_id: Option<String>,
    payment_proof: Option<String>,
    refund_amount: Option<i64>,
    refund_reason: Option<String>,
    refunded_by: Option<String>,
    refunded_at: Option<NaiveDateTime>,
    auto_renew: bool,
    warning_stage: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, plan_name, plan_duration_days, amount, \
     payment_method, upi_amount, cash_amount, status, start_date, end_date, \
     grace_period_end, reviewed_by, reviewed_at, rejection_reason, invoice_id, \
     payment_proof, refund_amount, refund_reason, refunded_by, refunded_at, \
     auto_renew, warning_stage, created_at, updated_at";

pub struct SqliteSubscriptionRepository {
    pool: SqlitePool,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_subscription(row: SubscriptionRow) -> Result<Subscription> {
        let parse_uuid =
            |s: &str| Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()));
        let to_utc = |dt: NaiveDateTime| DateTime::from_naive_utc_and_offset(dt, Utc);

        Ok(Subscription {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            plan_id: parse_uuid(&row.plan_id)?,
            plan_name: row.plan_name,
            plan_duration_days: row.plan_duration_days,
            amount: row.amount,
            payment_method: Self::parse_payment_method(&row.payment_method)?,
            upi_amount: row.upi_amount,
            cash_amount: row.cash_amount,
            status: Self::parse_status(&row.status)?,
            start_date: row.start_date.map(to_utc),
            end_date: row.end_date.map(to_utc),
            grace_period_end: row.grace_period_end.map(to_utc),
            reviewed_by: row.reviewed_by.as_deref().map(parse_uuid).transpose()?,
            reviewed_at: row.reviewed_at.map(to_utc),
            rejection_reason: row.rejection_reason,
            invoice_id: row.invoice_id.as_deref().map(parse_uuid).transpose()?,
            payment_proof: row.payment_proof,
            refund_amount: row.refund_amount,
            refund_reason: row.refund_reason,
            refunded_by: row.refunded_by.as_deref().map(parse_uuid).transpose()?,
            refunded_at: row.refunded_at.map(to_utc),
            auto_renew: row.auto_renew,
            warning_stage: Self::parse_warning_stage(&row.warning_stage)?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_status(s: &str) -> Result<SubscriptionStatus> {
        match s {
            "Pending" => Ok(SubscriptionStatus::Pending),
            "Approved" => Ok(SubscriptionStatus::Approved),
            "Rejected" => Ok(SubscriptionStatus::Rejected),
            "Cancelled" => Ok(SubscriptionStatus::Cancelled),
            "Expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(AppError::Database(format!(
                "Invalid subscription status: {}",
                s
            ))),
        }
    }

    pub(crate) fn status_to_str(status: &SubscriptionStatus) -> &'static str {
        match status {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Approved => "Approved",
            SubscriptionStatus::Rejected => "Rejected",
            SubscriptionStatus::Cancelled => "Cancelled",
            SubscriptionStatus::Expired => "Expired",
        }
    }

    fn parse_payment_method(s: &str) -> Result<PaymentMethod> {
        match s {
            "Upi" => Ok(PaymentMethod::Upi),
            "Cash" => Ok(PaymentMethod::Cash),
            "Mixed" => Ok(PaymentMethod::Mixed),
            _ => Err(AppError::Database(format!("Invalid payment method: {}", s))),
        }
    }

    fn payment_method_to_str(method: &PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::Upi => "Upi",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Mixed => "Mixed",
        }
    }

    fn parse_warning_stage(s: &str) -> Result<WarningStage> {
        match s {
            "None" => Ok(WarningStage::None),
            "SevenDay" => Ok(WarningStage::SevenDay),
            "ThreeDay" => Ok(WarningStage::ThreeDay),
            "OneDay" => Ok(WarningStage::OneDay),
            _ => Err(AppError::Database(format!("Invalid warning stage: {}", s))),
        }
    }

    fn warning_stage_to_str(stage: &WarningStage) -> &'static str {
        match stage {
            WarningStage::None => "None",
            WarningStage::SevenDay => "SevenDay",
            WarningStage::ThreeDay => "ThreeDay",
            WarningStage::OneDay => "OneDay",
        }
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn create(&self, subscription: Subscription) -> Result<Subscription> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, plan_name, plan_duration_days, amount,
                payment_method, upi_amount, cash_amount, status,
                auto_renew, warning_stage, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(subscription.id.to_string())
        .bind(subscription.user_id.to_string())
        .bind(subscription.plan_id.to_string())
        .bind(&subscription.plan_name)
        .bind(subscription.plan_duration_days)
        .bind(subscription.amount)
        .bind(Self::payment_method_to_str(&subscription.payment_method))
        .bind(subscription.upi_amount)
        .bind(subscription.cash_amount)
        .bind(Self::status_to_str(&subscription.status))
        .bind(subscription.auto_renew)
        .bind(Self::warning_stage_to_str(&subscription.warning_stage))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            // The partial unique index on (user_id, status = Pending) is the
            // authoritative guard against racing double-submits.
            if Self::is_unique_violation(&e) {
                return Err(AppError::Conflict(
                    "A pending subscription request already exists for this user".to_string(),
                ));
            }
            return Err(AppError::Database(e.to_string()));
        }

        self.find_by_id(subscription.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created subscription".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_subscription(r)?)),
            None => Ok(None),
        }
    }

    async fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = ? ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_subscription(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = ? ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }

    async fn find_active_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Subscription>> {
        let exclude_str = exclude.map(|id| id.to_string()).unwrap_or_default();
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE user_id = ? AND status = 'Approved' AND end_date >= ? AND id != ?
            ORDER BY end_date DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(now.naive_utc())
        .bind(exclude_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_subscription(r)?)),
            None => Ok(None),
        }
    }

    async fn approve(
        &self,
        id: Uuid,
        window: EntitlementWindow,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'Approved',
                start_date = ?,
                end_date = ?,
                grace_period_end = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                rejection_reason = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(window.start_date.naive_utc())
        .bind(window.end_date.naive_utc())
        .bind(window.grace_period_end.naive_utc())
        .bind(reviewed_by.to_string())
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn reject(
        &self,
        id: Uuid,
        reason: &str,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'Rejected',
                rejection_reason = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(reason)
        .bind(reviewed_by.to_string())
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        // Dates and the issued invoice are kept; only the status moves.
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'Cancelled', updated_at = ?
            WHERE id = ? AND status = 'Approved'
            "#,
        )
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn reactivate(
        &self,
        id: Uuid,
        window: EntitlementWindow,
        reviewed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // Fresh approval cycle: clear the old invoice link and warning stage
        // so the new window gets its own invoice and warning sequence.
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'Approved',
                start_date = ?,
                end_date = ?,
                grace_period_end = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                invoice_id = NULL,
                warning_stage = 'None',
                updated_at = ?
            WHERE id = ? AND status IN ('Cancelled', 'Expired')
            "#,
        )
        .bind(window.start_date.naive_utc())
        .bind(window.end_date.naive_utc())
        .bind(window.grace_period_end.naive_utc())
        .bind(reviewed_by.to_string())
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        // Both guards ride in the WHERE clause so a sweep racing another
        // sweep (or a reviewer cancellation) is a no-op here.
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'Expired', updated_at = ?
            WHERE id = ? AND status = 'Approved' AND grace_period_end < ?
            "#,
        )
        .bind(now.naive_utc())
        .bind(id.to_string())
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_invoice(&self, id: Uuid, invoice_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET invoice_id = ?, updated_at = ?
            WHERE id = ? AND invoice_id IS NULL
            "#,
        )
        .bind(invoice_id.to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_payment_proof(&self, id: Uuid, path: &str) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET payment_proof = ?, updated_at = ? WHERE id = ?")
            .bind(path)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_warning_stage(&self, id: Uuid, stage: WarningStage) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET warning_stage = ?, updated_at = ? WHERE id = ?")
            .bind(Self::warning_stage_to_str(&stage))
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn record_refund(
        &self,
        id: Uuid,
        amount: i64,
        reason: &str,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Refund is an overlay: status and dates stay untouched.
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET refund_amount = ?, refund_reason = ?, refunded_by = ?,
                refunded_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(amount)
        .bind(reason)
        .bind(actor.to_string())
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_ending_within(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<Subscription>> {
        let horizon = now + Duration::days(within_days);
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = 'Approved' AND end_date >= ? AND end_date <= ?
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(now.naive_utc())
        .bind(horizon.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }

    async fn list_grace_elapsed(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE status = 'Approved' AND grace_period_end < ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }

    async fn list_auto_renewals_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let horizon = now + Duration::hours(24);
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = 'Approved' AND auto_renew = 1
              AND end_date >= ? AND end_date <= ?
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(now.naive_utc())
        .bind(horizon.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let user_id_str = user_id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Invoices reference subscriptions, so they go first.
        sqlx::query("DELETE FROM invoices WHERE user_id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = ?")
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
