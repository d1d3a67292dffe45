use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        CreateSubscriptionRequest, Invoice, PaymentMethod, Plan, Subscription,
        SubscriptionStatus, WarningStage,
    },
    error::{AppError, Result},
    repository::{InvoiceRepository, PlanRepository, SubscriptionRepository},
};

/// User-facing intake and queries. Each intake validation failure is a
/// distinct, actionable error; the duplicate-pending guard is ultimately the
/// store's unique index, not the pre-check here.
pub struct SubscriptionService {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    plan_repo: Arc<dyn PlanRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
    amount_tolerance: i64,
}

#[derive(Debug, Serialize)]
pub struct CurrentSubscription {
    pub subscription: Option<Subscription>,
    pub is_active: bool,
}

impl SubscriptionService {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        plan_repo: Arc<dyn PlanRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
        amount_tolerance: i64,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            invoice_repo,
            amount_tolerance,
        }
    }

    pub async fn create_request(
        &self,
        user_id: Uuid,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription> {
        let plan = self
            .plan_repo
            .find_by_id(request.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))?;
        if !plan.active {
            return Err(AppError::Validation(
                "Plan is no longer available".to_string(),
            ));
        }

        let (upi_amount, cash_amount) = self.validate_amounts(&plan, &request)?;

        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id,
            plan_id: plan.id,
            // Snapshot the plan so later edits never rewrite this record.
            plan_name: plan.name.clone(),
            plan_duration_days: plan.duration_days,
            amount: plan.price,
            payment_method: request.payment_method,
            upi_amount,
            cash_amount,
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
            auto_renew: request.auto_renew,
            warning_stage: WarningStage::None,
            created_at: now,
            updated_at: now,
        };

        self.subscription_repo.create(subscription).await
    }

    /// Upgrade intake: same validations, plus the user must currently hold an
    /// active subscription to stack onto.
    pub async fn create_upgrade_request(
        &self,
        user_id: Uuid,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription> {
        let active = self
            .subscription_repo
            .find_active_for_user(user_id, Utc::now(), None)
            .await?;
        if active.is_none() {
            return Err(AppError::Conflict(
                "No active subscription to upgrade from".to_string(),
            ));
        }
        self.create_request(user_id, request).await
    }

    pub async fn current(&self, user_id: Uuid) -> Result<CurrentSubscription> {
        let now = Utc::now();
        let subscription = self.subscription_repo.find_latest_for_user(user_id).await?;
        let is_active = subscription
            .as_ref()
            .map(|s| s.is_active_at(now))
            .unwrap_or(false);
        Ok(CurrentSubscription {
            subscription,
            is_active,
        })
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<Subscription>> {
        self.subscription_repo.list_for_user(user_id).await
    }

    pub async fn invoice_for(&self, user_id: Uuid, subscription_id: Uuid) -> Result<Invoice> {
        let subscription = self.owned(user_id, subscription_id).await?;
        self.invoice_repo
            .find_by_subscription(subscription.id)
            .await?
            .ok_or_else(|| AppError::NotFound("No invoice for this subscription".to_string()))
    }

    /// Record the stored payment-proof reference. Only the owner may attach,
    /// and only while the request awaits review.
    pub async fn attach_payment_proof(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
        path: &str,
    ) -> Result<Subscription> {
        let subscription = self.owned(user_id, subscription_id).await?;
        if subscription.status != SubscriptionStatus::Pending {
            return Err(AppError::Conflict(
                "Payment proof can only be attached to a pending request".to_string(),
            ));
        }
        self.subscription_repo
            .set_payment_proof(subscription_id, path)
            .await?;
        self.owned(user_id, subscription_id).await
    }

    fn validate_amounts(
        &self,
        plan: &Plan,
        request: &CreateSubscriptionRequest,
    ) -> Result<(i64, i64)> {
        let (upi_amount, cash_amount) = match request.payment_method {
            PaymentMethod::Upi => {
                if request.upi_amount <= 0 {
                    return Err(AppError::Validation(
                        "UPI payment requires a positive UPI amount".to_string(),
                    ));
                }
                (request.upi_amount, 0)
            }
            PaymentMethod::Cash => {
                if request.cash_amount <= 0 {
                    return Err(AppError::Validation(
                        "Cash payment requires a positive cash amount".to_string(),
                    ));
                }
                (0, request.cash_amount)
            }
            PaymentMethod::Mixed => {
                if request.upi_amount <= 0 || request.cash_amount <= 0 {
                    return Err(AppError::Validation(
                        "Mixed payment requires positive UPI and cash amounts".to_string(),
                    ));
                }
                (request.upi_amount, request.cash_amount)
            }
        };

        // ±tolerance absorbs rounding from client-side splits.
        let total = upi_amount + cash_amount;
        if (total - plan.price).abs() > self.amount_tolerance {
            return Err(AppError::Validation(format!(
                "Payment total {} does not match plan price {}",
                total, plan.price
            )));
        }

        Ok((upi_amount, cash_amount))
    }

    async fn owned(&self, user_id: Uuid, subscription_id: Uuid) -> Result<Subscription> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;
        if subscription.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(subscription)
    }
}
