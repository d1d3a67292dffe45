use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Invoice, PaymentMethod, Plan, Subscription, SubscriptionStatus};

#[derive(Debug, Serialize)]
pub struct PlanDto {
    pub id: Uuid,
    pub name: String,
    pub duration_days: i64,
    pub price: i64,
    pub currency: String,
    pub active: bool,
    pub display_order: i64,
}

impl From<Plan> for PlanDto {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            duration_days: plan.duration_days,
            price: plan.price,
            currency: plan.currency,
            active: plan.active,
            display_order: plan.display_order,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub plan_duration_days: i64,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub upi_amount: i64,
    pub cash_amount: i64,
    pub status: SubscriptionStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub grace_period_end: Option<String>,
    pub rejection_reason: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub payment_proof: Option<String>,
    pub refund_amount: Option<i64>,
    pub auto_renew: bool,
    pub created_at: String,
}

impl From<Subscription> for SubscriptionDto {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            plan_id: s.plan_id,
            plan_name: s.plan_name,
            plan_duration_days: s.plan_duration_days,
            amount: s.amount,
            payment_method: s.payment_method,
            upi_amount: s.upi_amount,
            cash_amount: s.cash_amount,
            status: s.status,
            start_date: s.start_date.map(|dt| dt.to_rfc3339()),
            end_date: s.end_date.map(|dt| dt.to_rfc3339()),
            grace_period_end: s.grace_period_end.map(|dt| dt.to_rfc3339()),
            rejection_reason: s.rejection_reason,
            invoice_id: s.invoice_id,
            payment_proof: s.payment_proof,
            refund_amount: s.refund_amount,
            auto_renew: s.auto_renew,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceDto {
    pub id: Uuid,
    pub invoice_number: String,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub upi_amount: i64,
    pub cash_amount: i64,
    pub period_start: String,
    pub period_end: String,
    pub created_at: String,
}

impl From<Invoice> for InvoiceDto {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            subscription_id: invoice.subscription_id,
            amount: invoice.amount,
            upi_amount: invoice.upi_amount,
            cash_amount: invoice.cash_amount,
            period_start: invoice.period_start.to_rfc3339(),
            period_end: invoice.period_end.to_rfc3339(),
            created_at: invoice.created_at.to_rfc3339(),
        }
    }
}
