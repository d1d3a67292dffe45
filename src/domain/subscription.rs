use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    /// Plan fields snapshotted at request time.
    pub plan_name: String,
    pub plan_duration_days: i64,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub upi_amount: i64,
    pub cash_amount: i64,
    pub status: SubscriptionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub payment_proof: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub refunded_by: Option<Uuid>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub warning_stage: WarningStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Access counts as valid through the grace period, matching the
    /// scheduler which only demotes after grace_period_end.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Approved
            && self.grace_period_end.map(|g| g >= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
    Cash,
    Mixed,
}

/// Deepest expiry warning already delivered for a subscription. Ordered so a
/// sweep that missed the 7-day window still sends the 3-day or 1-day warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningStage {
    None,
    SevenDay,
    ThreeDay,
    OneDay,
}

impl WarningStage {
    pub fn days(&self) -> Option<i64> {
        match self {
            WarningStage::None => None,
            WarningStage::SevenDay => Some(7),
            WarningStage::ThreeDay => Some(3),
            WarningStage::OneDay => Some(1),
        }
    }

    /// The stage a subscription with `days_left` until end_date should have
    /// been warned at by now.
    pub fn due_for(days_left: i64) -> WarningStage {
        if days_left <= 1 {
            WarningStage::OneDay
        } else if days_left <= 3 {
            WarningStage::ThreeDay
        } else if days_left <= 7 {
            WarningStage::SevenDay
        } else {
            WarningStage::None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: Uuid,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub upi_amount: i64,
    #[serde(default)]
    pub cash_amount: i64,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDecisionRequest {
    pub subscription_ids: Vec<Uuid>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Outcome of a bulk approve/reject pass. Records are evaluated
/// independently; partial success is expected.
#[derive(Debug, Clone, Serialize)]
pub struct BulkDecisionOutcome {
    pub processed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_stage_tracks_days_left() {
        assert_eq!(WarningStage::due_for(30), WarningStage::None);
        assert_eq!(WarningStage::due_for(8), WarningStage::None);
        assert_eq!(WarningStage::due_for(7), WarningStage::SevenDay);
        assert_eq!(WarningStage::due_for(4), WarningStage::SevenDay);
        assert_eq!(WarningStage::due_for(3), WarningStage::ThreeDay);
        assert_eq!(WarningStage::due_for(2), WarningStage::ThreeDay);
        assert_eq!(WarningStage::due_for(1), WarningStage::OneDay);
        assert_eq!(WarningStage::due_for(0), WarningStage::OneDay);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(WarningStage::None < WarningStage::SevenDay);
        assert!(WarningStage::SevenDay < WarningStage::ThreeDay);
        assert!(WarningStage::ThreeDay < WarningStage::OneDay);
    }
}
