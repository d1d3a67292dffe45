use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized copy of a user's current subscription standing, kept on the
/// user record so the rest of the platform can gate features without joining
/// through the subscription history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementSummary {
    pub user_id: Uuid,
    pub status: EntitlementStatus,
    pub plan_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntitlementStatus {
    None,
    Active,
    Expired,
}

/// Dates computed for one approval: the paid window plus the grace tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub grace_period_end: DateTime<Utc>,
}
