use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subscription tier. Price/active/order may change over time; committed
/// subscriptions snapshot the fields they depend on, so edits here never
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub duration_days: i64,
    pub price: i64,
    pub currency: String,
    pub active: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub duration_days: i64,
    pub price: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub active: Option<bool>,
    pub display_order: Option<i64>,
}
