use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issued once per approval event. Reactivation of a lapsed subscription
/// produces a new invoice rather than reusing the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub upi_amount: i64,
    pub cash_amount: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

/// Invoices are only raised for completed approvals, so Paid is the only
/// state in scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    Paid,
}
