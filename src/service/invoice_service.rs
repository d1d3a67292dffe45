use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    billing::invoice_number,
    domain::{Invoice, InvoiceStatus, Subscription},
    error::{AppError, Result},
    repository::{InvoiceRepository, SequenceRepository},
};

/// Bounded retries before abandoning sequential numbering for the
/// availability fallback.
const MAX_ATTEMPTS: u32 = 10;

/// Allocates invoice numbers and issues invoices.
///
/// Numbering strategy, in order:
/// 1. Atomic per-month counter — the primary mechanism; concurrent approvals
///    each draw a distinct sequence value.
/// 2. Scan the month partition for its high-water mark and probe upward —
///    the repair path when the counter disagrees with already-issued numbers.
/// 3. Timestamp+random fallback — non-sequential but unique, keeping the
///    month prefix. Sequence gaps are acceptable; duplicate numbers are not.
pub struct InvoiceService {
    invoice_repo: Arc<dyn InvoiceRepository>,
    sequence_repo: Arc<dyn SequenceRepository>,
}

impl InvoiceService {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository>,
        sequence_repo: Arc<dyn SequenceRepository>,
    ) -> Self {
        Self {
            invoice_repo,
            sequence_repo,
        }
    }

    /// Issue the invoice for a freshly approved subscription. The
    /// subscription must already carry its computed window.
    pub async fn issue_for_subscription(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<Invoice> {
        let period_start = subscription.start_date.ok_or_else(|| {
            AppError::Internal("Cannot invoice a subscription without a start date".to_string())
        })?;
        let period_end = subscription.end_date.ok_or_else(|| {
            AppError::Internal("Cannot invoice a subscription without an end date".to_string())
        })?;

        let period = invoice_number::period_for(now);
        let build = |number: String| Invoice {
            id: Uuid::new_v4(),
            invoice_number: number,
            user_id: subscription.user_id,
            subscription_id: subscription.id,
            amount: subscription.amount,
            upi_amount: subscription.upi_amount,
            cash_amount: subscription.cash_amount,
            period_start,
            period_end,
            status: InvoiceStatus::Paid,
            created_at: now,
        };

        // Primary: draw from the counter. A conflict here means the counter
        // lags numbers issued through the scan path; drawing again converges.
        for _ in 0..MAX_ATTEMPTS {
            let seq = match self.sequence_repo.next(&period).await {
                Ok(seq) => seq,
                Err(e) => {
                    tracing::warn!(
                        "Invoice counter unavailable for period {}: {}; falling back to scan",
                        period,
                        e
                    );
                    break;
                }
            };
            let number = invoice_number::format_number(&period, seq);
            if let Some(invoice) = self.try_create(build(number)).await? {
                return Ok(invoice);
            }
        }

        // Repair path: locate the partition's high-water mark and probe up.
        let mut candidate = self
            .invoice_repo
            .max_sequence_for_period(&period)
            .await?
            .unwrap_or(0)
            + 1;
        for _ in 0..MAX_ATTEMPTS {
            let number = invoice_number::format_number(&period, candidate);
            if let Some(invoice) = self.try_create(build(number)).await? {
                return Ok(invoice);
            }
            candidate += 1;
        }

        // Last resort: give up on monotonicity, not on uniqueness.
        let number = invoice_number::fallback_number(&period, now);
        tracing::warn!(
            "Sequential invoice numbering contended; issuing fallback number {}",
            number
        );
        self.invoice_repo.create(build(number)).await
    }

    /// Newest invoice issued for a subscription, if any.
    pub async fn latest_for_subscription(&self, subscription_id: Uuid) -> Result<Option<Invoice>> {
        self.invoice_repo.find_by_subscription(subscription_id).await
    }

    /// Insert with the unique index as the arbiter. A number collision is a
    /// retryable outcome, not an error.
    async fn try_create(&self, invoice: Invoice) -> Result<Option<Invoice>> {
        match self.invoice_repo.create(invoice).await {
            Ok(invoice) => Ok(Some(invoice)),
            Err(AppError::Conflict(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
