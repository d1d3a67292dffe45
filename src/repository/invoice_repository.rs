use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    billing::invoice_number,
    domain::{Invoice, InvoiceStatus},
    error::{AppError, Result},
    repository::InvoiceRepository,
};

#[derive(FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    user_id: String,
    subscription_id: String,
    amount: i64,
    upi_amount: i64,
    cash_amount: i64,
    period_start: NaiveDateTime,
    period_end: NaiveDateTime,
    status: String,
    created_at: NaiveDateTime,
}

const INVOICE_COLUMNS: &str = "id, invoice_number, user_id, subscription_id, amount, upi_amount, \
     cash_amount, period_start, period_end, status, created_at";

pub struct SqliteInvoiceRepository {
    pool: SqlitePool,
}

impl SqliteInvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_invoice(row: InvoiceRow) -> Result<Invoice> {
        let parse_uuid =
            |s: &str| Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()));
        Ok(Invoice {
            id: parse_uuid(&row.id)?,
            invoice_number: row.invoice_number,
            user_id: parse_uuid(&row.user_id)?,
            subscription_id: parse_uuid(&row.subscription_id)?,
            amount: row.amount,
            upi_amount: row.upi_amount,
            cash_amount: row.cash_amount,
            period_start: DateTime::from_naive_utc_and_offset(row.period_start, Utc),
            period_end: DateTime::from_naive_utc_and_offset(row.period_end, Utc),
            status: Self::parse_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<InvoiceStatus> {
        match s {
            "Paid" => Ok(InvoiceStatus::Paid),
            _ => Err(AppError::Database(format!("Invalid invoice status: {}", s))),
        }
    }

    fn status_to_str(status: &InvoiceStatus) -> &'static str {
        match status {
            InvoiceStatus::Paid => "Paid",
        }
    }
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn create(&self, invoice: Invoice) -> Result<Invoice> {
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, user_id, subscription_id, amount,
                upi_amount, cash_amount, period_start, period_end,
                status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice.id.to_string())
        .bind(&invoice.invoice_number)
        .bind(invoice.user_id.to_string())
        .bind(invoice.subscription_id.to_string())
        .bind(invoice.amount)
        .bind(invoice.upi_amount)
        .bind(invoice.cash_amount)
        .bind(invoice.period_start.naive_utc())
        .bind(invoice.period_end.naive_utc())
        .bind(Self::status_to_str(&invoice.status))
        .bind(invoice.created_at.naive_utc())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if matches!(&e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
            {
                return Err(AppError::Conflict(format!(
                    "Invoice number {} already taken",
                    invoice.invoice_number
                )));
            }
            return Err(AppError::Database(e.to_string()));
        }

        self.find_by_id(invoice.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created invoice".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = ?",
            INVOICE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_invoice(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_subscription(&self, subscription_id: Uuid) -> Result<Option<Invoice>> {
        // Reactivations issue fresh invoices; the newest one is the live
        // linkage.
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE subscription_id = ? ORDER BY created_at DESC LIMIT 1",
            INVOICE_COLUMNS
        ))
        .bind(subscription_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_invoice(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE user_id = ? ORDER BY created_at DESC",
            INVOICE_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }

    async fn max_sequence_for_period(&self, period: &str) -> Result<Option<i64>> {
        let prefix = format!("{}-{}-%", invoice_number::PREFIX, period);
        let numbers: Vec<(String,)> =
            sqlx::query_as("SELECT invoice_number FROM invoices WHERE invoice_number LIKE ?")
                .bind(&prefix)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        // Fallback-format numbers carry a non-numeric tail and are ignored
        // when locating the month's high-water mark.
        Ok(numbers
            .iter()
            .filter_map(|(n,)| invoice_number::parse_sequence(n, period))
            .max())
    }
}
