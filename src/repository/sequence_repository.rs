use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    repository::SequenceRepository,
};

/// Per-month invoice counter. A single upsert-returning statement hands each
/// caller a distinct value, so approvals racing within a month never observe
/// the same sequence number.
pub struct SqliteSequenceRepository {
    pool: SqlitePool,
}

impl SqliteSequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceRepository for SqliteSequenceRepository {
    async fn next(&self, period: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO invoice_sequences (period, seq) VALUES (?, 1)
            ON CONFLICT(period) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(period)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.0)
    }
}
