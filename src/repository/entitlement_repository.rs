use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{EntitlementStatus, EntitlementSummary},
    error::{AppError, Result},
    repository::EntitlementRepository,
};

#[derive(FromRow)]
struct EntitlementRow {
    user_id: String,
    status: String,
    plan_name: Option<String>,
    expires_at: Option<NaiveDateTime>,
    updated_at: NaiveDateTime,
}

pub struct SqliteEntitlementRepository {
    pool: SqlitePool,
}

impl SqliteEntitlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_status(s: &str) -> Result<EntitlementStatus> {
        match s {
            "None" => Ok(EntitlementStatus::None),
            "Active" => Ok(EntitlementStatus::Active),
            "Expired" => Ok(EntitlementStatus::Expired),
            _ => Err(AppError::Database(format!(
                "Invalid entitlement status: {}",
                s
            ))),
        }
    }

    fn status_to_str(status: &EntitlementStatus) -> &'static str {
        match status {
            EntitlementStatus::None => "None",
            EntitlementStatus::Active => "Active",
            EntitlementStatus::Expired => "Expired",
        }
    }
}

#[async_trait]
impl EntitlementRepository for SqliteEntitlementRepository {
    async fn find(&self, user_id: Uuid) -> Result<Option<EntitlementSummary>> {
        let row = sqlx::query_as::<_, EntitlementRow>(
            "SELECT user_id, status, plan_name, expires_at, updated_at FROM user_entitlements WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(EntitlementSummary {
                user_id: Uuid::parse_str(&r.user_id)
                    .map_err(|e| AppError::Database(e.to_string()))?,
                status: Self::parse_status(&r.status)?,
                plan_name: r.plan_name,
                expires_at: r
                    .expires_at
                    .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
                updated_at: DateTime::from_naive_utc_and_offset(r.updated_at, Utc),
            })),
            None => Ok(None),
        }
    }

    async fn upsert(&self, summary: EntitlementSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_entitlements (user_id, status, plan_name, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                status = excluded.status,
                plan_name = excluded.plan_name,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(summary.user_id.to_string())
        .bind(Self::status_to_str(&summary.status))
        .bind(&summary.plan_name)
        .bind(summary.expires_at.map(|dt| dt.naive_utc()))
        .bind(summary.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
