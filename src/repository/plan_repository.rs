use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreatePlanRequest, Plan, UpdatePlanRequest},
    error::{AppError, Result},
    repository::PlanRepository,
};

#[derive(FromRow)]
struct PlanRow {
    id: String,
    name: String,
    duration_days: i64,
    price: i64,
    currency: String,
    active: bool,
    display_order: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePlanRepository {
    pool: SqlitePool,
}

impl SqlitePlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: PlanRow) -> Result<Plan> {
        Ok(Plan {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            duration_days: row.duration_days,
            price: row.price,
            currency: row.currency,
            active: row.active,
            display_order: row.display_order,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

const PLAN_COLUMNS: &str =
    "id, name, duration_days, price, currency, active, display_order, created_at, updated_at";

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn create(&self, request: CreatePlanRequest) -> Result<Plan> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let currency = request.currency.unwrap_or_else(|| "INR".to_string());
        let display_order = request.display_order.unwrap_or(0);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO plans (
                id, name, duration_days, price, currency,
                active, display_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&request.name)
        .bind(request.duration_days)
        .bind(request.price)
        .bind(&currency)
        .bind(display_order)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created plan".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Plan>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            "SELECT {} FROM plans WHERE id = ?",
            PLAN_COLUMNS
        ))
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_plan(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Plan>> {
        let query = if include_inactive {
            format!(
                "SELECT {} FROM plans ORDER BY display_order, created_at",
                PLAN_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM plans WHERE active = 1 ORDER BY display_order, created_at",
                PLAN_COLUMNS
            )
        };

        let rows = sqlx::query_as::<_, PlanRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_plan).collect()
    }

    async fn update(&self, id: Uuid, update: UpdatePlanRequest) -> Result<Plan> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))?;

        let name = update.name.unwrap_or(existing.name);
        let price = update.price.unwrap_or(existing.price);
        let active = update.active.unwrap_or(existing.active);
        let display_order = update.display_order.unwrap_or(existing.display_order);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE plans
            SET name = ?, price = ?, active = ?, display_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(price)
        .bind(active)
        .bind(display_order)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated plan".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn count_subscriptions(&self, plan_id: Uuid) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE plan_id = ?")
                .bind(plan_id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count.0)
    }
}
