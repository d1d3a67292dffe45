use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{CreatePlanRequest, Plan, UpdatePlanRequest},
    error::{AppError, Result},
    repository::PlanRepository,
};

pub struct PlanService {
    repo: Arc<dyn PlanRepository>,
}

impl PlanService {
    pub fn new(repo: Arc<dyn PlanRepository>) -> Self {
        Self { repo }
    }

    /// List plans sorted by display order.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Plan>> {
        self.repo.list(include_inactive).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Plan>> {
        self.repo.find_by_id(id).await
    }

    pub async fn create(&self, request: CreatePlanRequest) -> Result<Plan> {
        if request.name.trim().is_empty() {
            return Err(AppError::BadRequest("Plan name is required".to_string()));
        }
        if request.duration_days <= 0 {
            return Err(AppError::BadRequest(
                "Plan duration must be at least one day".to_string(),
            ));
        }
        if request.price < 0 {
            return Err(AppError::BadRequest(
                "Price cannot be negative".to_string(),
            ));
        }

        self.repo.create(request).await
    }

    pub async fn update(&self, id: Uuid, request: UpdatePlanRequest) -> Result<Plan> {
        if let Some(price) = request.price {
            if price < 0 {
                return Err(AppError::BadRequest(
                    "Price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(ref name) = request.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Plan name is required".to_string()));
            }
        }

        self.repo.update(id, request).await
    }

    /// Delete a plan. Blocked while any subscription references it; history
    /// depends on the reference even though the fields are snapshotted.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let _plan = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))?;

        let usage_count = self.repo.count_subscriptions(id).await?;
        if usage_count > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete plan: {} subscriptions reference it. Deactivate instead.",
                usage_count
            )));
        }

        self.repo.delete(id).await
    }
}
