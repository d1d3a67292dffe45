use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    api::{handlers::types::PlanDto, middleware::auth::CurrentUser, state::AppState},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct PlanListResponse {
    plans: Vec<PlanDto>,
}

/// Active plans in display order; what a user sees on the upgrade page.
pub async fn list(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<Json<PlanListResponse>> {
    let plans = state.service_context.plan_service.list(false).await?;
    Ok(Json(PlanListResponse {
        plans: plans.into_iter().map(Into::into).collect(),
    }))
}
