use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{
        handlers::types::{PlanDto, SubscriptionDto},
        middleware::auth::CurrentUser,
        state::AppState,
    },
    domain::{
        BulkDecisionOutcome, BulkDecisionRequest, CreatePlanRequest, RefundRequest,
        RejectRequest, UpdatePlanRequest,
    },
    error::Result,
};

pub async fn approve(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionDto>> {
    let subscription = state
        .service_context
        .approval_service
        .approve(id, reviewer.id)
        .await?;
    Ok(Json(subscription.into()))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<SubscriptionDto>> {
    let subscription = state
        .service_context
        .approval_service
        .reject(id, reviewer.id, request.reason)
        .await?;
    Ok(Json(subscription.into()))
}

pub async fn bulk_approve(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Json(request): Json<BulkDecisionRequest>,
) -> Result<Json<BulkDecisionOutcome>> {
    let outcome = state
        .service_context
        .approval_service
        .bulk_approve(&request.subscription_ids, reviewer.id)
        .await?;
    Ok(Json(outcome))
}

pub async fn bulk_reject(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Json(request): Json<BulkDecisionRequest>,
) -> Result<Json<BulkDecisionOutcome>> {
    let outcome = state
        .service_context
        .approval_service
        .bulk_reject(&request.subscription_ids, reviewer.id, request.reason)
        .await?;
    Ok(Json(outcome))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(_reviewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionDto>> {
    let subscription = state.service_context.approval_service.cancel(id).await?;
    Ok(Json(subscription.into()))
}

pub async fn reactivate(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionDto>> {
    let subscription = state
        .service_context
        .approval_service
        .reactivate(id, reviewer.id)
        .await?;
    Ok(Json(subscription.into()))
}

pub async fn refund(
    State(state): State<AppState>,
    Extension(reviewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<SubscriptionDto>> {
    let subscription = state
        .service_context
        .approval_service
        .refund(id, reviewer.id, request)
        .await?;
    Ok(Json(subscription.into()))
}

/// Explicit destructive operation, outside the normal lifecycle.
pub async fn purge_user_subscriptions(
    State(state): State<AppState>,
    Extension(_reviewer): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let deleted = state
        .service_context
        .subscription_repo
        .delete_for_user(user_id)
        .await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct PlanListParams {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanListResponse {
    plans: Vec<PlanDto>,
}

pub async fn list_plans(
    State(state): State<AppState>,
    Query(params): Query<PlanListParams>,
) -> Result<Json<PlanListResponse>> {
    let plans = state
        .service_context
        .plan_service
        .list(params.include_inactive)
        .await?;
    Ok(Json(PlanListResponse {
        plans: plans.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanDto>)> {
    let plan = state.service_context.plan_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<PlanDto>> {
    let plan = state
        .service_context
        .plan_service
        .update(id, request)
        .await?;
    Ok(Json(plan.into()))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.plan_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
