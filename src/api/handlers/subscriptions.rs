use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{
        handlers::types::{InvoiceDto, SubscriptionDto},
        middleware::auth::CurrentUser,
        state::AppState,
    },
    domain::CreateSubscriptionRequest,
    error::{AppError, Result},
    uploads,
};

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    subscription: Option<SubscriptionDto>,
    is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    subscriptions: Vec<SubscriptionDto>,
    total: usize,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionDto>)> {
    let subscription = state
        .service_context
        .subscription_service
        .create_request(user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn create_upgrade(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionDto>)> {
    let subscription = state
        .service_context
        .subscription_service
        .create_upgrade_request(user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn current(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<CurrentSubscriptionResponse>> {
    let current = state
        .service_context
        .subscription_service
        .current(user.id)
        .await?;
    Ok(Json(CurrentSubscriptionResponse {
        subscription: current.subscription.map(Into::into),
        is_active: current.is_active,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<HistoryResponse>> {
    let subscriptions = state
        .service_context
        .subscription_service
        .history(user.id)
        .await?;
    let total = subscriptions.len();
    Ok(Json(HistoryResponse {
        subscriptions: subscriptions.into_iter().map(Into::into).collect(),
        total,
    }))
}

pub async fn invoice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDto>> {
    let invoice = state
        .service_context
        .subscription_service
        .invoice_for(user.id, id)
        .await?;
    Ok(Json(invoice.into()))
}

pub async fn upload_proof(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SubscriptionDto>> {
    let mut saved_path: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Validation("Missing filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        saved_path =
            Some(uploads::save_payment_proof(&state.settings.uploads.dir, &filename, &data).await?);
        break;
    }

    let path =
        saved_path.ok_or_else(|| AppError::Validation("Missing image field".to_string()))?;

    let subscription = state
        .service_context
        .subscription_service
        .attach_payment_proof(user.id, id, &path)
        .await?;
    Ok(Json(subscription.into()))
}
