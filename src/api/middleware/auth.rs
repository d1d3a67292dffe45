use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;

/// Identity established by the platform gateway. Session issuance happens
/// upstream; by the time a request reaches this service the gateway has
/// authenticated it and stamped these headers.
#[derive(Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

fn extract_identity(request: &Request) -> Result<CurrentUser, AppError> {
    let id = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::Unauthorized)?;

    let role = match request
        .headers()
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
    {
        Some("admin") => Role::Admin,
        _ => Role::User,
    };

    Ok(CurrentUser { id, role })
}

pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = extract_identity(&request)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub async fn require_admin(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = extract_identity(&request)?;
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
