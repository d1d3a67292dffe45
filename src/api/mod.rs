pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // User-facing API
        .nest("/api/plans", plan_routes())
        .nest("/api/subscriptions", subscription_routes())
        // Reviewer back-office
        .nest("/admin", admin_routes())
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::plans::list))
        .route_layer(axum::middleware::from_fn(
            middleware::auth::require_auth,
        ))
}

fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::subscriptions::create))
        .route("/upgrade", post(handlers::subscriptions::create_upgrade))
        .route("/current", get(handlers::subscriptions::current))
        .route("/history", get(handlers::subscriptions::history))
        .route("/:id/invoice", get(handlers::subscriptions::invoice))
        .route("/:id/proof", post(handlers::subscriptions::upload_proof))
        .route_layer(axum::middleware::from_fn(
            middleware::auth::require_auth,
        ))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/bulk-approve", post(handlers::admin::bulk_approve))
        .route("/subscriptions/bulk-reject", post(handlers::admin::bulk_reject))
        .route("/subscriptions/:id/approve", post(handlers::admin::approve))
        .route("/subscriptions/:id/reject", post(handlers::admin::reject))
        .route("/subscriptions/:id/cancel", post(handlers::admin::cancel))
        .route("/subscriptions/:id/reactivate", post(handlers::admin::reactivate))
        .route("/subscriptions/:id/refund", post(handlers::admin::refund))
        .route("/users/:user_id/subscriptions", delete(handlers::admin::purge_user_subscriptions))
        // Plan management
        .route("/plans", get(handlers::admin::list_plans))
        .route("/plans", post(handlers::admin::create_plan))
        .route("/plans/:id", put(handlers::admin::update_plan))
        .route("/plans/:id", delete(handlers::admin::delete_plan))
        .route_layer(axum::middleware::from_fn(
            middleware::auth::require_admin,
        ))
}
