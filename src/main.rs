use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bandhan::{
    api,
    config::Settings,
    notifier::{webhook::WebhookNotifier, NotifierSet},
    scheduler::Scheduler,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bandhan=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting bandhan server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Register notifiers
    let notifier = Arc::new(NotifierSet::new());
    if let Some(webhook) = WebhookNotifier::new(&settings.notifier) {
        notifier.register(Arc::new(webhook)).await;
    } else {
        tracing::info!("Notification webhook disabled");
    }

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        &settings,
        notifier.clone(),
        db_pool.clone(),
    ));

    // Spawn the background sweeps
    if settings.scheduler.enabled {
        let scheduler = Arc::new(Scheduler::new(
            service_context.subscription_repo.clone(),
            service_context.entitlement_repo.clone(),
            notifier,
        ));
        tokio::spawn(scheduler.clone().run_daily_loop(settings.scheduler.clone()));
        tokio::spawn(scheduler.run_expiration_loop(settings.scheduler.clone()));
        tracing::info!("Scheduler sweeps started");
    } else {
        tracing::info!("Scheduler disabled");
    }

    // Create API app
    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
