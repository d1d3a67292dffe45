use std::sync::Arc;

use bandhan::{
    config::Settings,
    domain::{CreatePlanRequest, CreateSubscriptionRequest, PaymentMethod, UpdatePlanRequest},
    error::AppError,
    notifier::NotifierSet,
    service::ServiceContext,
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

async fn setup() -> anyhow::Result<Arc<ServiceContext>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let notifier = Arc::new(NotifierSet::new());
    Ok(Arc::new(ServiceContext::new(&settings, notifier, pool)))
}

fn plan_request(name: &str, days: i64, price: i64, order: Option<i64>) -> CreatePlanRequest {
    CreatePlanRequest {
        name: name.to_string(),
        duration_days: days,
        price,
        currency: None,
        display_order: order,
    }
}

#[tokio::test]
async fn test_create_applies_defaults() -> anyhow::Result<()> {
    let ctx = setup().await?;

    let plan = ctx
        .plan_service
        .create(plan_request("1 Month", 30, 499, None))
        .await?;
    assert_eq!(plan.currency, "INR");
    assert!(plan.active);

    Ok(())
}

#[tokio::test]
async fn test_create_validates_fields() -> anyhow::Result<()> {
    let ctx = setup().await?;

    let result = ctx
        .plan_service
        .create(plan_request("   ", 30, 499, None))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = ctx
        .plan_service
        .create(plan_request("Free Trial", 0, 0, None))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = ctx
        .plan_service
        .create(plan_request("1 Month", 30, -1, None))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn test_list_orders_by_display_order_and_filters_inactive() -> anyhow::Result<()> {
    let ctx = setup().await?;

    ctx.plan_service
        .create(plan_request("1 Year", 365, 3999, Some(3)))
        .await?;
    ctx.plan_service
        .create(plan_request("1 Month", 30, 499, Some(1)))
        .await?;
    let quarterly = ctx
        .plan_service
        .create(plan_request("3 Months", 90, 1299, Some(2)))
        .await?;

    let plans = ctx.plan_service.list(false).await?;
    let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["1 Month", "3 Months", "1 Year"]);

    // Deactivated plans drop out of the member-facing catalog but stay
    // visible to admins.
    ctx.plan_service
        .update(
            quarterly.id,
            UpdatePlanRequest {
                active: Some(false),
                ..Default::default()
            },
        )
        .await?;
    let visible = ctx.plan_service.list(false).await?;
    assert_eq!(visible.len(), 2);
    let all = ctx.plan_service.list(true).await?;
    assert_eq!(all.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_update_changes_catalog_only() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = ctx
        .plan_service
        .create(plan_request("1 Month", 30, 499, None))
        .await?;

    let updated = ctx
        .plan_service
        .update(
            plan.id,
            UpdatePlanRequest {
                name: Some("Monthly".to_string()),
                price: Some(599),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.name, "Monthly");
    assert_eq!(updated.price, 599);
    assert_eq!(updated.duration_days, 30);

    let result = ctx
        .plan_service
        .update(
            plan.id,
            UpdatePlanRequest {
                price: Some(-5),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn test_delete_blocked_while_referenced() -> anyhow::Result<()> {
    let ctx = setup().await?;
    let plan = ctx
        .plan_service
        .create(plan_request("1 Month", 30, 499, None))
        .await?;

    ctx.subscription_service
        .create_request(
            Uuid::new_v4(),
            CreateSubscriptionRequest {
                plan_id: plan.id,
                payment_method: PaymentMethod::Upi,
                upi_amount: 499,
                cash_amount: 0,
                auto_renew: false,
            },
        )
        .await?;

    let result = ctx.plan_service.delete(plan.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(ctx.plan_service.get(plan.id).await?.is_some());

    // An unreferenced plan deletes cleanly.
    let unused = ctx
        .plan_service
        .create(plan_request("3 Months", 90, 1299, None))
        .await?;
    ctx.plan_service.delete(unused.id).await?;
    assert!(ctx.plan_service.get(unused.id).await?.is_none());

    let result = ctx.plan_service.delete(unused.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}
