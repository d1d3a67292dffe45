use std::collections::HashSet;
use std::sync::Arc;

use bandhan::{
    billing::{invoice_number, window},
    config::Settings,
    domain::{CreatePlanRequest, CreateSubscriptionRequest, PaymentMethod},
    notifier::NotifierSet,
    repository::{InvoiceRepository, SqliteInvoiceRepository},
    service::ServiceContext,
};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

async fn setup() -> anyhow::Result<(Arc<ServiceContext>, sqlx::SqlitePool)> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let notifier = Arc::new(NotifierSet::new());
    let ctx = Arc::new(ServiceContext::new(&settings, notifier, pool.clone()));
    Ok((ctx, pool))
}

/// Create and approve a subscription at the repository level so it carries a
/// window, without going through invoice issuance.
async fn approved_subscription(
    ctx: &ServiceContext,
    plan_id: Uuid,
) -> anyhow::Result<bandhan::domain::Subscription> {
    let user = Uuid::new_v4();
    let subscription = ctx
        .subscription_service
        .create_request(
            user,
            CreateSubscriptionRequest {
                plan_id,
                payment_method: PaymentMethod::Cash,
                upi_amount: 0,
                cash_amount: 499,
                auto_renew: false,
            },
        )
        .await?;

    let now = Utc::now();
    let w = window::approval_window(now, 30, 7, None);
    ctx.subscription_repo
        .approve(subscription.id, w, Uuid::new_v4(), now)
        .await?;
    Ok(ctx
        .subscription_repo
        .find_by_id(subscription.id)
        .await?
        .unwrap())
}

async fn seed_plan(ctx: &ServiceContext) -> anyhow::Result<Uuid> {
    let plan = ctx
        .plan_service
        .create(CreatePlanRequest {
            name: "1 Month".to_string(),
            duration_days: 30,
            price: 499,
            currency: None,
            display_order: None,
        })
        .await?;
    Ok(plan.id)
}

#[tokio::test]
async fn test_numbers_are_sequential_within_month() -> anyhow::Result<()> {
    let (ctx, _pool) = setup().await?;
    let plan_id = seed_plan(&ctx).await?;
    let now = Utc::now();
    let period = invoice_number::period_for(now);

    for expected in 1..=3 {
        let subscription = approved_subscription(&ctx, plan_id).await?;
        let invoice = ctx
            .invoice_service
            .issue_for_subscription(&subscription, now)
            .await?;
        assert_eq!(
            invoice.invoice_number,
            invoice_number::format_number(&period, expected)
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_numbers_never_collide() -> anyhow::Result<()> {
    let (ctx, _pool) = setup().await?;
    let plan_id = seed_plan(&ctx).await?;
    let now = Utc::now();

    let mut seen = HashSet::new();
    for _ in 0..25 {
        let subscription = approved_subscription(&ctx, plan_id).await?;
        let invoice = ctx
            .invoice_service
            .issue_for_subscription(&subscription, now)
            .await?;
        assert!(
            seen.insert(invoice.invoice_number.clone()),
            "duplicate invoice number {}",
            invoice.invoice_number
        );
    }
    assert_eq!(seen.len(), 25);

    Ok(())
}

#[tokio::test]
async fn test_counter_converges_past_manually_issued_numbers() -> anyhow::Result<()> {
    let (ctx, pool) = setup().await?;
    let plan_id = seed_plan(&ctx).await?;
    let now = Utc::now();
    let period = invoice_number::period_for(now);

    // Simulate a number issued outside the counter (scan-path history):
    // occupy the first two slots directly.
    let invoice_repo = SqliteInvoiceRepository::new(pool);
    let occupied = approved_subscription(&ctx, plan_id).await?;
    for seq in 1..=2 {
        invoice_repo
            .create(bandhan::domain::Invoice {
                id: Uuid::new_v4(),
                invoice_number: invoice_number::format_number(&period, seq),
                user_id: occupied.user_id,
                subscription_id: occupied.id,
                amount: occupied.amount,
                upi_amount: occupied.upi_amount,
                cash_amount: occupied.cash_amount,
                period_start: occupied.start_date.unwrap(),
                period_end: occupied.end_date.unwrap(),
                status: bandhan::domain::InvoiceStatus::Paid,
                created_at: now,
            })
            .await?;
    }

    // The counter starts behind the occupied slots and must retry past them
    // without ever reusing a number.
    let subscription = approved_subscription(&ctx, plan_id).await?;
    let invoice = ctx
        .invoice_service
        .issue_for_subscription(&subscription, now)
        .await?;
    assert_eq!(
        invoice.invoice_number,
        invoice_number::format_number(&period, 3)
    );

    Ok(())
}

#[tokio::test]
async fn test_scan_ignores_fallback_numbers() -> anyhow::Result<()> {
    let (ctx, pool) = setup().await?;
    let plan_id = seed_plan(&ctx).await?;
    let now = Utc::now();
    let period = invoice_number::period_for(now);
    let repo = SqliteInvoiceRepository::new(pool);

    // No invoices at all: no high-water mark.
    assert_eq!(repo.max_sequence_for_period(&period).await?, None);

    // A fallback-format number in the partition is not a high-water mark.
    let subscription = approved_subscription(&ctx, plan_id).await?;
    repo.create(bandhan::domain::Invoice {
        id: Uuid::new_v4(),
        invoice_number: invoice_number::fallback_number(&period, now),
        user_id: subscription.user_id,
        subscription_id: subscription.id,
        amount: subscription.amount,
        upi_amount: subscription.upi_amount,
        cash_amount: subscription.cash_amount,
        period_start: subscription.start_date.unwrap(),
        period_end: subscription.end_date.unwrap(),
        status: bandhan::domain::InvoiceStatus::Paid,
        created_at: now,
    })
    .await?;
    assert_eq!(repo.max_sequence_for_period(&period).await?, None);

    Ok(())
}
