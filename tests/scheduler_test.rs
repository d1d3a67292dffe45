use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bandhan::{
    config::Settings,
    domain::{
        CreatePlanRequest, CreateSubscriptionRequest, EntitlementStatus, EntitlementSummary,
        EntitlementWindow, PaymentMethod, SubscriptionStatus, WarningStage,
    },
    notifier::{Notification, NotificationEvent, Notifier, NotifierSet},
    scheduler::Scheduler,
    service::ServiceContext,
};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

/// Captures dispatched notifications for assertions.
struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn notify(&self, notification: &Notification) -> bandhan::error::Result<()> {
        self.events.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct Harness {
    ctx: Arc<ServiceContext>,
    scheduler: Scheduler,
    events: Arc<Mutex<Vec<Notification>>>,
}

impl Harness {
    fn warnings(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n.event, NotificationEvent::ExpiryWarning { .. }))
            .count()
    }

    fn expirations(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n.event, NotificationEvent::SubscriptionExpired { .. }))
            .count()
    }
}

async fn setup() -> anyhow::Result<Harness> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let events = Arc::new(Mutex::new(Vec::new()));
    let notifier = Arc::new(NotifierSet::new());
    notifier
        .register(Arc::new(RecordingNotifier {
            events: events.clone(),
        }))
        .await;

    let ctx = Arc::new(ServiceContext::new(&settings, notifier.clone(), pool));
    let scheduler = Scheduler::new(
        ctx.subscription_repo.clone(),
        ctx.entitlement_repo.clone(),
        notifier,
    );
    Ok(Harness {
        ctx,
        scheduler,
        events,
    })
}

/// Submit a request and approve it at the repository level with an explicit
/// window, so tests can place subscriptions anywhere on the timeline.
async fn approved_with_window(
    harness: &Harness,
    user: Uuid,
    window: EntitlementWindow,
    auto_renew: bool,
) -> anyhow::Result<Uuid> {
    let plan = harness
        .ctx
        .plan_service
        .create(CreatePlanRequest {
            name: "1 Month".to_string(),
            duration_days: 30,
            price: 499,
            currency: None,
            display_order: None,
        })
        .await?;

    let subscription = harness
        .ctx
        .subscription_service
        .create_request(
            user,
            CreateSubscriptionRequest {
                plan_id: plan.id,
                payment_method: PaymentMethod::Upi,
                upi_amount: 499,
                cash_amount: 0,
                auto_renew,
            },
        )
        .await?;
    harness
        .ctx
        .subscription_repo
        .approve(subscription.id, window, Uuid::new_v4(), Utc::now())
        .await?;
    Ok(subscription.id)
}

#[tokio::test]
async fn test_warning_stages_progress_and_are_idempotent() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    let end = now + Duration::days(6);
    let w = EntitlementWindow {
        start_date: now - Duration::days(24),
        end_date: end,
        grace_period_end: end + Duration::days(7),
    };
    let sub_id = approved_with_window(&harness, Uuid::new_v4(), w, false).await?;

    // Six days out: the 7-day warning is due.
    harness.scheduler.warning_sweep(now).await?;
    assert_eq!(harness.warnings(), 1);
    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    assert_eq!(sub.warning_stage, WarningStage::SevenDay);

    // Re-running the same sweep sends nothing more.
    harness.scheduler.warning_sweep(now).await?;
    assert_eq!(harness.warnings(), 1);

    // Two days out: the 3-day warning fires.
    harness.scheduler.warning_sweep(now + Duration::days(4)).await?;
    assert_eq!(harness.warnings(), 2);
    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    assert_eq!(sub.warning_stage, WarningStage::ThreeDay);

    // One day out: the final warning.
    harness.scheduler.warning_sweep(now + Duration::days(5)).await?;
    assert_eq!(harness.warnings(), 3);
    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    assert_eq!(sub.warning_stage, WarningStage::OneDay);

    Ok(())
}

#[tokio::test]
async fn test_missed_seven_day_window_does_not_suppress_later_warnings() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    // First sweep happens only 2 days before the end: the 7-day threshold
    // came and went while the scheduler was down.
    let end = now + Duration::days(2);
    let w = EntitlementWindow {
        start_date: now - Duration::days(28),
        end_date: end,
        grace_period_end: end + Duration::days(7),
    };
    let sub_id = approved_with_window(&harness, Uuid::new_v4(), w, false).await?;

    harness.scheduler.warning_sweep(now).await?;
    assert_eq!(harness.warnings(), 1);
    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    // Jumps straight to the deepest due stage.
    assert_eq!(sub.warning_stage, WarningStage::ThreeDay);

    Ok(())
}

#[tokio::test]
async fn test_expiration_sweep_is_idempotent() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    let w = EntitlementWindow {
        start_date: now - Duration::days(40),
        end_date: now - Duration::days(10),
        grace_period_end: now - Duration::days(3),
    };
    let user = Uuid::new_v4();
    let sub_id = approved_with_window(&harness, user, w, false).await?;

    let stats = harness.scheduler.expiration_sweep(now).await?;
    assert_eq!(stats.expired, 1);
    assert_eq!(harness.expirations(), 1);

    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Expired);
    // History preserved through expiration.
    assert!(sub.end_date.is_some());

    let entitlement = harness.ctx.entitlement_repo.find(user).await?.unwrap();
    assert_eq!(entitlement.status, EntitlementStatus::Expired);

    // Repeated sweeps are no-ops: no double demotion, no extra notification.
    let stats = harness.scheduler.expiration_sweep(now).await?;
    assert_eq!(stats.expired, 0);
    assert_eq!(harness.expirations(), 1);

    Ok(())
}

#[tokio::test]
async fn test_expiration_keeps_entitlement_for_stacked_subscription() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    let user = Uuid::new_v4();

    // Superseded record: window and grace fully elapsed.
    let w1 = EntitlementWindow {
        start_date: now - Duration::days(44),
        end_date: now - Duration::days(14),
        grace_period_end: now - Duration::days(7),
    };
    let first = approved_with_window(&harness, user, w1, false).await?;

    // Stacked upgrade, still active for months.
    let stacked_end = now + Duration::days(76);
    let w2 = EntitlementWindow {
        start_date: now - Duration::days(14),
        end_date: stacked_end,
        grace_period_end: stacked_end + Duration::days(7),
    };
    let second = approved_with_window(&harness, user, w2, false).await?;

    // The cached summary as the upgrade approval left it.
    harness
        .ctx
        .entitlement_repo
        .upsert(EntitlementSummary {
            user_id: user,
            status: EntitlementStatus::Active,
            plan_name: Some("1 Month".to_string()),
            expires_at: Some(stacked_end),
            updated_at: now,
        })
        .await?;

    let stats = harness.scheduler.expiration_sweep(now).await?;
    assert_eq!(stats.expired, 1);

    // Only the superseded record is demoted.
    let s1 = harness.ctx.subscription_repo.find_by_id(first).await?.unwrap();
    assert_eq!(s1.status, SubscriptionStatus::Expired);
    let s2 = harness.ctx.subscription_repo.find_by_id(second).await?.unwrap();
    assert_eq!(s2.status, SubscriptionStatus::Approved);

    // The summary still reflects the live stacked window.
    let entitlement = harness.ctx.entitlement_repo.find(user).await?.unwrap();
    assert_eq!(entitlement.status, EntitlementStatus::Active);
    assert_eq!(entitlement.expires_at, Some(stacked_end));

    // The superseded record still gets its expiration notice.
    assert_eq!(harness.expirations(), 1);

    Ok(())
}

#[tokio::test]
async fn test_grace_period_defers_expiration() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    // Past end_date but still inside grace: must not expire.
    let w = EntitlementWindow {
        start_date: now - Duration::days(33),
        end_date: now - Duration::days(3),
        grace_period_end: now + Duration::days(4),
    };
    let user = Uuid::new_v4();
    let sub_id = approved_with_window(&harness, user, w, false).await?;

    let stats = harness.scheduler.expiration_sweep(now).await?;
    assert_eq!(stats.expired, 0);
    let sub = harness.ctx.subscription_repo.find_by_id(sub_id).await?.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Approved);
    assert!(sub.is_active_at(now));

    // Once grace elapses, the same sweep demotes it.
    let later = now + Duration::days(5);
    let stats = harness.scheduler.expiration_sweep(later).await?;
    assert_eq!(stats.expired, 1);
    let entitlement = harness.ctx.entitlement_repo.find(user).await?.unwrap();
    assert_eq!(entitlement.status, EntitlementStatus::Expired);

    Ok(())
}

#[tokio::test]
async fn test_auto_renewal_spawns_single_pending_request() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    let end = now + Duration::hours(12);
    let w = EntitlementWindow {
        start_date: now - Duration::days(29),
        end_date: end,
        grace_period_end: end + Duration::days(7),
    };
    let user = Uuid::new_v4();
    let sub_id = approved_with_window(&harness, user, w, true).await?;

    let stats = harness.scheduler.renewal_sweep(now).await?;
    assert_eq!(stats.renewals_spawned, 1);

    let history = harness.ctx.subscription_repo.list_for_user(user).await?;
    assert_eq!(history.len(), 2);
    let renewal = history
        .iter()
        .find(|s| s.id != sub_id)
        .expect("renewal record");
    assert_eq!(renewal.status, SubscriptionStatus::Pending);
    assert!(renewal.auto_renew);
    // Pre-filled from the expiring record's snapshot.
    assert_eq!(renewal.amount, 499);
    assert_eq!(renewal.plan_name, "1 Month");
    assert!(renewal.start_date.is_none());

    // The one-pending constraint suppresses a duplicate spawn.
    let stats = harness.scheduler.renewal_sweep(now).await?;
    assert_eq!(stats.renewals_spawned, 0);
    let history = harness.ctx.subscription_repo.list_for_user(user).await?;
    assert_eq!(history.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_renewal_ignores_opted_out_subscriptions() -> anyhow::Result<()> {
    let harness = setup().await?;
    let now = Utc::now();
    let end = now + Duration::hours(12);
    let w = EntitlementWindow {
        start_date: now - Duration::days(29),
        end_date: end,
        grace_period_end: end + Duration::days(7),
    };
    let user = Uuid::new_v4();
    approved_with_window(&harness, user, w, false).await?;

    let stats = harness.scheduler.renewal_sweep(now).await?;
    assert_eq!(stats.renewals_spawned, 0);
    let history = harness.ctx.subscription_repo.list_for_user(user).await?;
    assert_eq!(history.len(), 1);

    Ok(())
}
