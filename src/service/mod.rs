pub mod approval_service;
pub mod invoice_service;
pub mod plan_service;
pub mod subscription_service;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Settings;
use crate::notifier::NotifierSet;
use crate::repository::*;

pub use approval_service::ApprovalService;
pub use invoice_service::InvoiceService;
pub use plan_service::PlanService;
pub use subscription_service::{CurrentSubscription, SubscriptionService};

pub struct ServiceContext {
    pub plan_service: Arc<PlanService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub approval_service: Arc<ApprovalService>,
    pub invoice_service: Arc<InvoiceService>,
    pub subscription_repo: Arc<dyn SubscriptionRepository>,
    pub entitlement_repo: Arc<dyn EntitlementRepository>,
    pub notifier: Arc<NotifierSet>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(settings: &Settings, notifier: Arc<NotifierSet>, db_pool: SqlitePool) -> Self {
        let plan_repo: Arc<dyn PlanRepository> =
            Arc::new(SqlitePlanRepository::new(db_pool.clone()));
        let subscription_repo: Arc<dyn SubscriptionRepository> =
            Arc::new(SqliteSubscriptionRepository::new(db_pool.clone()));
        let invoice_repo: Arc<dyn InvoiceRepository> =
            Arc::new(SqliteInvoiceRepository::new(db_pool.clone()));
        let sequence_repo: Arc<dyn SequenceRepository> =
            Arc::new(SqliteSequenceRepository::new(db_pool.clone()));
        let entitlement_repo: Arc<dyn EntitlementRepository> =
            Arc::new(SqliteEntitlementRepository::new(db_pool.clone()));

        let plan_service = Arc::new(PlanService::new(plan_repo.clone()));
        let invoice_service = Arc::new(InvoiceService::new(invoice_repo.clone(), sequence_repo));
        let subscription_service = Arc::new(SubscriptionService::new(
            subscription_repo.clone(),
            plan_repo,
            invoice_repo,
            settings.billing.amount_tolerance,
        ));
        let approval_service = Arc::new(ApprovalService::new(
            subscription_repo.clone(),
            entitlement_repo.clone(),
            invoice_service.clone(),
            notifier.clone(),
            settings.billing.grace_period_days,
        ));

        Self {
            plan_service,
            subscription_service,
            approval_service,
            invoice_service,
            subscription_repo,
            entitlement_repo,
            notifier,
            db_pool,
        }
    }
}
