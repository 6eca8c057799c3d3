use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::orders::{AttachInstallmentPlanEntity, OrderEntity};

#[automock]
#[async_trait]
pub trait OrderRepository {
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;

    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<OrderEntity>>;

    /// Writes period, interval, stripe reference and status in a single statement,
    /// only while the order still has no stripe reference and accepts a plan.
    /// `None` means another selection got there first.
    async fn attach_installment_plan(
        &self,
        order_id: Uuid,
        plan: AttachInstallmentPlanEntity,
    ) -> Result<Option<OrderEntity>>;
}
