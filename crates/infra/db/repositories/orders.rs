use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::orders},
};
use domain::{
    entities::orders::{AttachInstallmentPlanEntity, OrderEntity},
    repositories::orders::OrderRepository,
    value_objects::enums::order_statuses::OrderStatus,
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .find(order_id)
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .filter(orders::stripe_id.eq(stripe_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn attach_installment_plan(
        &self,
        order_id: Uuid,
        plan: AttachInstallmentPlanEntity,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let selectable: Vec<&str> = OrderStatus::PLAN_SELECTABLE
            .iter()
            .map(OrderStatus::as_str)
            .collect();

        let order = update(orders::table.find(order_id))
            .filter(orders::stripe_id.is_null())
            .filter(orders::status.eq_any(selectable))
            .set(&plan)
            .returning(OrderEntity::as_returning())
            .get_result::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }
}
