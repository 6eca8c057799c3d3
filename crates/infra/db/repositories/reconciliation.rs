use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{orders, transactions},
    },
};
use domain::{
    repositories::reconciliation::ReconciliationRepository,
    value_objects::{
        enums::{order_statuses::OrderStatus, transaction_statuses::TransactionStatus},
        transactions::{InvoiceOutcome, ReconciledOrder, next_order_status},
    },
};

pub struct ReconciliationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ReconciliationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ReconciliationRepository for ReconciliationPostgres {
    async fn apply_invoice_outcome(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        outcome: InvoiceOutcome,
    ) -> Result<ReconciledOrder> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let now = Utc::now();

            let (raw_status, period) = orders::table
                .find(order_id)
                .select((orders::status, orders::period))
                .for_update()
                .first::<(String, Option<i32>)>(conn)?;
            let current = OrderStatus::from_str(&raw_status)
                .ok_or_else(|| anyhow!("order {order_id} has unknown status `{raw_status}`"))?;

            let raw_transaction_status = transactions::table
                .find(transaction_id)
                .filter(transactions::order_id.eq(order_id))
                .select(transactions::status)
                .for_update()
                .first::<String>(conn)
                .optional()?
                .ok_or_else(|| {
                    anyhow!("transaction {transaction_id} does not belong to order {order_id}")
                })?;
            let current_transaction = TransactionStatus::from_str(&raw_transaction_status);

            if !outcome.applies_to(current_transaction) {
                warn!(
                    %order_id,
                    %transaction_id,
                    transaction_status = %raw_transaction_status,
                    outcome = ?outcome,
                    "reconciliation: stale outcome for a paid transaction, nothing changed"
                );
                return Ok(ReconciledOrder {
                    order_id,
                    status: current,
                    completed_installments: count_completed(conn, order_id)?,
                });
            }

            update(transactions::table.find(transaction_id))
                .set((
                    transactions::status.eq(outcome.transaction_status().as_str()),
                    transactions::updated_at.eq(now),
                ))
                .execute(conn)?;

            let completed_installments = count_completed(conn, order_id)?;

            let next = next_order_status(current, outcome, completed_installments, period);
            if next == current && current != outcome.order_status() {
                warn!(
                    %order_id,
                    current_status = %current,
                    outcome = ?outcome,
                    "reconciliation: order status left unchanged"
                );
            }

            if next != current {
                update(orders::table.find(order_id))
                    .set((orders::status.eq(next.as_str()), orders::updated_at.eq(now)))
                    .execute(conn)?;
            }

            Ok(ReconciledOrder {
                order_id,
                status: next,
                completed_installments,
            })
        })
    }
}

fn count_completed(conn: &mut PgConnection, order_id: Uuid) -> Result<i64> {
    let completed = transactions::table
        .filter(transactions::order_id.eq(order_id))
        .filter(transactions::status.eq(TransactionStatus::Completed.as_str()))
        .count()
        .get_result::<i64>(conn)?;
    Ok(completed)
}
