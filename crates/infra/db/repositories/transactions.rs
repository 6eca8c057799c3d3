use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};
use domain::{
    entities::transactions::{InsertTransactionEntity, TransactionEntity},
    repositories::transactions::TransactionRepository,
    value_objects::transactions::TransactionFilter,
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction = transactions::table
            .filter(transactions::stripe_id.eq(stripe_id))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(transaction)
    }

    async fn insert_if_absent(&self, transaction: InsertTransactionEntity) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Unique index on stripe_id backs up the existence check done by callers.
        let inserted = insert_into(transactions::table)
            .values(&transaction)
            .on_conflict(transactions::stripe_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    async fn list_by_merchant(
        &self,
        merchant_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = transactions::table
            .filter(transactions::merchant_id.eq(merchant_id))
            .select(TransactionEntity::as_select())
            .order(transactions::created_at.desc())
            .into_boxed();

        if let Some(status) = filter.status {
            query = query.filter(transactions::status.eq(status.as_str()));
        }

        let results = query.load::<TransactionEntity>(&mut conn)?;

        Ok(results)
    }
}
