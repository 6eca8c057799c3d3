use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::transactions::{InsertTransactionEntity, TransactionEntity},
    value_objects::transactions::TransactionFilter,
};

#[automock]
#[async_trait]
pub trait TransactionRepository {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<TransactionEntity>>;

    /// Returns `false` when a row for the same invoice already exists.
    async fn insert_if_absent(&self, transaction: InsertTransactionEntity) -> Result<bool>;

    async fn list_by_merchant(
        &self,
        merchant_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionEntity>>;
}
