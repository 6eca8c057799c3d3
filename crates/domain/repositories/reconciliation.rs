use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::transactions::{InvoiceOutcome, ReconciledOrder};

#[automock]
#[async_trait]
pub trait ReconciliationRepository {
    /// Moves the transaction and its order to the outcome's statuses inside one
    /// database transaction. A paid invoice completes the order once the number
    /// of completed transactions reaches the order's period.
    async fn apply_invoice_outcome(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        outcome: InvoiceOutcome,
    ) -> Result<ReconciledOrder>;
}
