use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::transactions::TransactionEntity,
    value_objects::enums::{order_statuses::OrderStatus, transaction_statuses::TransactionStatus},
};

/// Result of a paid or failed invoice, applied to an order and its transaction together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Paid,
    Failed,
}

impl InvoiceOutcome {
    pub fn transaction_status(&self) -> TransactionStatus {
        match self {
            InvoiceOutcome::Paid => TransactionStatus::Completed,
            InvoiceOutcome::Failed => TransactionStatus::Failed,
        }
    }

    pub fn order_status(&self) -> OrderStatus {
        match self {
            InvoiceOutcome::Paid => OrderStatus::Active,
            InvoiceOutcome::Failed => OrderStatus::Failed,
        }
    }

    /// Whether the outcome may overwrite a transaction in `current` status.
    /// A failure arriving after the invoice was paid is stale.
    pub fn applies_to(&self, current: Option<TransactionStatus>) -> bool {
        !(*self == InvoiceOutcome::Failed && current == Some(TransactionStatus::Completed))
    }
}

/// Status the order should move to, given its current status, the invoice
/// outcome and how many installments are paid so far.
pub fn next_order_status(
    current: OrderStatus,
    outcome: InvoiceOutcome,
    completed_installments: i64,
    period: Option<i32>,
) -> OrderStatus {
    let target = outcome.order_status();
    let mut next = if current.can_transition_to(target) {
        target
    } else {
        current
    };

    let all_paid = period.is_some_and(|period| completed_installments >= i64::from(period));
    if outcome == InvoiceOutcome::Paid && next == OrderStatus::Active && all_paid {
        next = OrderStatus::Completed;
    }

    next
}

/// Order status the reconciliation settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciledOrder {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub completed_installments: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionDto {
    pub id: Uuid,
    pub invoice_id: String,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: Option<TransactionStatus>,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionEntity> for TransactionDto {
    fn from(transaction: TransactionEntity) -> Self {
        let status = transaction.status();

        Self {
            id: transaction.id,
            invoice_id: transaction.stripe_id,
            order_id: transaction.order_id,
            customer_id: transaction.customer_id,
            customer_name: transaction.customer_name,
            product_id: transaction.product_id,
            product_name: transaction.product_name,
            amount_minor: transaction.amount_minor,
            currency: transaction.currency,
            status,
            created_at: transaction.created_at,
        }
    }
}
