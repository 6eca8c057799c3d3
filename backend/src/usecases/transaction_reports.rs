use std::sync::Arc;

use anyhow::{Context, Result};
use camino::domain::{
    repositories::transactions::TransactionRepository,
    value_objects::{
        money::format_minor_units,
        transactions::{TransactionDto, TransactionFilter},
    },
};
use csv::Writer;
use tracing::{error, info};
use uuid::Uuid;

pub const CSV_HEADER: [&str; 8] = [
    "Transaction ID",
    "Invoice",
    "Customer",
    "Product",
    "Amount",
    "Currency",
    "Status",
    "Created At",
];

pub struct TransactionReportUseCase<T>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    transaction_repo: Arc<T>,
}

impl<T> TransactionReportUseCase<T>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    pub fn new(transaction_repo: Arc<T>) -> Self {
        Self { transaction_repo }
    }

    /// Merchant's transactions, newest first.
    pub async fn list(
        &self,
        merchant_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionDto>> {
        info!(%merchant_id, status = ?filter.status, "transaction reports: listing transactions");
        let transactions = self
            .transaction_repo
            .list_by_merchant(merchant_id, filter)
            .await
            .map_err(|err| {
                error!(%merchant_id, db_error = ?err, "transaction reports: failed to list transactions");
                err
            })?;

        info!(
            %merchant_id,
            transaction_count = transactions.len(),
            "transaction reports: transactions loaded"
        );
        Ok(transactions.into_iter().map(TransactionDto::from).collect())
    }

    pub async fn export_csv(&self, merchant_id: Uuid, filter: TransactionFilter) -> Result<String> {
        let transactions = self.list(merchant_id, filter).await?;
        render_csv(&transactions)
    }
}

pub fn render_csv(transactions: &[TransactionDto]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .context("failed to write csv header")?;

    for transaction in transactions {
        let status = transaction
            .status
            .map(|status| status.to_string())
            .unwrap_or_default();

        writer
            .write_record([
                transaction.id.to_string(),
                transaction.invoice_id.clone(),
                transaction.customer_name.clone(),
                transaction.product_name.clone(),
                format_minor_units(transaction.amount_minor, &transaction.currency),
                transaction.currency.to_ascii_uppercase(),
                status,
                transaction.created_at.to_rfc3339(),
            ])
            .with_context(|| format!("failed to write csv row for {}", transaction.id))?;
    }

    writer.flush().context("failed to flush csv writer")?;
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to finish csv: {}", err.error()))?;

    String::from_utf8(bytes).context("csv output is not utf-8")
}
