use std::sync::Arc;

use camino::{
    domain::{
        entities::{
            orders::OrderEntity,
            transactions::{InsertTransactionEntity, TransactionEntity},
        },
        repositories::{
            customers::CustomerRepository, orders::OrderRepository, products::ProductRepository,
            reconciliation::ReconciliationRepository, transactions::TransactionRepository,
        },
        value_objects::{
            enums::transaction_statuses::TransactionStatus,
            transactions::{InvoiceOutcome, ReconciledOrder},
        },
    },
    payments::{
        stripe_client::{StripeClient, StripeEvent, StripeInvoice},
        webhook_signature::SignatureError,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("no order for subscription {0}")]
    OrderNotFound(String),
    #[error("no transaction for invoice {0}")]
    TransactionNotFound(String),
    #[error("missing related entity: {0}")]
    MissingRelatedEntity(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    /// Every failure answers 400 so Stripe delivers the event again.
    pub fn status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::BAD_REQUEST
    }

    /// Message returned to Stripe; infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            WebhookError::Internal(_) => "webhook processing failed".to_string(),
            other => other.to_string(),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    TransactionRecorded { invoice_id: String, order_id: Uuid },
    AlreadyRecorded { invoice_id: String },
    Reconciled(ReconciledOrder),
    Ignored { event_type: String },
}

pub struct PaymentWebhookUseCase<O, T, C, P, R, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    R: ReconciliationRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    transaction_repo: Arc<T>,
    customer_repo: Arc<C>,
    product_repo: Arc<P>,
    reconciliation_repo: Arc<R>,
    stripe_client: Arc<Stripe>,
}

impl<O, T, C, P, R, Stripe> PaymentWebhookUseCase<O, T, C, P, R, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    R: ReconciliationRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        order_repo: Arc<O>,
        transaction_repo: Arc<T>,
        customer_repo: Arc<C>,
        product_repo: Arc<P>,
        reconciliation_repo: Arc<R>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            order_repo,
            transaction_repo,
            customer_repo,
            product_repo,
            reconciliation_repo,
            stripe_client,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookOutcome> {
        debug!(
            payload_bytes = payload.len(),
            "payment webhooks: stripe webhook payload received"
        );
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                if err.downcast_ref::<SignatureError>().is_some() {
                    warn!(error = %err, "payment webhooks: stripe webhook verification failed");
                    WebhookError::InvalidSignature
                } else {
                    warn!(error = %err, "payment webhooks: signed stripe webhook is not an event");
                    WebhookError::InvalidPayload(err.to_string())
                }
            })?;

        let event_type = event.type_.clone();
        info!(
            event_id = ?event.id,
            event_type = %event_type,
            "payment webhooks: stripe webhook verified"
        );

        match event_type.as_str() {
            "invoice.created" => self.handle_invoice_created(&event).await,
            "invoice.payment_succeeded" => {
                self.handle_invoice_outcome(&event, InvoiceOutcome::Paid)
                    .await
            }
            "invoice.payment_failed" => {
                self.handle_invoice_outcome(&event, InvoiceOutcome::Failed)
                    .await
            }
            _ => {
                debug!(event_type = %event_type, "payment webhooks: unhandled stripe event type");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    /// Records the invoice as an initiated transaction, then asks Stripe to
    /// collect it.
    async fn handle_invoice_created(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let invoice_id = StripeClient::extract_invoice(event)
            .map(|invoice| invoice.id)
            .ok_or_else(|| WebhookError::InvalidPayload("missing invoice id".to_string()))?;

        if self.find_transaction(&invoice_id).await?.is_some() {
            info!(%invoice_id, "payment webhooks: invoice already recorded, skipping");
            return Ok(WebhookOutcome::AlreadyRecorded { invoice_id });
        }

        let invoice = self
            .stripe_client
            .retrieve_invoice(&invoice_id)
            .await
            .map_err(|err| {
                error!(%invoice_id, error = ?err, "payment webhooks: failed to retrieve invoice");
                WebhookError::Internal(err)
            })?;

        let subscription_ref = invoice_subscription(&invoice)?;
        let order = self.find_order(&subscription_ref).await?;

        let customer = self
            .customer_repo
            .find_by_id(order.customer_id)
            .await
            .map_err(|err| {
                error!(order_id = %order.id, db_error = ?err, "payment webhooks: failed to load customer");
                WebhookError::Internal(err)
            })?
            .ok_or_else(|| {
                WebhookError::MissingRelatedEntity(format!("customer {}", order.customer_id))
            })?;

        let product = self
            .product_repo
            .find_by_id(order.product_id)
            .await
            .map_err(|err| {
                error!(order_id = %order.id, db_error = ?err, "payment webhooks: failed to load product");
                WebhookError::Internal(err)
            })?
            .ok_or_else(|| {
                WebhookError::MissingRelatedEntity(format!("product {}", order.product_id))
            })?;

        let currency = invoice
            .currency
            .clone()
            .unwrap_or_else(|| order.currency.clone())
            .to_ascii_lowercase();
        let transaction = InsertTransactionEntity {
            stripe_id: invoice.id.clone(),
            order_id: order.id,
            merchant_id: order.merchant_id,
            customer_id: customer.id,
            customer_name: customer.name,
            product_id: product.id,
            product_name: product.name,
            amount_minor: invoice.amount_due.unwrap_or_default(),
            currency,
            status: TransactionStatus::Initiated.to_string(),
        };

        let inserted = self
            .transaction_repo
            .insert_if_absent(transaction)
            .await
            .map_err(|err| {
                error!(
                    %invoice_id,
                    order_id = %order.id,
                    db_error = ?err,
                    "payment webhooks: failed to insert transaction"
                );
                WebhookError::Internal(err)
            })?;

        if !inserted {
            info!(%invoice_id, "payment webhooks: invoice recorded by a concurrent delivery");
            return Ok(WebhookOutcome::AlreadyRecorded { invoice_id });
        }

        info!(
            %invoice_id,
            order_id = %order.id,
            amount_due = ?invoice.amount_due,
            "payment webhooks: transaction initiated"
        );

        self.collect_invoice(invoice).await;

        Ok(WebhookOutcome::TransactionRecorded {
            invoice_id,
            order_id: order.id,
        })
    }

    /// Finalizes a draft invoice and pays it. Failures are left for Stripe's
    /// own retries; the transaction is already recorded.
    async fn collect_invoice(&self, mut invoice: StripeInvoice) {
        if invoice.is_draft() {
            match self.stripe_client.finalize_invoice(&invoice.id).await {
                Ok(finalized) => invoice = finalized,
                Err(err) => {
                    warn!(
                        invoice_id = %invoice.id,
                        error = ?err,
                        "payment webhooks: failed to finalize invoice"
                    );
                    return;
                }
            }
        }

        if !invoice.is_collectable() {
            debug!(
                invoice_id = %invoice.id,
                status = ?invoice.status,
                "payment webhooks: invoice not collectable"
            );
            return;
        }

        match self.stripe_client.pay_invoice(&invoice.id).await {
            Ok(paid) => info!(
                invoice_id = %paid.id,
                status = ?paid.status,
                "payment webhooks: invoice payment attempted"
            ),
            Err(err) => warn!(
                invoice_id = %invoice.id,
                error = ?err,
                "payment webhooks: failed to pay invoice"
            ),
        }
    }

    async fn handle_invoice_outcome(
        &self,
        event: &StripeEvent,
        outcome: InvoiceOutcome,
    ) -> UseCaseResult<WebhookOutcome> {
        let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone())
            .map_err(|err| WebhookError::InvalidPayload(format!("invoice object: {err}")))?;

        let subscription_ref = invoice_subscription(&invoice)?;
        let order = self.find_order(&subscription_ref).await?;

        let transaction = self
            .find_transaction(&invoice.id)
            .await?
            .ok_or_else(|| WebhookError::TransactionNotFound(invoice.id.clone()))?;

        if transaction.order_id != order.id {
            warn!(
                invoice_id = %invoice.id,
                order_id = %order.id,
                transaction_order_id = %transaction.order_id,
                "payment webhooks: invoice belongs to another order"
            );
            return Err(WebhookError::InvalidPayload(format!(
                "invoice {} does not belong to subscription {}",
                invoice.id, subscription_ref
            )));
        }

        if !outcome.applies_to(transaction.status()) {
            info!(
                invoice_id = %invoice.id,
                order_id = %order.id,
                outcome = ?outcome,
                "payment webhooks: invoice already paid, stale outcome ignored"
            );
            return Ok(WebhookOutcome::AlreadyRecorded {
                invoice_id: invoice.id,
            });
        }

        let reconciled = self
            .reconciliation_repo
            .apply_invoice_outcome(order.id, transaction.id, outcome)
            .await
            .map_err(|err| {
                error!(
                    invoice_id = %invoice.id,
                    order_id = %order.id,
                    outcome = ?outcome,
                    db_error = ?err,
                    "payment webhooks: failed to apply invoice outcome"
                );
                WebhookError::Internal(err)
            })?;

        info!(
            invoice_id = %invoice.id,
            order_id = %reconciled.order_id,
            order_status = %reconciled.status,
            completed_installments = reconciled.completed_installments,
            "payment webhooks: invoice outcome applied"
        );
        Ok(WebhookOutcome::Reconciled(reconciled))
    }

    async fn find_order(&self, subscription_ref: &str) -> UseCaseResult<OrderEntity> {
        self.order_repo
            .find_by_stripe_id(subscription_ref)
            .await
            .map_err(|err| {
                error!(subscription_ref, db_error = ?err, "payment webhooks: failed to load order");
                WebhookError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(subscription_ref, "payment webhooks: no order for subscription");
                WebhookError::OrderNotFound(subscription_ref.to_string())
            })
    }

    async fn find_transaction(
        &self,
        invoice_id: &str,
    ) -> UseCaseResult<Option<TransactionEntity>> {
        self.transaction_repo
            .find_by_stripe_id(invoice_id)
            .await
            .map_err(|err| {
                error!(invoice_id, db_error = ?err, "payment webhooks: failed to load transaction");
                WebhookError::Internal(err)
            })
    }
}

fn invoice_subscription(invoice: &StripeInvoice) -> UseCaseResult<String> {
    invoice
        .subscription_ref()
        .map(str::to_string)
        .ok_or_else(|| {
            WebhookError::InvalidPayload(format!("invoice {} has no subscription", invoice.id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use anyhow::anyhow;
    use camino::domain::{
        entities::{customers::CustomerEntity, products::ProductEntity},
        repositories::{
            customers::MockCustomerRepository, orders::MockOrderRepository,
            products::MockProductRepository, reconciliation::MockReconciliationRepository,
            transactions::MockTransactionRepository,
        },
        value_objects::enums::order_statuses::OrderStatus,
    };
    use chrono::Utc;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Mutex;

    type TestUseCase = PaymentWebhookUseCase<
        MockOrderRepository,
        MockTransactionRepository,
        MockCustomerRepository,
        MockProductRepository,
        MockReconciliationRepository,
        MockStripeGateway,
    >;

    struct Mocks {
        order_repo: MockOrderRepository,
        transaction_repo: MockTransactionRepository,
        customer_repo: MockCustomerRepository,
        product_repo: MockProductRepository,
        reconciliation_repo: MockReconciliationRepository,
        stripe: MockStripeGateway,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                order_repo: MockOrderRepository::new(),
                transaction_repo: MockTransactionRepository::new(),
                customer_repo: MockCustomerRepository::new(),
                product_repo: MockProductRepository::new(),
                reconciliation_repo: MockReconciliationRepository::new(),
                stripe: MockStripeGateway::new(),
            }
        }

        fn into_usecase(self) -> TestUseCase {
            PaymentWebhookUseCase::new(
                Arc::new(self.order_repo),
                Arc::new(self.transaction_repo),
                Arc::new(self.customer_repo),
                Arc::new(self.product_repo),
                Arc::new(self.reconciliation_repo),
                Arc::new(self.stripe),
            )
        }
    }

    fn sample_order() -> OrderEntity {
        let now = Utc::now();
        OrderEntity {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            currency: "usd".to_string(),
            price: "100.00".to_string(),
            quantity: 1,
            installment_options: vec![3],
            period: Some(3),
            interval: Some("month".to_string()),
            stripe_id: Some("sub_1".to_string()),
            status: OrderStatus::Processing.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_transaction(order: &OrderEntity, invoice_id: &str) -> TransactionEntity {
        let now = Utc::now();
        TransactionEntity {
            id: Uuid::new_v4(),
            stripe_id: invoice_id.to_string(),
            order_id: order.id,
            merchant_id: order.merchant_id,
            customer_id: order.customer_id,
            customer_name: "Ada Lovelace".to_string(),
            product_id: order.product_id,
            product_name: "Road bike".to_string(),
            amount_minor: 3333,
            currency: "usd".to_string(),
            status: TransactionStatus::Initiated.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": object },
        }))
        .unwrap()
    }

    fn invoice(status: &str) -> StripeInvoice {
        serde_json::from_value(json!({
            "id": "in_1",
            "status": status,
            "customer": "cus_123",
            "subscription": "sub_1",
            "amount_due": 3333,
            "currency": "usd",
        }))
        .unwrap()
    }

    fn expect_event(
        stripe: &mut MockStripeGateway,
        event_type: &'static str,
        object: serde_json::Value,
    ) {
        stripe
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event(event_type, object.clone())));
    }

    fn expect_order_lookups(mocks: &mut Mocks, order: &OrderEntity) {
        let found = order.clone();
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .withf(|stripe_id| stripe_id == "sub_1")
            .returning(move |_| Ok(Some(found.clone())));

        let customer = CustomerEntity {
            id: order.customer_id,
            merchant_id: order.merchant_id,
            name: "Ada Lovelace".to_string(),
            email: None,
            phone: None,
            stripe_id: Some("cus_123".to_string()),
            created_at: Utc::now(),
        };
        mocks
            .customer_repo
            .expect_find_by_id()
            .with(eq(order.customer_id))
            .returning(move |_| Ok(Some(customer.clone())));

        let product = ProductEntity {
            id: order.product_id,
            merchant_id: order.merchant_id,
            name: "Road bike".to_string(),
            stripe_id: Some("prod_123".to_string()),
            created_at: Utc::now(),
        };
        mocks
            .product_repo
            .expect_find_by_id()
            .with(eq(order.product_id))
            .returning(move |_| Ok(Some(product.clone())));
    }

    #[tokio::test]
    async fn invalid_signature_touches_nothing() {
        let mut mocks = Mocks::new();
        mocks
            .stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(SignatureError::Mismatch.into()));
        mocks.stripe.expect_retrieve_invoice().never();
        mocks.transaction_repo.expect_find_by_stripe_id().never();
        mocks.transaction_repo.expect_insert_if_absent().never();
        mocks.order_repo.expect_find_by_stripe_id().never();
        mocks.reconciliation_repo.expect_apply_invoice_outcome().never();

        let err = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "t=1,v1=00")
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_garbage_is_an_invalid_payload() {
        let mut mocks = Mocks::new();
        mocks
            .stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| {
                let parse_err = serde_json::from_slice::<StripeEvent>(b"not json").unwrap_err();
                Err(parse_err.into())
            });
        mocks.transaction_repo.expect_find_by_stripe_id().never();
        mocks.reconciliation_repo.expect_apply_invoice_outcome().never();

        let err = mocks
            .into_usecase()
            .handle_stripe_webhook(b"not json", "t=1,v1=00")
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invoice_created_twice_records_one_transaction() {
        let order = sample_order();
        let mut mocks = Mocks::new();
        expect_event(&mut mocks.stripe, "invoice.created", json!({ "id": "in_1" }));
        expect_order_lookups(&mut mocks, &order);

        let recorded: Arc<Mutex<Option<TransactionEntity>>> = Arc::new(Mutex::new(None));

        let lookup = Arc::clone(&recorded);
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .withf(|invoice_id| invoice_id == "in_1")
            .times(2)
            .returning(move |_| Ok(lookup.lock().unwrap().clone()));

        let store = Arc::clone(&recorded);
        let stored_order = order.clone();
        mocks
            .transaction_repo
            .expect_insert_if_absent()
            .withf(move |transaction| {
                transaction.stripe_id == "in_1"
                    && transaction.order_id == stored_order.id
                    && transaction.amount_minor == 3333
                    && transaction.customer_name == "Ada Lovelace"
                    && transaction.status == "initiated"
            })
            .times(1)
            .returning(move |_| {
                *store.lock().unwrap() = Some(sample_transaction(&sample_order(), "in_1"));
                Ok(true)
            });

        mocks
            .stripe
            .expect_retrieve_invoice()
            .times(1)
            .returning(|_| Ok(invoice("draft")));
        mocks
            .stripe
            .expect_finalize_invoice()
            .times(1)
            .returning(|_| Ok(invoice("open")));
        mocks
            .stripe
            .expect_pay_invoice()
            .times(1)
            .returning(|_| Ok(invoice("paid")));

        let usecase = mocks.into_usecase();

        let first = usecase.handle_stripe_webhook(b"{}", "sig").await.unwrap();
        assert_eq!(
            first,
            WebhookOutcome::TransactionRecorded {
                invoice_id: "in_1".to_string(),
                order_id: order.id,
            }
        );

        let second = usecase.handle_stripe_webhook(b"{}", "sig").await.unwrap();
        assert_eq!(
            second,
            WebhookOutcome::AlreadyRecorded {
                invoice_id: "in_1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn collection_failure_does_not_fail_the_webhook() {
        let order = sample_order();
        let mut mocks = Mocks::new();
        expect_event(&mut mocks.stripe, "invoice.created", json!({ "id": "in_1" }));
        expect_order_lookups(&mut mocks, &order);

        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(|_| Ok(None));
        mocks
            .transaction_repo
            .expect_insert_if_absent()
            .times(1)
            .returning(|_| Ok(true));
        mocks
            .stripe
            .expect_retrieve_invoice()
            .returning(|_| Ok(invoice("draft")));
        mocks
            .stripe
            .expect_finalize_invoice()
            .times(1)
            .returning(|_| Err(anyhow!("stripe unavailable")));
        mocks.stripe.expect_pay_invoice().never();

        let outcome = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::TransactionRecorded { .. }));
    }

    #[tokio::test]
    async fn invoice_for_unknown_subscription_is_not_recorded() {
        let mut mocks = Mocks::new();
        expect_event(&mut mocks.stripe, "invoice.created", json!({ "id": "in_1" }));
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(|_| Ok(None));
        mocks
            .stripe
            .expect_retrieve_invoice()
            .returning(|_| Ok(invoice("draft")));
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .returning(|_| Ok(None));
        mocks.transaction_repo.expect_insert_if_absent().never();
        mocks.stripe.expect_finalize_invoice().never();
        mocks.stripe.expect_pay_invoice().never();

        let err = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::OrderNotFound(ref reference) if reference == "sub_1"));
    }

    #[tokio::test]
    async fn payment_succeeded_reconciles_order_and_transaction() {
        let order = sample_order();
        let transaction = sample_transaction(&order, "in_1");
        let (order_id, transaction_id) = (order.id, transaction.id);

        let mut mocks = Mocks::new();
        expect_event(
            &mut mocks.stripe,
            "invoice.payment_succeeded",
            json!({ "id": "in_1", "status": "paid", "subscription": "sub_1" }),
        );
        let found = order.clone();
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(found.clone())));
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(transaction.clone())));
        mocks
            .reconciliation_repo
            .expect_apply_invoice_outcome()
            .with(eq(order_id), eq(transaction_id), eq(InvoiceOutcome::Paid))
            .times(1)
            .returning(move |order_id, _, _| {
                Ok(ReconciledOrder {
                    order_id,
                    status: OrderStatus::Active,
                    completed_installments: 1,
                })
            });

        let outcome = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Reconciled(ReconciledOrder {
                order_id,
                status: OrderStatus::Active,
                completed_installments: 1,
            })
        );
    }

    #[tokio::test]
    async fn payment_failed_marks_both_failed() {
        let order = sample_order();
        let transaction = sample_transaction(&order, "in_1");
        let order_id = order.id;

        let mut mocks = Mocks::new();
        expect_event(
            &mut mocks.stripe,
            "invoice.payment_failed",
            json!({
                "id": "in_1",
                "status": "open",
                "parent": { "subscription_details": { "subscription": "sub_1" } },
            }),
        );
        let found = order.clone();
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .withf(|stripe_id| stripe_id == "sub_1")
            .returning(move |_| Ok(Some(found.clone())));
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(transaction.clone())));
        mocks
            .reconciliation_repo
            .expect_apply_invoice_outcome()
            .withf(|_, _, outcome| *outcome == InvoiceOutcome::Failed)
            .times(1)
            .returning(|order_id, _, _| {
                Ok(ReconciledOrder {
                    order_id,
                    status: OrderStatus::Failed,
                    completed_installments: 0,
                })
            });

        let outcome = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap();

        match outcome {
            WebhookOutcome::Reconciled(reconciled) => {
                assert_eq!(reconciled.order_id, order_id);
                assert_eq!(reconciled.status, OrderStatus::Failed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_failure_does_not_undo_a_paid_invoice() {
        let order = sample_order();
        let mut transaction = sample_transaction(&order, "in_1");
        transaction.status = TransactionStatus::Completed.to_string();

        let mut mocks = Mocks::new();
        expect_event(
            &mut mocks.stripe,
            "invoice.payment_failed",
            json!({ "id": "in_1", "status": "open", "subscription": "sub_1" }),
        );
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(order.clone())));
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(transaction.clone())));
        mocks.reconciliation_repo.expect_apply_invoice_outcome().never();

        let outcome = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::AlreadyRecorded {
                invoice_id: "in_1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn payment_for_unrecorded_invoice_is_rejected() {
        let order = sample_order();
        let mut mocks = Mocks::new();
        expect_event(
            &mut mocks.stripe,
            "invoice.payment_succeeded",
            json!({ "id": "in_9", "subscription": "sub_1" }),
        );
        mocks
            .order_repo
            .expect_find_by_stripe_id()
            .returning(move |_| Ok(Some(order.clone())));
        mocks
            .transaction_repo
            .expect_find_by_stripe_id()
            .returning(|_| Ok(None));
        mocks.reconciliation_repo.expect_apply_invoice_outcome().never();

        let err = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::TransactionNotFound(ref id) if id == "in_9"));
    }

    #[tokio::test]
    async fn unknown_events_are_acknowledged() {
        let mut mocks = Mocks::new();
        expect_event(&mut mocks.stripe, "customer.created", json!({ "id": "cus_1" }));
        mocks.order_repo.expect_find_by_stripe_id().never();

        let outcome = mocks
            .into_usecase()
            .handle_stripe_webhook(b"{}", "sig")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "customer.created".to_string()
            }
        );
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = WebhookError::Internal(anyhow!("password authentication failed"));
        assert_eq!(err.public_message(), "webhook processing failed");
        assert_eq!(
            WebhookError::OrderNotFound("sub_1".to_string()).public_message(),
            "no order for subscription sub_1"
        );
    }
}
