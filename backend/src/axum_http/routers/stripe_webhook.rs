use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use camino::{
    domain::repositories::{
        customers::CustomerRepository, orders::OrderRepository, products::ProductRepository,
        reconciliation::ReconciliationRepository, transactions::TransactionRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            customers::CustomerPostgres, orders::OrderPostgres, products::ProductPostgres,
            reconciliation::ReconciliationPostgres, transactions::TransactionPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::{info, warn};

use crate::usecases::{
    payment_webhooks::{PaymentWebhookUseCase, WebhookError},
    stripe_gateway::StripeGateway,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let usecase = PaymentWebhookUseCase::new(
        Arc::new(OrderPostgres::new(Arc::clone(&db_pool))),
        Arc::new(TransactionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(CustomerPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ProductPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ReconciliationPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
    );

    router(Arc::new(usecase))
}

pub fn router<O, T, C, P, R, S>(usecase: Arc<PaymentWebhookUseCase<O, T, C, P, R, S>>) -> Router
where
    O: OrderRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    R: ReconciliationRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/stripe", post(stripe_webhook::<O, T, C, P, R, S>))
        .with_state(usecase)
}

pub async fn stripe_webhook<O, T, C, P, R, S>(
    State(usecase): State<Arc<PaymentWebhookUseCase<O, T, C, P, R, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    R: ReconciliationRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("stripe webhook: missing Stripe-Signature header");
        return WebhookError::InvalidSignature.into_response();
    };

    match usecase.handle_stripe_webhook(&body, signature).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "stripe webhook: handled");
            (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
        }
        Err(err) => {
            warn!(error = ?err, "stripe webhook: handling failed");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use axum::{body::Body, http::Request};
    use camino::domain::repositories::{
        customers::MockCustomerRepository, orders::MockOrderRepository,
        products::MockProductRepository, reconciliation::MockReconciliationRepository,
        transactions::MockTransactionRepository,
    };
    use camino::payments::webhook_signature::SignatureError;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(stripe: MockStripeGateway, transaction_repo: MockTransactionRepository) -> Router {
        router(Arc::new(PaymentWebhookUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(transaction_repo),
            Arc::new(MockCustomerRepository::new()),
            Arc::new(MockProductRepository::new()),
            Arc::new(MockReconciliationRepository::new()),
            Arc::new(stripe),
        )))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_signature_answers_400_without_side_effects() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(|_, signature| signature == "t=1,v1=00")
            .returning(|_, _| Err(SignatureError::Mismatch.into()));
        let mut transaction_repo = MockTransactionRepository::new();
        transaction_repo.expect_find_by_stripe_id().never();
        transaction_repo.expect_insert_if_absent().never();

        let response = app(stripe, transaction_repo)
            .oneshot(
                Request::post("/stripe")
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=00")
                    .body(Body::from(r#"{"type":"invoice.created"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "code": 400, "message": "invalid webhook signature" })
        );
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let response = app(stripe, MockTransactionRepository::new())
            .oneshot(Request::post("/stripe").body(Body::from("{}")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handled_event_answers_ok() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|payload, _| Ok(serde_json::from_slice(payload).unwrap()));

        let response = app(stripe, MockTransactionRepository::new())
            .oneshot(
                Request::post("/stripe")
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=00")
                    .body(Body::from(
                        r#"{"id":"evt_1","type":"charge.refunded","data":{"object":{}}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }
}
