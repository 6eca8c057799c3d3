use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use camino::{
    domain::{
        repositories::{
            customers::CustomerRepository, orders::OrderRepository, products::ProductRepository,
        },
        value_objects::orders::ChooseInstallmentPlanModel,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{customers::CustomerPostgres, orders::OrderPostgres, products::ProductPostgres},
    },
    payments::stripe_client::StripeClient,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        installment_plans::{InstallmentPlanError, InstallmentPlanUseCase},
        stripe_gateway::StripeGateway,
    },
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
) -> Router {
    let order_repository = OrderPostgres::new(Arc::clone(&db_pool));
    let customer_repository = CustomerPostgres::new(Arc::clone(&db_pool));
    let product_repository = ProductPostgres::new(Arc::clone(&db_pool));

    let usecase = InstallmentPlanUseCase::new(
        Arc::new(order_repository),
        Arc::new(customer_repository),
        Arc::new(product_repository),
        stripe_client,
        config.installments.plan_intervals.clone(),
    );

    Router::new()
        .route(
            "/:order_id/installments",
            get(preview_installments::<OrderPostgres, CustomerPostgres, ProductPostgres, StripeClient>),
        )
        .route(
            "/:order_id/installment-plan",
            post(
                choose_installment_plan::<
                    OrderPostgres,
                    CustomerPostgres,
                    ProductPostgres,
                    StripeClient,
                >,
            ),
        )
        .with_state(Arc::new(usecase))
}

pub async fn preview_installments<O, C, P, S>(
    State(usecase): State<Arc<InstallmentPlanUseCase<O, C, P, S>>>,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!(%order_id, "orders: installment preview request received");

    match usecase
        .preview_plans(order_id, Utc::now().date_naive())
        .await
    {
        Ok(options) => Json(options).into_response(),
        Err(err) => {
            log_failure(order_id, &err, "orders: failed to preview installments");
            err.into_response()
        }
    }
}

pub async fn choose_installment_plan<O, C, P, S>(
    State(usecase): State<Arc<InstallmentPlanUseCase<O, C, P, S>>>,
    Path(order_id): Path<Uuid>,
    Json(model): Json<ChooseInstallmentPlanModel>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!(
        %order_id,
        installments = model.installments,
        "orders: installment plan request received"
    );

    match usecase.choose_plan(order_id, model).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(err) => {
            log_failure(order_id, &err, "orders: failed to choose installment plan");
            err.into_response()
        }
    }
}

fn log_failure(order_id: Uuid, err: &InstallmentPlanError, message: &'static str) {
    let status = err.status_code();
    if status.is_server_error() {
        error!(%order_id, status = status.as_u16(), error = ?err, "{}", message);
    } else {
        warn!(%order_id, status = status.as_u16(), error = %err, "{}", message);
    }
}
