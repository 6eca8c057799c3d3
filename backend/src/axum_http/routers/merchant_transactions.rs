use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use camino::{
    domain::{
        repositories::transactions::TransactionRepository,
        value_objects::transactions::TransactionFilter,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::transactions::TransactionPostgres,
    },
};
use tracing::{error, info};

use crate::{
    auth::{AuthMerchant, JwtSecret},
    axum_http::error_responses::AppError,
    usecases::transaction_reports::TransactionReportUseCase,
};

pub struct MerchantTransactionsState<T>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    pub usecase: Arc<TransactionReportUseCase<T>>,
    pub jwt_secret: JwtSecret,
}

impl<T> Clone for MerchantTransactionsState<T>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}

impl<T> FromRef<MerchantTransactionsState<T>> for JwtSecret
where
    T: TransactionRepository + Send + Sync + 'static,
{
    fn from_ref(state: &MerchantTransactionsState<T>) -> Self {
        state.jwt_secret.clone()
    }
}

pub fn routes(db_pool: Arc<PgPoolSquad>, jwt_secret: JwtSecret) -> Router {
    let transaction_repository = TransactionPostgres::new(Arc::clone(&db_pool));
    let usecase = TransactionReportUseCase::new(Arc::new(transaction_repository));

    Router::new()
        .route("/", get(list_transactions::<TransactionPostgres>))
        .route("/export", get(export_transactions::<TransactionPostgres>))
        .with_state(MerchantTransactionsState {
            usecase: Arc::new(usecase),
            jwt_secret,
        })
}

pub async fn list_transactions<T>(
    State(state): State<MerchantTransactionsState<T>>,
    AuthMerchant { merchant_id, .. }: AuthMerchant,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%merchant_id, "merchant transactions: list request received");

    let transactions = state
        .usecase
        .list(merchant_id, filter)
        .await
        .map_err(|err| {
            error!(%merchant_id, error = ?err, "merchant transactions: failed to list");
            AppError::Internal(err)
        })?;

    Ok(Json(transactions))
}

pub async fn export_transactions<T>(
    State(state): State<MerchantTransactionsState<T>>,
    AuthMerchant { merchant_id, .. }: AuthMerchant,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%merchant_id, "merchant transactions: export request received");

    let csv = state
        .usecase
        .export_csv(merchant_id, filter)
        .await
        .map_err(|err| {
            error!(%merchant_id, error = ?err, "merchant transactions: failed to export");
            AppError::Internal(err)
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        csv,
    ))
}
