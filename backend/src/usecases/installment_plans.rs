use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use camino::{
    domain::{
        entities::orders::{AttachInstallmentPlanEntity, OrderEntity},
        repositories::{
            customers::CustomerRepository, orders::OrderRepository, products::ProductRepository,
        },
        value_objects::{
            enums::order_statuses::OrderStatus,
            installments::{InstallmentError, InstallmentPreview, PlanIntervals, select_plan},
            orders::{BillableOrder, ChooseInstallmentPlanModel, InstallmentOptionsDto, OrderDto},
        },
    },
    payments::{stripe_client::StripeApiError, subscription_schedule::build_subscription_request},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum InstallmentPlanError {
    #[error("order not found")]
    OrderNotFound,
    #[error("order cannot take an installment plan: {0}")]
    InvalidOrderState(String),
    #[error(transparent)]
    InvalidPlan(#[from] InstallmentError),
    #[error("{0}")]
    ProviderRejected(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl InstallmentPlanError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            InstallmentPlanError::OrderNotFound => StatusCode::NOT_FOUND,
            InstallmentPlanError::InvalidOrderState(_) => StatusCode::CONFLICT,
            InstallmentPlanError::InvalidPlan(InstallmentError::MissingRelatedEntity(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            InstallmentPlanError::InvalidPlan(_) => StatusCode::BAD_REQUEST,
            InstallmentPlanError::ProviderRejected(_) => StatusCode::PAYMENT_REQUIRED,
            InstallmentPlanError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, InstallmentPlanError>;

pub struct InstallmentPlanUseCase<O, C, P, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    customer_repo: Arc<C>,
    product_repo: Arc<P>,
    stripe_client: Arc<Stripe>,
    plan_intervals: PlanIntervals,
}

impl<O, C, P, Stripe> InstallmentPlanUseCase<O, C, P, Stripe>
where
    O: OrderRepository + Send + Sync + 'static,
    C: CustomerRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        order_repo: Arc<O>,
        customer_repo: Arc<C>,
        product_repo: Arc<P>,
        stripe_client: Arc<Stripe>,
        plan_intervals: PlanIntervals,
    ) -> Self {
        Self {
            order_repo,
            customer_repo,
            product_repo,
            stripe_client,
            plan_intervals,
        }
    }

    /// Every plan the order offers, with due dates starting on `start`.
    pub async fn preview_plans(
        &self,
        order_id: Uuid,
        start: NaiveDate,
    ) -> UseCaseResult<InstallmentOptionsDto> {
        info!(%order_id, %start, "installment plans: building preview");
        let order = self.load_order(order_id).await?;
        let price = order.price_amount()?;
        let allowed = order.allowed_counts();

        let mut plans = Vec::with_capacity(allowed.len());
        for count in allowed.iter().copied() {
            if self.plan_intervals.interval_for(count).is_none() {
                debug!(%order_id, count, "installment plans: no interval configured, skipping");
                continue;
            }

            let plan = select_plan(price, &allowed, count, &self.plan_intervals)?;
            plans.push(InstallmentPreview::build(&plan, start)?);
        }

        info!(%order_id, plan_count = plans.len(), "installment plans: preview ready");
        Ok(InstallmentOptionsDto {
            order_id: order.id,
            currency: order.currency,
            price: order.price,
            quantity: order.quantity,
            plans,
        })
    }

    /// Creates the Stripe subscription schedule for the chosen plan and records
    /// it on the order. When the order cannot be updated the schedule is
    /// cancelled again so nothing is billed for an order we don't track.
    pub async fn choose_plan(
        &self,
        order_id: Uuid,
        model: ChooseInstallmentPlanModel,
    ) -> UseCaseResult<OrderDto> {
        info!(
            %order_id,
            installments = model.installments,
            "installment plans: plan selection received"
        );
        let order = self.load_order(order_id).await?;

        let status = order.status().ok_or_else(|| {
            InstallmentPlanError::InvalidOrderState(format!("unknown status {}", order.status))
        })?;
        if !status.accepts_plan_selection() || order.stripe_id.is_some() {
            warn!(
                %order_id,
                status = %status,
                stripe_id = ?order.stripe_id,
                "installment plans: order does not accept a plan"
            );
            return Err(InstallmentPlanError::InvalidOrderState(format!(
                "order is {status}"
            )));
        }

        let customer = self
            .customer_repo
            .find_by_id(order.customer_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "installment plans: failed to load customer");
                InstallmentPlanError::Internal(err)
            })?
            .ok_or_else(|| {
                InstallmentError::MissingRelatedEntity(format!("customer {}", order.customer_id))
            })?;

        let product = self
            .product_repo
            .find_by_id(order.product_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "installment plans: failed to load product");
                InstallmentPlanError::Internal(err)
            })?
            .ok_or_else(|| {
                InstallmentError::MissingRelatedEntity(format!("product {}", order.product_id))
            })?;

        let plan = select_plan(
            order.price_amount()?,
            &order.allowed_counts(),
            model.installments,
            &self.plan_intervals,
        )?;
        let period =
            i32::try_from(plan.count).map_err(|_| InstallmentError::InvalidInstallmentCount)?;

        let billable = BillableOrder::new(order, &customer, &product)?;
        let request = build_subscription_request(&billable, &plan, &model.payment_method)?;
        let idempotency_key = format!(
            "installment-plan:{}:{}:{}",
            order_id, plan.count, request.default_payment_method
        );

        let schedule = self
            .stripe_client
            .create_subscription_schedule(&request, &idempotency_key)
            .await
            .map_err(|err| {
                error!(
                    %order_id,
                    installments = plan.count,
                    error = ?err,
                    "installment plans: stripe refused the subscription schedule"
                );
                provider_error(err)
            })?;
        info!(
            %order_id,
            schedule_id = %schedule.id,
            subscription_id = ?schedule.subscription,
            "installment plans: subscription schedule created"
        );

        let attach = AttachInstallmentPlanEntity {
            period,
            interval: plan.interval.as_str().to_string(),
            stripe_id: schedule.order_reference().to_string(),
            status: OrderStatus::Processing.to_string(),
            updated_at: Utc::now(),
        };

        match self.order_repo.attach_installment_plan(order_id, attach).await {
            Ok(Some(updated)) => {
                info!(
                    %order_id,
                    period,
                    interval = %plan.interval,
                    "installment plans: order moved to processing"
                );
                Ok(OrderDto::from(updated))
            }
            Ok(None) => {
                warn!(
                    %order_id,
                    schedule_id = %schedule.id,
                    "installment plans: order took another plan meanwhile, cancelling schedule"
                );
                self.cancel_orphaned_schedule(order_id, &schedule.id).await;
                Err(InstallmentPlanError::InvalidOrderState(
                    "order already has an installment plan".to_string(),
                ))
            }
            Err(err) => {
                error!(
                    %order_id,
                    schedule_id = %schedule.id,
                    db_error = ?err,
                    "installment plans: failed to record schedule on order, cancelling it"
                );
                self.cancel_orphaned_schedule(order_id, &schedule.id).await;
                Err(InstallmentPlanError::Internal(err))
            }
        }
    }

    async fn load_order(&self, order_id: Uuid) -> UseCaseResult<OrderEntity> {
        self.order_repo
            .find_by_id(order_id)
            .await
            .map_err(|err| {
                error!(%order_id, db_error = ?err, "installment plans: failed to load order");
                InstallmentPlanError::Internal(err)
            })?
            .ok_or(InstallmentPlanError::OrderNotFound)
    }

    async fn cancel_orphaned_schedule(&self, order_id: Uuid, schedule_id: &str) {
        match self
            .stripe_client
            .cancel_subscription_schedule(schedule_id)
            .await
        {
            Ok(()) => info!(%order_id, schedule_id, "installment plans: schedule cancelled"),
            Err(err) => error!(
                %order_id,
                orphaned_schedule_id = schedule_id,
                error = ?err,
                "installment plans: failed to cancel schedule, manual cleanup required"
            ),
        }
    }
}

fn provider_error(err: anyhow::Error) -> InstallmentPlanError {
    match err.downcast_ref::<StripeApiError>() {
        Some(api_error) if api_error.is_rejection() => InstallmentPlanError::ProviderRejected(
            api_error
                .message
                .clone()
                .unwrap_or_else(|| "the payment provider rejected the request".to_string()),
        ),
        _ => InstallmentPlanError::Internal(err),
    }
}
