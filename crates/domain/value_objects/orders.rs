use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{customers::CustomerEntity, orders::OrderEntity, products::ProductEntity},
    value_objects::{
        enums::{interval_units::IntervalUnit, order_statuses::OrderStatus},
        installments::{InstallmentError, InstallmentPreview},
    },
};

/// An order together with the Stripe references needed to bill it.
#[derive(Debug, Clone)]
pub struct BillableOrder {
    pub order: OrderEntity,
    pub stripe_customer_id: String,
    pub stripe_product_id: String,
}

impl BillableOrder {
    pub fn new(
        order: OrderEntity,
        customer: &CustomerEntity,
        product: &ProductEntity,
    ) -> Result<Self, InstallmentError> {
        let stripe_customer_id = customer.stripe_id.clone().ok_or_else(|| {
            InstallmentError::MissingRelatedEntity(format!(
                "customer {} has no stripe reference",
                customer.id
            ))
        })?;
        let stripe_product_id = product.stripe_id.clone().ok_or_else(|| {
            InstallmentError::MissingRelatedEntity(format!(
                "product {} has no stripe reference",
                product.id
            ))
        })?;

        Ok(Self {
            order,
            stripe_customer_id,
            stripe_product_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChooseInstallmentPlanModel {
    pub installments: u32,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderDto {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub currency: String,
    pub price: String,
    pub quantity: i32,
    pub installment_options: Vec<i32>,
    pub period: Option<i32>,
    pub interval: Option<IntervalUnit>,
    pub stripe_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderEntity> for OrderDto {
    fn from(order: OrderEntity) -> Self {
        let interval = order.interval_unit().ok().flatten();
        let status = order.status();

        Self {
            id: order.id,
            merchant_id: order.merchant_id,
            customer_id: order.customer_id,
            product_id: order.product_id,
            currency: order.currency,
            price: order.price,
            quantity: order.quantity,
            installment_options: order.installment_options,
            period: order.period,
            interval,
            stripe_id: order.stripe_id,
            status,
            updated_at: order.updated_at,
        }
    }
}

/// Installment plans an order can be paid with, as shown on the payment link.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstallmentOptionsDto {
    pub order_id: Uuid,
    pub currency: String,
    pub price: String,
    pub quantity: i32,
    pub plans: Vec<InstallmentPreview>,
}
