use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{interval_units::IntervalUnit, order_statuses::OrderStatus},
        installments::InstallmentError,
    },
    infra::db::postgres::schema::orders,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = orders)]
pub struct OrderEntity {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub currency: String,
    /// Unit price as a decimal string, e.g. `"100.00"`.
    pub price: String,
    pub quantity: i32,
    pub installment_options: Vec<i32>,
    pub period: Option<i32>,
    pub interval: Option<String>,
    /// Stripe subscription invoices point at, or the schedule id until Stripe starts it.
    pub stripe_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEntity {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::from_str(&self.status)
    }

    pub fn price_amount(&self) -> Result<Decimal, InstallmentError> {
        Decimal::from_str(self.price.trim())
            .map_err(|_| InstallmentError::InvalidAmount(self.price.clone()))
    }

    pub fn allowed_counts(&self) -> Vec<u32> {
        self.installment_options
            .iter()
            .filter_map(|count| u32::try_from(*count).ok())
            .filter(|count| *count > 0)
            .collect()
    }

    pub fn interval_unit(&self) -> Result<Option<IntervalUnit>, InstallmentError> {
        self.interval.as_deref().map(IntervalUnit::from_str).transpose()
    }
}

/// Columns written once the customer picked a plan and Stripe created the schedule.
#[derive(Debug, Clone, AsChangeset, PartialEq, Eq)]
#[diesel(table_name = orders)]
pub struct AttachInstallmentPlanEntity {
    pub period: i32,
    pub interval: String,
    pub stripe_id: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}
