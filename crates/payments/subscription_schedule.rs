use serde::Serialize;

use crate::domain::value_objects::{
    enums::interval_units::IntervalUnit,
    installments::{InstallmentError, InstallmentPlan},
    money::to_minor_units,
    orders::BillableOrder,
};

/// Body of `POST /v1/subscription_schedules` for an installment plan.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscriptionScheduleRequest {
    pub customer: String,
    pub default_payment_method: String,
    pub phases: Vec<SchedulePhase>,
    pub start_date: String,
    pub end_behavior: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchedulePhase {
    pub items: Vec<SchedulePhaseItem>,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchedulePhaseItem {
    pub price_data: PriceData,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PriceData {
    pub product: String,
    pub currency: String,
    pub recurring: Recurring,
    /// Minor units, e.g. `"3333"` for 33.33 usd.
    pub unit_amount_decimal: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Recurring {
    pub interval: IntervalUnit,
}

/// Builds a single phase schedule that charges `plan.count` times and then
/// cancels instead of renewing.
pub fn build_subscription_request(
    order: &BillableOrder,
    plan: &InstallmentPlan,
    payment_method_ref: &str,
) -> Result<SubscriptionScheduleRequest, InstallmentError> {
    let payment_method_ref = payment_method_ref.trim();
    if payment_method_ref.is_empty() {
        return Err(InstallmentError::InvalidPlanSelection(
            "a payment method is required".to_string(),
        ));
    }

    let quantity = u32::try_from(order.order.quantity)
        .ok()
        .filter(|quantity| *quantity > 0)
        .ok_or_else(|| {
            InstallmentError::InvalidAmount(format!("quantity {}", order.order.quantity))
        })?;

    let currency = order.order.currency.trim().to_ascii_lowercase();
    let unit_amount = to_minor_units(plan.per_installment_amount, &currency)?;

    Ok(SubscriptionScheduleRequest {
        customer: order.stripe_customer_id.clone(),
        default_payment_method: payment_method_ref.to_string(),
        phases: vec![SchedulePhase {
            items: vec![SchedulePhaseItem {
                price_data: PriceData {
                    product: order.stripe_product_id.clone(),
                    currency,
                    recurring: Recurring {
                        interval: plan.interval,
                    },
                    unit_amount_decimal: unit_amount.to_string(),
                },
                quantity,
            }],
            iterations: plan.count,
        }],
        start_date: "now".to_string(),
        end_behavior: "cancel".to_string(),
    })
}

impl SubscriptionScheduleRequest {
    /// Stripe's form encoding of the request.
    pub fn to_form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("customer".to_string(), self.customer.clone()),
            (
                "default_settings[default_payment_method]".to_string(),
                self.default_payment_method.clone(),
            ),
            ("start_date".to_string(), self.start_date.clone()),
            ("end_behavior".to_string(), self.end_behavior.clone()),
        ];

        for (phase_idx, phase) in self.phases.iter().enumerate() {
            let phase_key = format!("phases[{phase_idx}]");
            params.push((format!("{phase_key}[iterations]"), phase.iterations.to_string()));

            for (item_idx, item) in phase.items.iter().enumerate() {
                let item_key = format!("{phase_key}[items][{item_idx}]");
                let price = &item.price_data;
                params.extend([
                    (
                        format!("{item_key}[price_data][product]"),
                        price.product.clone(),
                    ),
                    (
                        format!("{item_key}[price_data][currency]"),
                        price.currency.clone(),
                    ),
                    (
                        format!("{item_key}[price_data][recurring][interval]"),
                        price.recurring.interval.to_string(),
                    ),
                    (
                        format!("{item_key}[price_data][unit_amount_decimal]"),
                        price.unit_amount_decimal.clone(),
                    ),
                    (format!("{item_key}[quantity]"), item.quantity.to_string()),
                ]);
            }
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::orders::OrderEntity,
        value_objects::installments::{PlanIntervals, select_plan},
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn billable(currency: &str, price: &str, quantity: i32) -> BillableOrder {
        let now = Utc::now();
        BillableOrder {
            order: OrderEntity {
                id: Uuid::new_v4(),
                merchant_id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                currency: currency.to_string(),
                price: price.to_string(),
                quantity,
                installment_options: vec![3, 6, 12],
                period: None,
                interval: None,
                stripe_id: None,
                status: "pending".to_string(),
                created_at: now,
                updated_at: now,
            },
            stripe_customer_id: "cus_123".to_string(),
            stripe_product_id: "prod_123".to_string(),
        }
    }

    fn plan_for(order: &BillableOrder, count: u32) -> InstallmentPlan {
        select_plan(
            Decimal::from_str(&order.order.price).unwrap(),
            &order.order.allowed_counts(),
            count,
            &PlanIntervals::default(),
        )
        .unwrap()
    }

    #[test]
    fn builds_single_phase_schedule_that_cancels_at_the_end() {
        let order = billable("USD", "100.00", 2);
        let plan = plan_for(&order, 3);

        let request = build_subscription_request(&order, &plan, "pm_card_visa").unwrap();

        assert_eq!(request.customer, "cus_123");
        assert_eq!(request.default_payment_method, "pm_card_visa");
        assert_eq!(request.start_date, "now");
        assert_eq!(request.end_behavior, "cancel");
        assert_eq!(request.phases.len(), 1);

        let phase = &request.phases[0];
        assert_eq!(phase.iterations, 3);
        assert_eq!(phase.items.len(), 1);
        assert_eq!(phase.items[0].quantity, 2);
        assert_eq!(phase.items[0].price_data.product, "prod_123");
        assert_eq!(phase.items[0].price_data.currency, "usd");
        assert_eq!(phase.items[0].price_data.recurring.interval, IntervalUnit::Month);
        assert_eq!(phase.items[0].price_data.unit_amount_decimal, "3333");
    }

    #[test]
    fn zero_decimal_currency_is_not_scaled() {
        let order = billable("jpy", "30000", 1);
        let plan = plan_for(&order, 3);

        let request = build_subscription_request(&order, &plan, "pm_1").unwrap();
        assert_eq!(request.phases[0].items[0].price_data.unit_amount_decimal, "10000");
    }

    #[test]
    fn rejects_missing_payment_method_and_bad_quantity() {
        let order = billable("usd", "100.00", 1);
        let plan = plan_for(&order, 3);
        assert!(matches!(
            build_subscription_request(&order, &plan, "  "),
            Err(InstallmentError::InvalidPlanSelection(_))
        ));

        let order = billable("usd", "100.00", 0);
        assert!(matches!(
            build_subscription_request(&order, &plan, "pm_1"),
            Err(InstallmentError::InvalidAmount(_))
        ));
    }

    #[test]
    fn form_params_use_stripe_bracket_notation() {
        let order = billable("usd", "100.00", 1);
        let plan = plan_for(&order, 6);
        let params = build_subscription_request(&order, &plan, "pm_1")
            .unwrap()
            .to_form_params();

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("customer"), Some("cus_123"));
        assert_eq!(get("default_settings[default_payment_method]"), Some("pm_1"));
        assert_eq!(get("end_behavior"), Some("cancel"));
        assert_eq!(get("phases[0][iterations]"), Some("6"));
        assert_eq!(
            get("phases[0][items][0][price_data][recurring][interval]"),
            Some("month")
        );
        assert_eq!(
            get("phases[0][items][0][price_data][unit_amount_decimal]"),
            Some("1667")
        );
        assert_eq!(get("phases[0][items][0][quantity]"), Some("1"));
    }
}
