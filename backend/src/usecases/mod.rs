pub mod installment_plans;
pub mod payment_webhooks;
pub mod stripe_gateway;
pub mod transaction_reports;
