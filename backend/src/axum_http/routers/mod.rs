pub mod merchant_transactions;
pub mod orders;
pub mod stripe_webhook;
