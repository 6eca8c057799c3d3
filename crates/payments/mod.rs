pub mod stripe_client;
pub mod subscription_schedule;
pub mod webhook_signature;
