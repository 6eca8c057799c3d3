use anyhow::Result as AnyResult;
use async_trait::async_trait;
use camino::payments::{
    stripe_client::{StripeClient, StripeEvent, StripeInvoice, StripeSubscriptionSchedule},
    subscription_schedule::SubscriptionScheduleRequest,
};

/// The Stripe calls the use cases depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_subscription_schedule(
        &self,
        request: &SubscriptionScheduleRequest,
        idempotency_key: &str,
    ) -> AnyResult<StripeSubscriptionSchedule>;

    async fn cancel_subscription_schedule(&self, schedule_id: &str) -> AnyResult<()>;

    async fn retrieve_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice>;

    async fn finalize_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice>;

    async fn pay_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_subscription_schedule(
        &self,
        request: &SubscriptionScheduleRequest,
        idempotency_key: &str,
    ) -> AnyResult<StripeSubscriptionSchedule> {
        self.create_subscription_schedule(request, idempotency_key)
            .await
    }

    async fn cancel_subscription_schedule(&self, schedule_id: &str) -> AnyResult<()> {
        self.cancel_subscription_schedule(schedule_id).await
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice> {
        self.retrieve_invoice(invoice_id).await
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice> {
        self.finalize_invoice(invoice_id).await
    }

    async fn pay_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice> {
        self.pay_invoice(invoice_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
