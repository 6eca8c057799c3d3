use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use super::{subscription_schedule::SubscriptionScheduleRequest, webhook_signature};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The `data.object` of an `invoice.*` event, only the fields we route on.
#[derive(Debug, Deserialize)]
pub struct StripeEventInvoice {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub status: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub amount_due: Option<i64>,
    pub currency: Option<String>,
    pub parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<String>,
}

impl StripeInvoice {
    /// Subscription the invoice bills for. Newer API versions moved the field
    /// under `parent.subscription_details`.
    pub fn subscription_ref(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.subscription_details.as_ref())
                .and_then(|details| details.subscription.as_deref())
        })
    }

    pub fn is_draft(&self) -> bool {
        self.status.as_deref() == Some("draft")
    }

    pub fn is_collectable(&self) -> bool {
        matches!(self.status.as_deref(), Some("draft") | Some("open"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionSchedule {
    pub id: String,
    pub status: Option<String>,
    pub subscription: Option<String>,
}

impl StripeSubscriptionSchedule {
    /// Reference stored on the order: the subscription invoices point at, or the
    /// schedule itself while Stripe has not started it.
    pub fn order_reference(&self) -> &str {
        self.subscription.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

/// Non-2xx answer from Stripe. Travels inside `anyhow::Error` so callers can
/// downcast it and show Stripe's message to the customer.
#[derive(Debug, Error)]
#[error("Stripe API request failed: {context} (status {status}, request_id={request_id:?})")]
pub struct StripeApiError {
    pub context: &'static str,
    pub status: u16,
    pub request_id: Option<String>,
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub message: Option<String>,
}

impl StripeApiError {
    /// Client side rejections (card declined, invalid payment method, ...).
    pub fn is_rejection(&self) -> bool {
        (400..500).contains(&self.status) && self.status != 401 && self.status != 429
    }
}

impl StripeClient {
    pub fn new(
        api_base: String,
        secret_key: String,
        webhook_secret: String,
        webhook_tolerance_secs: i64,
        http_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
            webhook_tolerance_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &'static str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        let details = details.unwrap_or(StripeErrorDetails {
            type_: None,
            code: None,
            message: None,
            param: None,
            decline_code: None,
        });

        Err(StripeApiError {
            context,
            status: status.as_u16(),
            request_id,
            error_type: details.type_,
            code: details.code,
            decline_code: details.decline_code,
            message: details.message,
        }
        .into())
    }

    /// Creates a subscription schedule that bills the installments.
    /// https://stripe.com/docs/api/subscription_schedules/create
    pub async fn create_subscription_schedule(
        &self,
        request: &SubscriptionScheduleRequest,
        idempotency_key: &str,
    ) -> Result<StripeSubscriptionSchedule> {
        let resp = self
            .http
            .post(self.url("/v1/subscription_schedules"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", idempotency_key)
            .form(&request.to_form_params())
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create subscription schedule").await?;

        let schedule: StripeSubscriptionSchedule = resp.json().await?;
        Ok(schedule)
    }

    /// https://stripe.com/docs/api/subscription_schedules/cancel
    pub async fn cancel_subscription_schedule(&self, schedule_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/v1/subscription_schedules/{schedule_id}/cancel")))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        Self::ensure_success(resp, "cancel subscription schedule").await?;

        Ok(())
    }

    /// https://stripe.com/docs/api/invoices/retrieve
    pub async fn retrieve_invoice(&self, invoice_id: &str) -> Result<StripeInvoice> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/invoices/{invoice_id}")))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve invoice").await?;

        let invoice: StripeInvoice = resp.json().await?;
        Ok(invoice)
    }

    /// https://stripe.com/docs/api/invoices/finalize
    pub async fn finalize_invoice(&self, invoice_id: &str) -> Result<StripeInvoice> {
        let resp = self
            .http
            .post(self.url(&format!("/v1/invoices/{invoice_id}/finalize")))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "finalize invoice").await?;

        let invoice: StripeInvoice = resp.json().await?;
        Ok(invoice)
    }

    /// https://stripe.com/docs/api/invoices/pay
    pub async fn pay_invoice(&self, invoice_id: &str) -> Result<StripeInvoice> {
        let resp = self
            .http
            .post(self.url(&format!("/v1/invoices/{invoice_id}/pay")))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "pay invoice").await?;

        let invoice: StripeInvoice = resp.json().await?;
        Ok(invoice)
    }

    /// Verifies the webhook signature and parses the event.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        webhook_signature::verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
            self.webhook_tolerance_secs,
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_invoice(event: &StripeEvent) -> Option<StripeEventInvoice> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}
