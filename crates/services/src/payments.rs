//! # Payment service
//!
//! Thin policy layer over the [`PaymentGateway`] port: amount conversion,
//! reference generation, status reporting and webhook authentication.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    is_mock_reference, DomainError, GatewayInit, InitializeRequest, PaymentGateway, Result,
    MOCK_REFERENCE_PREFIX,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha512;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

pub const LIVE_REFERENCE_PREFIX: &str = "CM-";
pub const FREE_REFERENCE_PREFIX: &str = "FREE-";

pub struct PaymentSettings {
    /// Absolute URL the gateway sends the browser back to.
    pub callback_url: String,
    pub mock_mode: bool,
    pub webhook_secret: Option<SecretString>,
}

/// Converts a major-unit amount to the gateway's minor units (x100, rounded).
pub fn to_minor_units(amount: f64) -> Result<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DomainError::Validation(format!("invalid amount {amount}")));
    }
    Ok((amount * 100.0).round() as u64)
}

/// `<prefix><unix millis>-<8 hex chars>`.
pub fn generate_reference(prefix: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}-{}", Utc::now().timestamp_millis(), &nonce[..8])
}

/// Body of the raw initialize endpoint. Every field is optional on the wire
/// so missing ones surface as a 400 naming them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializePayment {
    pub email: Option<String>,
    pub amount: Option<f64>,
    pub course_id: Option<String>,
    pub course_title: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

impl InitializePayment {
    fn missing_fields(&self) -> Vec<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let mut missing = Vec::new();
        if !present(&self.email) {
            missing.push("email");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if !present(&self.course_id) {
            missing.push("courseId");
        }
        if !present(&self.user_id) {
            missing.push("userId");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// Result of a verification as reported to the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub status: PaymentStatus,
    /// Amount confirmed by the gateway, minor units.
    #[serde(skip)]
    pub amount_minor: Option<u64>,
    pub data: Value,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

/// Webhook events this service distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    ChargeSuccess { reference: Option<String>, data: Value },
    ChargeFailed { reference: Option<String>, data: Value },
    Other { event: String },
}

impl WebhookEvent {
    fn from_payload(payload: Value) -> Self {
        let event = payload["event"].as_str().unwrap_or_default().to_string();
        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        let reference = data["reference"].as_str().map(str::to_string);
        match event.as_str() {
            "charge.success" => WebhookEvent::ChargeSuccess { reference, data },
            "charge.failed" => WebhookEvent::ChargeFailed { reference, data },
            _ => WebhookEvent::Other { event },
        }
    }
}

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, settings: PaymentSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn mock_mode(&self) -> bool {
        self.settings.mock_mode
    }

    pub fn callback_url(&self) -> &str {
        &self.settings.callback_url
    }

    /// A fresh reference for a paid checkout.
    pub fn new_reference(&self) -> String {
        if self.settings.mock_mode {
            generate_reference(MOCK_REFERENCE_PREFIX)
        } else {
            generate_reference(LIVE_REFERENCE_PREFIX)
        }
    }

    /// Creates a gateway transaction for `amount` major units.
    pub async fn start_transaction(
        &self,
        email: &str,
        amount: f64,
        reference: &str,
        metadata: Value,
    ) -> Result<GatewayInit> {
        let request = InitializeRequest {
            email: email.to_string(),
            amount_minor: to_minor_units(amount)?,
            reference: reference.to_string(),
            callback_url: self.settings.callback_url.clone(),
            metadata,
        };
        let init = self.gateway.initialize(&request).await?;
        tracing::info!(
            reference = %init.reference,
            amount_minor = request.amount_minor,
            "payment initialized"
        );
        Ok(init)
    }

    /// The raw initialize endpoint: validates the body and forwards it.
    pub async fn initialize(&self, body: InitializePayment) -> Result<GatewayInit> {
        let missing = body.missing_fields();
        if !missing.is_empty() {
            return Err(DomainError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        let email = body.email.unwrap_or_default();
        let amount = body.amount.unwrap_or_default();
        let metadata = json!({
            "courseId": body.course_id,
            "courseTitle": body.course_title,
            "userId": body.user_id,
            "userEmail": body.user_email.unwrap_or_else(|| email.clone()),
        });
        self.start_transaction(email.trim(), amount, &self.new_reference(), metadata)
            .await
    }

    /// Simulated references are taken at face value while mock mode is on.
    pub fn skips_verification(&self, reference: &str) -> bool {
        self.settings.mock_mode && is_mock_reference(reference.trim())
    }

    /// Asks the gateway whether `reference` was paid. Simulated references
    /// only pass while mock mode is on.
    pub async fn verify(&self, reference: &str) -> Result<VerificationReport> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DomainError::Validation("reference is required".into()));
        }
        if is_mock_reference(reference) && !self.settings.mock_mode {
            tracing::warn!(%reference, "simulated reference rejected outside mock mode");
            return Ok(VerificationReport {
                status: PaymentStatus::Failed,
                amount_minor: None,
                data: json!({ "reference": reference, "message": "simulated payments are disabled" }),
            });
        }

        let verification = self.gateway.verify(reference).await?;
        let status = if verification.success { PaymentStatus::Success } else { PaymentStatus::Failed };
        tracing::info!(%reference, ?status, "payment verified");
        Ok(VerificationReport {
            status,
            amount_minor: verification.amount_minor,
            data: verification.raw.get("data").cloned().unwrap_or(verification.raw),
        })
    }

    /// Authenticates and decodes a webhook delivery. With no secret
    /// configured every delivery is accepted.
    pub fn parse_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookEvent> {
        match &self.settings.webhook_secret {
            Some(secret) => {
                let signature = signature
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| DomainError::Validation("missing webhook signature".into()))?;
                verify_signature(secret.expose_secret().as_bytes(), body, signature)?;
            }
            None => tracing::warn!("webhook secret not configured, accepting unsigned event"),
        }

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| DomainError::Validation(format!("webhook body is not JSON: {e}")))?;
        let event = WebhookEvent::from_payload(payload);
        match &event {
            WebhookEvent::ChargeSuccess { reference, .. } => {
                tracing::info!(reference = ?reference, "charge.success received")
            }
            WebhookEvent::ChargeFailed { reference, .. } => {
                tracing::warn!(reference = ?reference, "charge.failed received")
            }
            WebhookEvent::Other { event } => tracing::debug!(%event, "ignoring webhook event"),
        }
        Ok(event)
    }
}

fn webhook_mac(secret: &[u8], body: &[u8]) -> Result<HmacSha512> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|e| DomainError::Configuration(format!("webhook secret rejected: {e}")))?;
    mac.update(body);
    Ok(mac)
}

/// HMAC-SHA512 over the raw body, hex encoded, as the gateway signs it.
#[cfg(any(test, feature = "testing"))]
pub fn sign_webhook(secret: &[u8], body: &[u8]) -> Result<String> {
    Ok(hex::encode(webhook_mac(secret, body)?.finalize().into_bytes()))
}

fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<()> {
    let invalid = || DomainError::Validation("invalid webhook signature".into());
    let expected = hex::decode(signature).map_err(|_| invalid())?;
    webhook_mac(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| invalid())
}
