//! Development-only gateway: no network, every transaction "succeeds".

use async_trait::async_trait;
use domains::{
    is_mock_reference, GatewayInit, GatewayVerification, InitializeRequest, PaymentGateway, Result,
    MOCK_REFERENCE_PREFIX,
};
use serde_json::json;

/// Sends the browser straight back to the callback URL with a `MOCK-`
/// reference instead of to a hosted checkout page.
#[derive(Debug, Default, Clone)]
pub struct SimulatedGateway;

impl SimulatedGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initialize(&self, request: &InitializeRequest) -> Result<GatewayInit> {
        let reference = if is_mock_reference(&request.reference) {
            request.reference.clone()
        } else {
            format!("{MOCK_REFERENCE_PREFIX}{}", request.reference)
        };
        let encoded: String = url::form_urlencoded::byte_serialize(reference.as_bytes()).collect();
        let separator = if request.callback_url.contains('?') { '&' } else { '?' };
        let authorization_url = format!("{}{separator}reference={encoded}", request.callback_url);

        tracing::info!(%reference, amount = request.amount_minor, "simulated payment initialized");
        Ok(GatewayInit {
            raw: json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": authorization_url,
                    "access_code": "mock",
                    "reference": reference,
                }
            }),
            authorization_url,
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification> {
        let success = is_mock_reference(reference);
        Ok(GatewayVerification {
            success,
            amount_minor: None,
            raw: json!({
                "status": success,
                "data": {
                    "status": if success { "success" } else { "failed" },
                    "reference": reference,
                }
            }),
        })
    }
}
