//! # PaystackGateway
//!
//! REST client for the hosted gateway: `POST /transaction/initialize` and
//! `GET /transaction/verify/{reference}`, authenticated with the secret key.

use std::time::Duration;

use async_trait::async_trait;
use domains::{
    DomainError, GatewayInit, GatewayVerification, InitializeRequest, PaymentGateway, Result,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<SecretString>,
    currency: Option<String>,
}

impl PaystackGateway {
    /// A missing key is allowed at construction; calls then fail with a
    /// configuration error so the endpoint reports it.
    pub fn new(base_url: impl Into<String>, secret_key: Option<SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key,
            currency: None,
        })
    }

    /// ISO currency sent with every initialize call; the account default
    /// applies when unset.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        let currency = currency.into();
        self.currency = Some(currency.trim().to_ascii_uppercase()).filter(|c| !c.is_empty());
        self
    }

    fn secret(&self) -> Result<&str> {
        self.secret_key
            .as_ref()
            .map(|s| s.expose_secret())
            .ok_or_else(|| DomainError::Configuration("payment secret key is not configured".into()))
    }

    async fn read_json(response: reqwest::Response) -> Result<(reqwest::StatusCode, Value)> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::Gateway(format!("unreadable gateway response: {e}")))?;
        Ok((status, body))
    }
}

fn transport_err(err: reqwest::Error) -> DomainError {
    DomainError::Gateway(format!("gateway unreachable: {err}"))
}

fn gateway_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string()
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: &InitializeRequest) -> Result<GatewayInit> {
        let mut payload = json!({
            "email": request.email,
            "amount": request.amount_minor,
            "reference": request.reference,
            "callback_url": request.callback_url,
            "metadata": request.metadata,
        });
        if let Some(currency) = &self.currency {
            payload["currency"] = Value::String(currency.clone());
        }
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(self.secret()?)
            .json(&payload)
            .send()
            .await
            .map_err(transport_err)?;
        let (status, body) = Self::read_json(response).await?;

        if !status.is_success() || body.get("status") != Some(&Value::Bool(true)) {
            tracing::warn!(%status, reference = %request.reference, "gateway refused initialize");
            return Err(DomainError::Gateway(gateway_message(&body)));
        }

        let data = &body["data"];
        let authorization_url = data["authorization_url"]
            .as_str()
            .ok_or_else(|| DomainError::Gateway("response missing authorization_url".into()))?
            .to_string();
        let reference = data["reference"]
            .as_str()
            .unwrap_or(&request.reference)
            .to_string();

        Ok(GatewayInit { authorization_url, reference, raw: body })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification> {
        let encoded: String = url::form_urlencoded::byte_serialize(reference.as_bytes()).collect();
        let response = self
            .client
            .get(format!("{}/transaction/verify/{encoded}", self.base_url))
            .bearer_auth(self.secret()?)
            .send()
            .await
            .map_err(transport_err)?;
        let (status, body) = Self::read_json(response).await?;

        let success = status.is_success()
            && body.get("status") == Some(&Value::Bool(true))
            && body["data"]["status"].as_str() == Some("success");
        if !success {
            tracing::info!(%status, %reference, message = %gateway_message(&body), "transaction not successful");
        }

        Ok(GatewayVerification {
            success,
            amount_minor: body["data"]["amount"].as_u64(),
            raw: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    const KEY: &str = "sk_test_key";

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer sk_test_key")
    }

    fn refused() -> (StatusCode, Json<Value>) {
        (StatusCode::UNAUTHORIZED, Json(json!({ "status": false, "message": "Invalid key" })))
    }

    async fn initialize(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return refused();
        }
        if body["email"] == "declined@example.com" {
            return (StatusCode::OK, Json(json!({ "status": false, "message": "Declined" })));
        }
        let reference = body["reference"].as_str().unwrap_or_default().to_string();
        (
            StatusCode::OK,
            Json(json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": format!("https://checkout.example/{reference}"),
                    "access_code": "ac_1",
                    "reference": reference,
                },
                "received": body,
            })),
        )
    }

    async fn verify(headers: HeaderMap, Path(reference): Path<String>) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return refused();
        }
        match reference.as_str() {
            "CM-missing" => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": false, "message": "Transaction reference not found" })),
            ),
            "CM-ok" => (
                StatusCode::OK,
                Json(json!({ "status": true, "data": { "status": "success", "reference": reference, "amount": 500_000 } })),
            ),
            _ => (
                StatusCode::OK,
                Json(json!({ "status": true, "data": { "status": "abandoned", "reference": reference, "amount": 500_000 } })),
            ),
        }
    }

    /// Serves a stand-in for the gateway API on an ephemeral port.
    async fn gateway_server() -> String {
        let app = Router::new()
            .route("/transaction/initialize", post(initialize))
            .route("/transaction/verify/{reference}", get(verify));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn gateway(base_url: &str, key: &str) -> PaystackGateway {
        PaystackGateway::new(base_url, Some(SecretString::from(key.to_string())))
            .unwrap()
            .with_currency(" ngn ")
    }

    fn request(email: &str) -> InitializeRequest {
        InitializeRequest {
            email: email.into(),
            amount_minor: 500_000,
            reference: "CM-ref-1".into(),
            callback_url: "http://localhost:8080/payment/callback".into(),
            metadata: json!({ "courseId": "c1" }),
        }
    }

    #[tokio::test]
    async fn initialize_returns_authorization_url_and_reference() {
        let base = gateway_server().await;
        let init = gateway(&base, KEY).initialize(&request("ada@example.com")).await.unwrap();

        assert_eq!(init.reference, "CM-ref-1");
        assert_eq!(init.authorization_url, "https://checkout.example/CM-ref-1");
        let sent = &init.raw["received"];
        assert_eq!(sent["amount"], 500_000);
        assert_eq!(sent["currency"], "NGN");
        assert_eq!(sent["callback_url"], "http://localhost:8080/payment/callback");
        assert_eq!(sent["metadata"]["courseId"], "c1");
    }

    #[tokio::test]
    async fn initialize_refusals_are_gateway_errors() {
        let base = gateway_server().await;

        match gateway(&base, KEY).initialize(&request("declined@example.com")).await {
            Err(DomainError::Gateway(message)) => assert_eq!(message, "Declined"),
            other => panic!("unexpected {other:?}"),
        }
        match gateway(&base, "sk_wrong").initialize(&request("ada@example.com")).await {
            Err(DomainError::Gateway(message)) => assert_eq!(message, "Invalid key"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_reports_success_and_amount() {
        let base = gateway_server().await;
        let verification = gateway(&base, KEY).verify("CM-ok").await.unwrap();
        assert!(verification.success);
        assert_eq!(verification.amount_minor, Some(500_000));
        assert_eq!(verification.raw["data"]["reference"], "CM-ok");
    }

    #[tokio::test]
    async fn verify_treats_unpaid_and_unknown_as_unsuccessful() {
        let base = gateway_server().await;
        let gw = gateway(&base, KEY);

        let abandoned = gw.verify("CM-abandoned").await.unwrap();
        assert!(!abandoned.success);

        let missing = gw.verify("CM-missing").await.unwrap();
        assert!(!missing.success);
        assert_eq!(missing.amount_minor, None);

        let unauthorized = gateway(&base, "sk_wrong").verify("CM-ok").await.unwrap();
        assert!(!unauthorized.success);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_gateway_error() {
        let gw = gateway("http://127.0.0.1:9", KEY);
        assert!(matches!(gw.verify("CM-ok").await, Err(DomainError::Gateway(_))));
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let gw = PaystackGateway::new("https://api.example.invalid", None).unwrap();
        let res = gw.verify("T1").await;
        assert!(matches!(res, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn message_defaults_when_absent() {
        assert_eq!(gateway_message(&json!({})), "no message");
        assert_eq!(gateway_message(&json!({ "message": "Invalid key" })), "Invalid key");
    }
}
