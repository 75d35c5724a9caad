//! Shared harness: the full router over in-memory adapters, the simulated
//! gateway and real HS256 session tokens.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use api_adapters::{router, AppState, HttpSettings};
use auth_adapters::{JwtIdentityProvider, JwtIssuer};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use domains::{collections, DocumentStore, Identity, UserId};
use payment_adapters::SimulatedGateway;
use secrecy::SecretString;
use serde_json::{json, Value};
use services::{CatalogSettings, PaymentSettings, Ports, RetryPolicy, ServiceSettings, Services};
use storage_adapters::{MemoryDocumentStore, MemoryMediaStorage};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-secret";
pub const BASE_URL: &str = "http://localhost:8080";

pub struct TestApp {
    pub store: Arc<MemoryDocumentStore>,
    pub media: Arc<MemoryMediaStorage>,
    issuer: JwtIssuer,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None, CatalogSettings::default()).await
    }

    pub async fn with_webhook_secret(secret: &str) -> Self {
        Self::build(Some(secret), CatalogSettings::default()).await
    }

    pub async fn with_catalog(catalog: CatalogSettings) -> Self {
        Self::build(None, catalog).await
    }

    async fn build(webhook_secret: Option<&str>, catalog: CatalogSettings) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let media = Arc::new(MemoryMediaStorage::new("/uploads"));
        let secret = SecretString::from(JWT_SECRET.to_string());

        let services = Services::new(
            Ports {
                store: store.clone(),
                media: media.clone(),
                gateway: Arc::new(SimulatedGateway::new()),
            },
            ServiceSettings {
                catalog,
                payment: PaymentSettings {
                    callback_url: format!("{BASE_URL}/payment/callback"),
                    mock_mode: true,
                    webhook_secret: webhook_secret.map(|s| SecretString::from(s.to_string())),
                },
                certificate_upload: RetryPolicy { attempts: 2, backoff: Duration::from_millis(1) },
                activity_feed_limit: 20,
                login_path: "/login".into(),
                callback_path: "/payment/callback".into(),
            },
        );
        let state = AppState::new(
            services,
            Arc::new(JwtIdentityProvider::new(&secret)),
            HttpSettings::default(),
        );

        Self {
            store,
            media,
            issuer: JwtIssuer::new(&secret),
            router: router(state),
        }
    }

    pub fn token(&self, user_id: &str, email: &str) -> String {
        let identity = Identity { user_id: UserId::new(user_id), email: email.into(), name: None };
        self.issuer
            .issue(&identity, chrono::Duration::hours(1))
            .expect("token")
    }

    pub async fn seed_course(&self, id: &str, doc: Value) {
        self.store.set(collections::COURSES, id, doc).await.unwrap();
    }

    pub async fn seed_user(&self, id: &str, email: &str, role: &str) -> String {
        self.store
            .set(
                collections::USERS,
                id,
                json!({ "id": id, "email": email, "displayName": id, "role": role }),
            )
            .await
            .unwrap();
        self.token(id, email)
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        TestResponse { status, headers, body }
    }

    /// For streaming responses: status and headers without reading the body.
    pub async fn open(&self, uri: &str, token: Option<&str>) -> (StatusCode, HeaderMap) {
        let req = with_auth(Request::get(uri), token).body(Body::empty()).unwrap();
        let res = self.router.clone().oneshot(req).await.unwrap();
        (res.status(), res.headers().clone())
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(with_auth(Request::get(uri), token).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let req = with_auth(Request::post(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let req = with_auth(Request::put(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(with_auth(Request::delete(uri), token).body(Body::empty()).unwrap()).await
    }

    pub async fn post_multipart(&self, uri: &str, token: Option<&str>, form: Multipart) -> TestResponse {
        let (content_type, body) = form.finish();
        let req = with_auth(Request::post(uri), token)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

/// Minimal multipart/form-data encoder.
pub struct Multipart {
    body: Vec<u8>,
}

const BOUNDARY: &str = "----course-market-test-boundary";

impl Multipart {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={BOUNDARY}"), self.body)
    }
}

/// A complete wizard submission for `course_id`.
pub fn registration(course_id: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "phone": "+2348000000000",
        "highestEducation": "Masters",
        "fieldOfStudy": "Mathematics",
        "selectedCourseId": course_id,
        "learningGoals": "Analytical engines",
        "preferredSchedule": "weekends",
        "paymentMethod": "card",
        "agreeToTerms": true,
    })
}

pub fn course(title: &str, slug: &str, category: &str, price: f64) -> Value {
    json!({
        "title": title,
        "slug": slug,
        "category": category,
        "price": price,
        "published": true,
        "instructor": "Grace Okafor",
    })
}
