//! Gateway-facing endpoints and the browser callback page.

use askama::Template;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use services::{CallbackFailure, CallbackOutcome, CallbackParams, InitializePayment, VerificationReport, WebhookEvent};

use crate::http::extract::MaybeIdentity;
use crate::http::{ApiResult, AppState};
use crate::views::PaymentCallbackPage;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Creates a gateway transaction and returns the gateway's body untouched.
pub async fn initialize(
    State(state): State<AppState>,
    Json(body): Json<InitializePayment>,
) -> ApiResult<Json<Value>> {
    let init = state.services.payments.initialize(body).await?;
    Ok(Json(init.raw))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub reference: Option<String>,
}

pub async fn verify(
    State(state): State<AppState>,
    Query(q): Query<VerifyQuery>,
) -> ApiResult<Json<VerificationReport>> {
    let reference = q.reference.unwrap_or_default();
    match state.services.payments.verify(&reference).await {
        Ok(report) => {
            state
                .metrics
                .verification(if report.is_success() { "success" } else { "failed" });
            Ok(Json(report))
        }
        Err(e) => {
            state.metrics.verification("error");
            Err(e.into())
        }
    }
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = state.services.payments.parse_webhook(&body, signature)?;
    let name = match &event {
        WebhookEvent::ChargeSuccess { .. } => "charge.success",
        WebhookEvent::ChargeFailed { .. } => "charge.failed",
        WebhookEvent::Other { .. } => "other",
    };
    state.metrics.webhook(name);
    Ok(Json(json!({ "status": "success" })))
}

fn failure_status(failure: &CallbackFailure) -> StatusCode {
    match failure {
        CallbackFailure::MissingReference => StatusCode::BAD_REQUEST,
        CallbackFailure::VerificationFailed { .. } | CallbackFailure::AmountMismatch { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        CallbackFailure::CheckoutNotFound { .. } => StatusCode::NOT_FOUND,
        CallbackFailure::EnrollmentWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Where the gateway sends the browser after payment.
pub async fn callback(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let outcome = state.services.callback.handle(&params, identity.as_ref()).await;
    state.metrics.callback(outcome.label());

    match outcome {
        CallbackOutcome::LoginRequired { location } => Ok(Redirect::to(&location).into_response()),
        CallbackOutcome::Enrolled { enrollment, replayed } => {
            let message = if replayed {
                "This payment was already processed. Your enrollment is active."
            } else {
                state.metrics.enrollment_written();
                "Your payment was confirmed and your enrollment is active."
            };
            let page = PaymentCallbackPage {
                success: true,
                heading: "You're enrolled",
                message,
                reference: Some(enrollment.payment_reference.as_str()),
                course_title: Some(enrollment.course_title.as_str()),
                enrollment_id: Some(enrollment.id.as_str()),
            };
            Ok(Html(page.render()?).into_response())
        }
        CallbackOutcome::Failed(failure) => {
            let message = failure.to_string();
            let page = PaymentCallbackPage {
                success: false,
                heading: "We couldn't complete your enrollment",
                message: &message,
                reference: failure.reference(),
                course_title: None,
                enrollment_id: None,
            };
            Ok((failure_status(&failure), Html(page.render()?)).into_response())
        }
    }
}
