//! Wizard validation and checkout.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{DomainError, RegistrationFormData};
use serde::Serialize;
use serde_json::json;
use services::registration::validate_step as validate;
use services::{CheckoutOutcome, WizardStep};

use crate::http::extract::Authenticated;
use crate::http::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    pub step: u8,
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
    /// Step the wizard may move to; `None` when blocked or already last.
    pub next_step: Option<u8>,
}

/// Validates only the fields owned by `step` (1 to 4).
pub async fn validate_step(
    Path(step): Path<u8>,
    Json(form): Json<RegistrationFormData>,
) -> ApiResult<Json<StepValidation>> {
    let step = WizardStep::from_number(step)
        .ok_or_else(|| ApiError::bad_request(format!("unknown registration step {step}")))?;
    let errors = validate(step, &form);
    let valid = errors.is_empty();
    Ok(Json(StepValidation {
        step: step.number(),
        valid,
        next_step: if valid { step.next().map(WizardStep::number) } else { None },
        errors: errors.to_field_map(),
    }))
}

pub async fn checkout(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(form): Json<RegistrationFormData>,
) -> ApiResult<Response> {
    let outcome = match state.services.checkout.start(&identity, &form).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let label = match &e {
                DomainError::InvalidForm(_) | DomainError::Validation(_) => "rejected",
                DomainError::NotFound { .. } => "unknown_course",
                _ => "error",
            };
            state.metrics.checkout(label);
            return Err(e.into());
        }
    };

    match outcome {
        CheckoutOutcome::Enrolled(enrollment) => {
            state.metrics.checkout("free");
            state.metrics.enrollment_written();
            let body = json!({ "status": "enrolled", "enrollment": enrollment });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        CheckoutOutcome::Redirect { authorization_url, reference } => {
            state.metrics.checkout("redirect");
            let body = json!({
                "status": "redirect",
                "authorizationUrl": authorization_url,
                "reference": reference,
            });
            Ok(Json(body).into_response())
        }
    }
}
