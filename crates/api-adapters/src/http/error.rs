//! JSON error bodies for every API route.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed request the domain layer never saw (bad multipart, bad query).
    #[error("{0}")]
    BadRequest(String),

    #[error("failed to render page: {0}")]
    Render(#[from] askama::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Domain(e) => match e {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
                DomainError::Gateway(_)
                | DomainError::Storage(_)
                | DomainError::Configuration(_)
                | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let detail = || Some(Value::String(self.to_string()));
        let (error, details) = match self {
            Self::Domain(DomainError::InvalidForm(fields)) => (
                "Please correct the highlighted fields".to_string(),
                Some(json!({ "fields": fields })),
            ),
            Self::Domain(DomainError::Gateway(_)) => ("Payment provider request failed".into(), detail()),
            Self::Domain(DomainError::Storage(_)) => ("Data store request failed".into(), detail()),
            Self::Domain(DomainError::Configuration(_) | DomainError::Internal(_)) | Self::Render(_) => {
                ("Internal server error".into(), detail())
            }
            other => (other.to_string(), None),
        };
        ErrorBody { error, details }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::InvalidForm(BTreeMap::new()), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (DomainError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (DomainError::not_found("Course", "7"), StatusCode::NOT_FOUND),
            (DomainError::Conflict("x".into()), StatusCode::CONFLICT),
            (DomainError::Gateway("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn invalid_form_lists_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "Email is required".to_string());
        let body = ApiError::from(DomainError::InvalidForm(fields)).body();
        assert_eq!(body.details.unwrap()["fields"]["email"], "Email is required");
    }

    #[test]
    fn storage_failures_carry_details() {
        let body = ApiError::from(DomainError::Storage("disk full".into())).body();
        assert_eq!(body.error, "Data store request failed");
        assert!(body.details.unwrap().as_str().unwrap().contains("disk full"));
    }
}
