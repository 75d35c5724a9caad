//! # DomainError
//!
//! Centralized error handling for the course marketplace.
//! Maps workflow failures to actionable error types; the API layer turns
//! each variant into an HTTP status.

use std::collections::BTreeMap;

use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Course, Enrollment, Certificate)
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed or missing input (e.g., missing query parameter)
    #[error("validation error: {0}")]
    Validation(String),

    /// Field-level form errors, keyed by field name
    #[error("form has {} invalid field(s)", .0.len())]
    InvalidForm(BTreeMap<String, String>),

    /// No usable session / credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed (e.g., non-admin on an admin route)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists or state does not allow the operation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Payment gateway rejected or failed a call
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Document store or object storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Required runtime setting is absent (e.g., gateway secret key)
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("malformed document: {err}"))
    }
}

/// A specialized Result type for marketplace logic.
pub type Result<T> = std::result::Result<T, DomainError>;
