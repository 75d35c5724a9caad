//! # Payment callback
//!
//! The gateway sends the browser here with `?reference=` (or `?trxref=`).
//! The handler confirms payment, loads the staged registration, writes the
//! enrollment and reports a terminal outcome. Simulated references need a
//! signed-in user and skip verification; gateway references are verified and
//! enrolled for the user who staged the checkout, session or not. Once a payment has been
//! confirmed, every failure message carries the reference so support can
//! reconcile the charge by hand.

use std::sync::Arc;

use chrono::Utc;
use domains::{collections, is_mock_reference, DocumentStore, Enrollment, Identity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkout::StagedCheckout;
use crate::docs;
use crate::enrollment::{EnrollmentWriter, NewEnrollment};
use crate::payments::PaymentService;

/// Query parameters on the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

impl CallbackParams {
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.trxref.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Parked redirect for a callback that arrived without a session
/// (`paymentResumes/{reference}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResume {
    pub reference: String,
    pub redirect_to: String,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackFailure {
    #[error("No payment reference was provided.")]
    MissingReference,

    #[error("Payment {reference} could not be verified. You have not been enrolled.")]
    VerificationFailed { reference: String },

    #[error("Payment {reference} was confirmed but no pending registration was found for it. Please contact support with this reference.")]
    CheckoutNotFound { reference: String },

    #[error("Payment {reference} covered {paid_minor} but the course costs {expected_minor} (minor units). Please contact support with this reference.")]
    AmountMismatch { reference: String, paid_minor: u64, expected_minor: u64 },

    #[error("Payment {reference} was confirmed but the enrollment could not be saved ({reason}). Please contact support with this reference.")]
    EnrollmentWrite { reference: String, reason: String },
}

impl CallbackFailure {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::MissingReference => None,
            Self::VerificationFailed { reference }
            | Self::CheckoutNotFound { reference }
            | Self::AmountMismatch { reference, .. }
            | Self::EnrollmentWrite { reference, .. } => Some(reference),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingReference => "missing_reference",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::CheckoutNotFound { .. } => "checkout_not_found",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::EnrollmentWrite { .. } => "enrollment_write",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// `replayed` is set when the reference had already been enrolled.
    Enrolled { enrollment: Enrollment, replayed: bool },
    /// No session: redirect to `location`, which returns here after login.
    LoginRequired { location: String },
    Failed(CallbackFailure),
}

impl CallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Enrolled { replayed: false, .. } => "enrolled",
            Self::Enrolled { replayed: true, .. } => "replayed",
            Self::LoginRequired { .. } => "login_required",
            Self::Failed(f) => f.kind(),
        }
    }
}

pub struct PaymentCallbackHandler {
    store: Arc<dyn DocumentStore>,
    payments: Arc<PaymentService>,
    enrollments: Arc<EnrollmentWriter>,
    login_path: String,
    callback_path: String,
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

impl PaymentCallbackHandler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payments: Arc<PaymentService>,
        enrollments: Arc<EnrollmentWriter>,
        login_path: impl Into<String>,
        callback_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payments,
            enrollments,
            login_path: login_path.into(),
            callback_path: callback_path.into(),
        }
    }

    pub async fn handle(&self, params: &CallbackParams, identity: Option<&Identity>) -> CallbackOutcome {
        let Some(reference) = params.reference() else {
            return CallbackOutcome::Failed(CallbackFailure::MissingReference);
        };

        // simulated payments carry no gateway proof, so they are tied to a session
        if identity.is_none() && is_mock_reference(reference) {
            return self.park_for_login(reference).await;
        }

        let outcome = self.complete(reference, identity).await;
        match &outcome {
            CallbackOutcome::Failed(failure) => {
                tracing::error!(%reference, kind = failure.kind(), "payment callback failed: {failure}")
            }
            other => tracing::info!(%reference, outcome = other.label(), "payment callback handled"),
        }
        outcome
    }

    /// Remembers where to come back to and sends the browser to login.
    async fn park_for_login(&self, reference: &str) -> CallbackOutcome {
        let return_to = format!("{}?reference={}", self.callback_path, encode(reference));
        let resume = PaymentResume {
            reference: reference.to_string(),
            redirect_to: return_to.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = docs::save(self.store.as_ref(), collections::PAYMENT_RESUMES, reference, &resume).await {
            tracing::warn!(%reference, error = %e, "failed to park payment resume");
        }
        CallbackOutcome::LoginRequired {
            location: format!("{}?redirect={}", self.login_path, encode(&return_to)),
        }
    }

    /// Confirmed amount in minor units; `Ok(None)` when the reference is a
    /// simulated one that skips the gateway.
    async fn confirm(&self, reference: &str) -> std::result::Result<Option<u64>, CallbackFailure> {
        let failed = || CallbackFailure::VerificationFailed { reference: reference.into() };
        if self.payments.skips_verification(reference) {
            tracing::debug!(%reference, "simulated payment, verification skipped");
            return Ok(None);
        }
        match self.payments.verify(reference).await {
            Ok(report) if report.is_success() => Ok(report.amount_minor),
            Ok(_) => Err(failed()),
            Err(e) => {
                tracing::warn!(%reference, error = %e, "verification call failed");
                Err(failed())
            }
        }
    }

    async fn complete(&self, reference: &str, identity: Option<&Identity>) -> CallbackOutcome {
        let confirmed_minor = match self.confirm(reference).await {
            Ok(amount) => amount,
            Err(failure) => return CallbackOutcome::Failed(failure),
        };

        let enrollment_write = |reason: String| {
            CallbackOutcome::Failed(CallbackFailure::EnrollmentWrite {
                reference: reference.into(),
                reason,
            })
        };

        match self.enrollments.find_by_reference(reference).await {
            Ok(Some(existing)) => {
                return CallbackOutcome::Enrolled { enrollment: existing, replayed: true };
            }
            Ok(None) => {}
            Err(e) => return enrollment_write(e.to_string()),
        }

        let staged: StagedCheckout =
            match docs::load(self.store.as_ref(), collections::CHECKOUT_STAGING, reference).await {
                Ok(Some(staged)) => staged,
                Ok(None) => {
                    return CallbackOutcome::Failed(CallbackFailure::CheckoutNotFound {
                        reference: reference.into(),
                    })
                }
                Err(e) => return enrollment_write(e.to_string()),
            };

        if let Some(identity) = identity.filter(|i| i.user_id != staged.user_id) {
            tracing::warn!(
                %reference,
                staged_user = %staged.user_id,
                session_user = %identity.user_id,
                "callback session differs from checkout user"
            );
        }

        if let Some(paid_minor) = confirmed_minor {
            if paid_minor < staged.amount_minor {
                return CallbackOutcome::Failed(CallbackFailure::AmountMismatch {
                    reference: reference.into(),
                    paid_minor,
                    expected_minor: staged.amount_minor,
                });
            }
        }

        let written = self
            .enrollments
            .write(NewEnrollment {
                user_id: staged.user_id,
                user_email: staged.user_email,
                registration: staged.registration,
                payment_reference: reference.to_string(),
                payment_amount: staged.amount,
            })
            .await;
        let enrollment = match written {
            Ok(enrollment) => enrollment,
            Err(e) => return enrollment_write(e.to_string()),
        };

        for collection in [collections::CHECKOUT_STAGING, collections::PAYMENT_RESUMES] {
            if let Err(e) = self.store.delete(collection, reference).await {
                tracing::warn!(%reference, %collection, error = %e, "cleanup after enrollment failed");
            }
        }
        CallbackOutcome::Enrolled { enrollment, replayed: false }
    }
}
