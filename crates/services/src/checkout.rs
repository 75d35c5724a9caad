//! # Checkout
//!
//! Turns a submitted registration into either an immediate enrollment (free
//! course) or a gateway redirect (paid course). The validated registration
//! is staged server-side under the payment reference so the callback can
//! finish the enrollment after the browser round-trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    collections, DocumentStore, DomainError, Enrollment, Identity, RegistrationFormData, Result,
    UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::CatalogReader;
use crate::docs;
use crate::enrollment::{EnrollmentWriter, NewEnrollment};
use crate::payments::{generate_reference, to_minor_units, PaymentService, FREE_REFERENCE_PREFIX};
use crate::registration::CompletedRegistration;

/// Registration parked while the user is at the gateway
/// (`checkoutStaging/{reference}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedCheckout {
    pub reference: String,
    pub user_id: UserId,
    pub user_email: String,
    pub registration: CompletedRegistration,
    /// Major units quoted at checkout.
    pub amount: f64,
    pub amount_minor: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Free course: the enrollment exists already.
    Enrolled(Enrollment),
    /// Paid course: send the browser to `authorization_url`.
    Redirect { authorization_url: String, reference: String },
}

pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<CatalogReader>,
    payments: Arc<PaymentService>,
    enrollments: Arc<EnrollmentWriter>,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<CatalogReader>,
        payments: Arc<PaymentService>,
        enrollments: Arc<EnrollmentWriter>,
    ) -> Self {
        Self { store, catalog, payments, enrollments }
    }

    pub async fn start(&self, identity: &Identity, form: &RegistrationFormData) -> Result<CheckoutOutcome> {
        let registration =
            CompletedRegistration::from_form(form).map_err(|(_, errors)| DomainError::from(errors))?;

        let email = identity.email.trim();
        if email.is_empty() {
            return Err(DomainError::Validation(
                "your account has no email address, sign in again before paying".into(),
            ));
        }

        let course = self.catalog.find_published(&registration.selection.course_id).await?;
        if !course.price.is_finite() || course.price < 0.0 {
            return Err(DomainError::Validation(format!(
                "course {} has an invalid price",
                course.id
            )));
        }

        if course.is_free() {
            let enrollment = self
                .enrollments
                .write(NewEnrollment {
                    user_id: identity.user_id.clone(),
                    user_email: email.to_string(),
                    registration,
                    payment_reference: generate_reference(FREE_REFERENCE_PREFIX),
                    payment_amount: 0.0,
                })
                .await?;
            return Ok(CheckoutOutcome::Enrolled(enrollment));
        }

        let reference = self.payments.new_reference();
        let mut staged = StagedCheckout {
            reference: reference.clone(),
            user_id: identity.user_id.clone(),
            user_email: email.to_string(),
            registration,
            amount: course.price,
            amount_minor: to_minor_units(course.price)?,
            created_at: Utc::now(),
        };
        docs::save(self.store.as_ref(), collections::CHECKOUT_STAGING, &reference, &staged).await?;

        let metadata = json!({
            "courseId": course.id,
            "courseTitle": course.title,
            "userId": identity.user_id,
            "userEmail": email,
        });
        let init = match self
            .payments
            .start_transaction(email, course.price, &reference, metadata)
            .await
        {
            Ok(init) => init,
            Err(e) => {
                self.discard(&reference).await;
                return Err(e);
            }
        };

        if init.reference != reference {
            // gateway picked its own reference; re-key the staged checkout
            staged.reference = init.reference.clone();
            docs::save(self.store.as_ref(), collections::CHECKOUT_STAGING, &init.reference, &staged).await?;
            self.discard(&reference).await;
        }

        tracing::info!(
            reference = %init.reference,
            course_id = %course.id,
            user_id = %identity.user_id,
            "checkout staged, redirecting to gateway"
        );
        Ok(CheckoutOutcome::Redirect {
            authorization_url: init.authorization_url,
            reference: init.reference,
        })
    }

    async fn discard(&self, reference: &str) {
        if let Err(e) = self.store.delete(collections::CHECKOUT_STAGING, reference).await {
            tracing::warn!(%reference, error = %e, "failed to discard staged checkout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityFeed;
    use crate::catalog::CatalogSettings;
    use crate::payments::PaymentSettings;
    use domains::{GatewayInit, MockPaymentGateway, PaymentGateway};
    use storage_adapters::MemoryDocumentStore;

    fn form(course_id: &str) -> RegistrationFormData {
        RegistrationFormData {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            highest_education: "Masters".into(),
            selected_course_id: course_id.into(),
            learning_goals: "Engines".into(),
            payment_method: "card".into(),
            agree_to_terms: true,
            ..Default::default()
        }
    }

    fn identity(email: &str) -> Identity {
        Identity { user_id: UserId::new("u1"), email: email.into(), name: None }
    }

    async fn service(gateway: MockPaymentGateway, mock_mode: bool) -> (Arc<MemoryDocumentStore>, CheckoutService) {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set(collections::COURSES, "free", json!({ "title": "Intro", "price": 0 }))
            .await
            .unwrap();
        store
            .set(collections::COURSES, "paid", json!({ "title": "Advanced", "price": 5000 }))
            .await
            .unwrap();
        let catalog = Arc::new(CatalogReader::new(store.clone(), CatalogSettings::default()));
        let activity = Arc::new(ActivityFeed::new(store.clone(), 10));
        let enrollments = Arc::new(EnrollmentWriter::new(store.clone(), catalog.clone(), activity));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
        let payments = Arc::new(PaymentService::new(
            gateway,
            PaymentSettings {
                callback_url: "http://localhost:8080/payment/callback".into(),
                mock_mode,
                webhook_secret: None,
            },
        ));
        (store.clone(), CheckoutService::new(store, catalog, payments, enrollments))
    }

    fn echo_init(req: &domains::InitializeRequest) -> Result<GatewayInit> {
        Ok(GatewayInit {
            authorization_url: format!("https://pay.example/{}", req.reference),
            reference: req.reference.clone(),
            raw: json!({}),
        })
    }

    #[tokio::test]
    async fn free_course_enrolls_without_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().times(0);
        let (store, checkout) = service(gateway, false).await;

        let outcome = checkout.start(&identity("ada@example.com"), &form("free")).await.unwrap();
        match outcome {
            CheckoutOutcome::Enrolled(e) => {
                assert_eq!(e.payment_amount, 0.0);
                assert!(e.payment_reference.starts_with(FREE_REFERENCE_PREFIX));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.count(collections::ENROLLMENTS), 1);
        assert_eq!(store.count(collections::CHECKOUT_STAGING), 0);
    }

    #[tokio::test]
    async fn paid_course_initializes_once_and_stages() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_initialize()
            .withf(|req| req.amount_minor == 500_000 && req.email == "ada@example.com")
            .times(1)
            .returning(echo_init);
        let (store, checkout) = service(gateway, true).await;

        let outcome = checkout.start(&identity("ada@example.com"), &form("paid")).await.unwrap();
        let CheckoutOutcome::Redirect { authorization_url, reference } = outcome else {
            panic!("expected redirect");
        };
        assert!(reference.starts_with("MOCK-"));
        assert!(authorization_url.ends_with(&reference));
        assert_eq!(store.count(collections::ENROLLMENTS), 0);

        let staged = store.get(collections::CHECKOUT_STAGING, &reference).await.unwrap().unwrap();
        let staged: StagedCheckout = serde_json::from_value(staged).unwrap();
        assert_eq!(staged.amount_minor, 500_000);
        assert_eq!(staged.registration.selection.course_id.as_str(), "paid");
    }

    #[tokio::test]
    async fn empty_session_email_is_rejected_before_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().times(0);
        let (store, checkout) = service(gateway, false).await;

        let res = checkout.start(&identity("  "), &form("paid")).await;
        assert!(matches!(res, Err(DomainError::Validation(_))));
        assert_eq!(store.count(collections::CHECKOUT_STAGING), 0);
    }

    #[tokio::test]
    async fn gateway_failure_discards_staged_checkout() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_initialize()
            .times(1)
            .returning(|_| Err(DomainError::Gateway("declined".into())));
        let (store, checkout) = service(gateway, false).await;

        let res = checkout.start(&identity("ada@example.com"), &form("paid")).await;
        assert!(matches!(res, Err(DomainError::Gateway(_))));
        assert_eq!(store.count(collections::CHECKOUT_STAGING), 0);
    }

    #[tokio::test]
    async fn gateway_reference_rekeys_staging() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().returning(|_| {
            Ok(GatewayInit {
                authorization_url: "https://pay.example/x".into(),
                reference: "GW-123".into(),
                raw: json!({}),
            })
        });
        let (store, checkout) = service(gateway, false).await;

        checkout.start(&identity("ada@example.com"), &form("paid")).await.unwrap();
        assert_eq!(store.count(collections::CHECKOUT_STAGING), 1);
        assert!(store.get(collections::CHECKOUT_STAGING, "GW-123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn incomplete_form_is_an_invalid_form_error() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().times(0);
        let (_, checkout) = service(gateway, false).await;

        let mut bad = form("paid");
        bad.agree_to_terms = false;
        match checkout.start(&identity("ada@example.com"), &bad).await {
            Err(DomainError::InvalidForm(fields)) => assert!(fields.contains_key("agreeToTerms")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unpublished_or_unknown_course_is_not_found() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initialize().times(0);
        let (_, checkout) = service(gateway, false).await;
        let res = checkout.start(&identity("ada@example.com"), &form("ghost")).await;
        assert!(matches!(res, Err(DomainError::NotFound { .. })));
    }
}
