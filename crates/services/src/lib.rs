//! # services
//!
//! Marketplace workflows on top of the domain ports: catalog reads, the
//! registration wizard, checkout, payment callback, enrollment writes,
//! certificate issuance and the activity feed.
//!
//! Nothing here knows about HTTP or a concrete store. [`Services::new`]
//! takes the adapter handles built by the binary and wires every service
//! with explicit `Arc`s.

pub mod activity;
pub mod callback;
pub mod catalog;
pub mod certificates;
pub mod checkout;
mod docs;
pub mod enrollment;
pub mod payments;
pub mod registration;
pub mod retry;
pub mod users;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use domains::{DocumentStore, MediaStorage, PaymentGateway};

pub use activity::{ActivityFeed, NewActivity};
pub use callback::{CallbackFailure, CallbackOutcome, CallbackParams, PaymentCallbackHandler};
pub use catalog::{CatalogReader, CatalogSettings, CourseAdmin};
pub use certificates::{CertificateDraft, CertificateIssuer, CertificateUpload, IssueCertificate};
pub use checkout::{CheckoutOutcome, CheckoutService, StagedCheckout};
pub use enrollment::{EnrollmentWriter, NewEnrollment};
pub use payments::{InitializePayment, PaymentService, PaymentSettings, VerificationReport, WebhookEvent};
pub use registration::{CompletedRegistration, RegistrationWizard, ValidationErrors, WizardStep};
pub use retry::RetryPolicy;
pub use users::UserDirectory;

/// Adapter handles chosen at startup.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn DocumentStore>,
    pub media: Arc<dyn MediaStorage>,
    pub gateway: Arc<dyn PaymentGateway>,
}

pub struct ServiceSettings {
    pub catalog: CatalogSettings,
    pub payment: PaymentSettings,
    pub certificate_upload: RetryPolicy,
    pub activity_feed_limit: usize,
    pub login_path: String,
    /// Path part of the payment callback URL, used for post-login returns.
    pub callback_path: String,
}

/// Every workflow service, wired once and shared by the API layer.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<CatalogReader>,
    pub courses: Arc<CourseAdmin>,
    pub users: Arc<UserDirectory>,
    pub payments: Arc<PaymentService>,
    pub checkout: Arc<CheckoutService>,
    pub callback: Arc<PaymentCallbackHandler>,
    pub enrollments: Arc<EnrollmentWriter>,
    pub certificates: Arc<CertificateIssuer>,
    pub activity: Arc<ActivityFeed>,
    pub media: Arc<dyn MediaStorage>,
    pub store: Arc<dyn DocumentStore>,
}

impl Services {
    pub fn new(ports: Ports, settings: ServiceSettings) -> Self {
        let Ports { store, media, gateway } = ports;

        let activity = Arc::new(ActivityFeed::new(store.clone(), settings.activity_feed_limit));
        let users = Arc::new(UserDirectory::new(store.clone(), activity.clone()));
        let catalog = Arc::new(CatalogReader::new(store.clone(), settings.catalog));
        let courses = Arc::new(CourseAdmin::new(
            store.clone(),
            media.clone(),
            catalog.clone(),
            activity.clone(),
        ));
        let payments = Arc::new(PaymentService::new(gateway, settings.payment));
        let enrollments = Arc::new(EnrollmentWriter::new(store.clone(), catalog.clone(), activity.clone()));
        let checkout = Arc::new(CheckoutService::new(
            store.clone(),
            catalog.clone(),
            payments.clone(),
            enrollments.clone(),
        ));
        let callback = Arc::new(PaymentCallbackHandler::new(
            store.clone(),
            payments.clone(),
            enrollments.clone(),
            settings.login_path,
            settings.callback_path,
        ));
        let certificates = Arc::new(CertificateIssuer::new(
            store.clone(),
            media.clone(),
            users.clone(),
            catalog.clone(),
            enrollments.clone(),
            activity.clone(),
            settings.certificate_upload,
        ));

        Self {
            catalog,
            courses,
            users,
            payments,
            checkout,
            callback,
            enrollments,
            certificates,
            activity,
            media,
            store,
        }
    }
}
