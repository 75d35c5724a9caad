//! # Domain Models
//!
//! These structs represent the documents the marketplace stores.
//! Field names serialize in camelCase to stay compatible with existing
//! documents.

pub mod activity;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod ids;
pub mod registration;
pub mod user;

pub use activity::*;
pub use certificate::*;
pub use course::*;
pub use enrollment::*;
pub use ids::*;
pub use registration::*;
pub use user::*;

/// Collection names in the document store.
pub mod collections {
    pub const COURSES: &str = "courses";
    pub const USERS: &str = "users";
    pub const ENROLLMENTS: &str = "enrollments";
    pub const CERTIFICATES: &str = "certificates";
    pub const ACTIVITIES: &str = "activities";
    /// Checkout state parked across the gateway redirect, keyed by payment reference.
    pub const CHECKOUT_STAGING: &str = "checkoutStaging";
    /// Mock references waiting for the user to sign in, keyed by payment reference.
    pub const PAYMENT_RESUMES: &str = "paymentResumes";
}
