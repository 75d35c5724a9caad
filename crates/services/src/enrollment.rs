//! # Enrollment writer
//!
//! The one place enrollment documents are created. Callers have already
//! confirmed payment (or that the course is free).

use std::sync::Arc;

use chrono::Utc;
use domains::{
    collections, ActivityKind, ActorSnapshot, CourseRef, CourseSnapshot, DocumentStore,
    DomainError, Enrollment, EnrollmentStatus, Query, Result, UserId,
};
use serde_json::json;
use uuid::Uuid;

use crate::activity::{ActivityFeed, NewActivity};
use crate::catalog::CatalogReader;
use crate::docs;
use crate::registration::CompletedRegistration;

/// Everything needed to write one enrollment.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub user_email: String,
    pub registration: CompletedRegistration,
    pub payment_reference: String,
    /// Major units actually charged.
    pub payment_amount: f64,
}

/// `ENR-<unix millis>-<8 hex chars>`.
pub fn generate_enrollment_id() -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!("ENR-{}-{}", Utc::now().timestamp_millis(), &nonce[..8])
}

pub struct EnrollmentWriter {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<CatalogReader>,
    activity: Arc<ActivityFeed>,
}

impl EnrollmentWriter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<CatalogReader>,
        activity: Arc<ActivityFeed>,
    ) -> Self {
        Self { store, catalog, activity }
    }

    /// Re-reads the course, snapshots it and persists the enrollment.
    pub async fn write(&self, new: NewEnrollment) -> Result<Enrollment> {
        let course_id = new.registration.selection.course_id.clone();
        let course = self
            .catalog
            .find(&course_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Course", course_id.as_str()))?;

        let reg = new.registration;
        let enrollment = Enrollment {
            id: generate_enrollment_id(),
            user_id: new.user_id,
            user_email: new.user_email,
            course_id: course.id.clone(),
            course_title: course.title.clone(),
            enrollment_date: Utc::now(),
            payment_reference: new.payment_reference,
            payment_amount: new.payment_amount,
            payment_method: reg.payment.payment_method,
            status: EnrollmentStatus::Active,
            course_details: CourseSnapshot {
                title: course.title.clone(),
                slug: course.slug.clone(),
                category: course.category.clone(),
                level: course.level,
                price: course.price,
                learning_goals: reg.selection.learning_goals,
                preferred_schedule: reg.selection.preferred_schedule,
            },
            personal_info: reg.personal,
            education: reg.education,
        };
        docs::save(self.store.as_ref(), collections::ENROLLMENTS, &enrollment.id, &enrollment).await?;
        tracing::info!(
            enrollment_id = %enrollment.id,
            user_id = %enrollment.user_id,
            course_id = %enrollment.course_id,
            reference = %enrollment.payment_reference,
            "enrollment written"
        );

        let actor = ActorSnapshot {
            id: enrollment.user_id.clone(),
            name: format!(
                "{} {}",
                enrollment.personal_info.first_name, enrollment.personal_info.last_name
            )
            .trim()
            .to_string(),
            email: enrollment.user_email.clone(),
        };
        self.activity
            .record_best_effort(
                NewActivity::new(ActivityKind::UserEnrolled, actor)
                    .course(CourseRef { id: course.id, title: course.title })
                    .metadata(json!({
                        "enrollmentId": enrollment.id,
                        "paymentReference": enrollment.payment_reference,
                        "amount": enrollment.payment_amount,
                    })),
            )
            .await;

        Ok(enrollment)
    }

    /// The user's enrollments, newest first.
    pub async fn for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>> {
        let query = Query::collection(collections::ENROLLMENTS).where_eq("userId", user_id.as_str());
        let docs = self.store.query(&query).await?;
        let mut enrollments: Vec<Enrollment> = docs::decode_all(collections::ENROLLMENTS, docs);
        enrollments.sort_by(|a, b| b.enrollment_date.cmp(&a.enrollment_date));
        Ok(enrollments)
    }

    /// The enrollment already written for a payment, if any.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Enrollment>> {
        let query = Query::collection(collections::ENROLLMENTS)
            .where_eq("paymentReference", reference)
            .limit(1);
        let docs = self.store.query(&query).await?;
        Ok(docs::decode_all(collections::ENROLLMENTS, docs).into_iter().next())
    }
}
