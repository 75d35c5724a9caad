//! # Certificate issuance
//!
//! Issuing is a two-phase saga:
//!
//! 1. upload the artifact to object storage (retried with linear backoff);
//! 2. commit one [`WriteBatch`] that appends to the student's profile,
//!    appends to the course's issued list and writes the certificate
//!    document.
//!
//! If step 2 fails the uploaded object is deleted again, so no artifact is
//! left without a record.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use domains::{
    collections, ActivityKind, Certificate, CertificateStatus, Course, CourseId,
    CourseRef, DocumentStore, DomainError, IssuedCertificate, MediaStorage, Query, Result,
    StoredObject, UserId, UserProfile, WriteBatch,
};
use serde_json::json;
use uuid::Uuid;

use crate::activity::{ActivityFeed, NewActivity};
use crate::catalog::CatalogReader;
use crate::docs;
use crate::enrollment::EnrollmentWriter;
use crate::retry::{retry_with_linear_backoff, RetryPolicy};
use crate::users::{actor_of, UserDirectory};

/// An uploaded certificate file.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Admin form state: student, course and file, each optional until chosen.
#[derive(Debug, Clone, Default)]
pub struct CertificateDraft {
    pub student_id: Option<UserId>,
    pub course_id: Option<CourseId>,
    pub file: Option<CertificateUpload>,
    pub verification_code: Option<String>,
}

/// A draft with every required part present.
#[derive(Debug, Clone)]
pub struct IssueCertificate {
    pub student_id: UserId,
    pub course_id: CourseId,
    pub file: CertificateUpload,
    pub verification_code: Option<String>,
}

impl CertificateDraft {
    /// Names of the required parts still missing, in form order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.student_id.as_ref().map_or(true, |s| s.as_str().trim().is_empty()) {
            missing.push("studentId");
        }
        if self.course_id.as_ref().map_or(true, CourseId::is_empty) {
            missing.push("courseId");
        }
        if self.file.as_ref().map_or(true, |f| f.data.is_empty()) {
            missing.push("file");
        }
        missing
    }

    /// True exactly when student, course and a non-empty file are present.
    pub fn is_ready(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn ready(self) -> Result<IssueCertificate> {
        let missing = self.missing();
        match (self.student_id, self.course_id, self.file) {
            (Some(student_id), Some(course_id), Some(file)) if missing.is_empty() => {
                Ok(IssueCertificate {
                    student_id,
                    course_id,
                    file,
                    verification_code: self
                        .verification_code
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty()),
                })
            }
            _ => Err(DomainError::Validation(format!(
                "certificate is missing: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Compensating actions registered as the saga progresses, undone in
/// reverse order.
#[derive(Default)]
struct Compensations {
    uploaded: Vec<String>,
}

impl Compensations {
    fn uploaded(&mut self, key: &str) {
        self.uploaded.push(key.to_string());
    }

    async fn run(self, media: &dyn MediaStorage) {
        for key in self.uploaded.into_iter().rev() {
            match media.delete(&key).await {
                Ok(()) => tracing::info!(%key, "compensated: uploaded certificate removed"),
                Err(e) => tracing::error!(%key, error = %e, "orphaned certificate object, remove manually"),
            }
        }
    }
}

pub struct CertificateIssuer {
    store: Arc<dyn DocumentStore>,
    media: Arc<dyn MediaStorage>,
    users: Arc<UserDirectory>,
    catalog: Arc<CatalogReader>,
    enrollments: Arc<EnrollmentWriter>,
    activity: Arc<ActivityFeed>,
    upload_policy: RetryPolicy,
}

impl CertificateIssuer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaStorage>,
        users: Arc<UserDirectory>,
        catalog: Arc<CatalogReader>,
        enrollments: Arc<EnrollmentWriter>,
        activity: Arc<ActivityFeed>,
        upload_policy: RetryPolicy,
    ) -> Self {
        Self { store, media, users, catalog, enrollments, activity, upload_policy }
    }

    async fn require_student(&self, id: &UserId) -> Result<UserProfile> {
        let profile = self.users.require(id).await?;
        if !profile.is_student() {
            return Err(DomainError::Validation(format!("user {id} is not a student")));
        }
        Ok(profile)
    }

    /// Courses the student is enrolled in. Enrollment course ids are
    /// compared as strings, so numeric legacy ids still match.
    pub async fn eligible_courses(&self, student_id: &UserId) -> Result<Vec<Course>> {
        self.require_student(student_id).await?;
        let enrolled: Vec<CourseId> = self
            .enrollments
            .for_user(student_id)
            .await?
            .into_iter()
            .map(|e| e.course_id)
            .collect();
        Ok(self
            .catalog
            .all()
            .await?
            .into_iter()
            .filter(|c| enrolled.iter().any(|id| id.as_str() == c.id.as_str()))
            .collect())
    }

    async fn upload(&self, student: &UserId, file: &CertificateUpload) -> Result<StoredObject> {
        retry_with_linear_backoff(self.upload_policy, "certificate upload", |_| {
            self.media
                .save(student.as_str(), &file.file_name, &file.content_type, file.data.clone())
        })
        .await
    }

    pub async fn issue(&self, admin: &UserProfile, request: IssueCertificate) -> Result<Certificate> {
        if !admin.is_admin() {
            return Err(DomainError::Forbidden("admin role required".into()));
        }
        let student = self.require_student(&request.student_id).await?;
        let course = self
            .eligible_courses(&student.id)
            .await?
            .into_iter()
            .find(|c| c.id == request.course_id)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "student {} is not enrolled in course {}",
                    student.id, request.course_id
                ))
            })?;

        let mut compensations = Compensations::default();
        let stored = self.upload(&student.id, &request.file).await?;
        compensations.uploaded(&stored.key);

        let certificate = Certificate {
            id: Uuid::now_v7().to_string(),
            user_id: student.id.clone(),
            course_id: course.id.clone(),
            course_title: course.title.clone(),
            issue_date: Utc::now(),
            file_url: stored.url,
            file_path: stored.key,
            status: CertificateStatus::Issued,
            verification_code: request.verification_code,
            issued_by: admin.id.clone(),
        };
        let summary = IssuedCertificate {
            certificate_id: certificate.id.clone(),
            user_id: student.id.clone(),
            issue_date: certificate.issue_date,
        };

        let committed = async {
            let batch = WriteBatch::new()
                .array_union(collections::USERS, student.id.as_str(), "certificates", &certificate)?
                .array_union(collections::COURSES, course.id.as_str(), "issuedCertificates", &summary)?
                .set(collections::CERTIFICATES, &certificate.id, &certificate)?;
            self.store.commit(batch).await
        }
        .await;
        if let Err(e) = committed {
            tracing::error!(certificate_id = %certificate.id, error = %e, "certificate records not written, rolling back upload");
            compensations.run(self.media.as_ref()).await;
            return Err(e);
        }
        tracing::info!(
            certificate_id = %certificate.id,
            student_id = %student.id,
            course_id = %course.id,
            "certificate issued"
        );

        self.activity
            .record_best_effort(
                NewActivity::new(ActivityKind::CertificateIssued, actor_of(&student))
                    .course(CourseRef { id: course.id, title: course.title })
                    .metadata(json!({
                        "certificateId": certificate.id,
                        "issuedBy": actor_of(admin),
                    })),
            )
            .await;
        Ok(certificate)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Certificate>> {
        docs::load(self.store.as_ref(), collections::CERTIFICATES, id).await
    }

    /// The user's certificates, newest first.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>> {
        let query = Query::collection(collections::CERTIFICATES).where_eq("userId", user_id.as_str());
        let docs = self.store.query(&query).await?;
        let mut certificates: Vec<Certificate> = docs::decode_all(collections::CERTIFICATES, docs);
        certificates.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
        Ok(certificates)
    }

    /// Where `requester` may fetch certificate `id` from. Owners and admins
    /// only; revoked or file-less certificates are unavailable.
    pub async fn download_url(&self, requester: &UserProfile, id: &str) -> Result<String> {
        let certificate = self
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Certificate", id))?;
        if certificate.user_id != requester.id && !requester.is_admin() {
            return Err(DomainError::Forbidden("certificate belongs to another user".into()));
        }
        if certificate.status != CertificateStatus::Issued || certificate.file_url.trim().is_empty() {
            return Err(DomainError::not_found("Certificate file", id));
        }
        Ok(certificate.file_url)
    }
}
