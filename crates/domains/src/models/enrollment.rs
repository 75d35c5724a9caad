use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::course::CourseLevel;
use super::ids::{CourseId, UserId};
use super::registration::{EducationInfo, PersonalInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

/// Course fields copied into the enrollment at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSnapshot {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub level: CourseLevel,
    pub price: f64,
    pub learning_goals: String,
    #[serde(default)]
    pub preferred_schedule: String,
}

/// Denormalized enrollment document (`enrollments` collection).
///
/// Written once per confirmed payment. Nothing in this service moves the
/// status out of `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub user_id: UserId,
    pub user_email: String,
    pub course_id: CourseId,
    pub course_title: String,
    pub enrollment_date: DateTime<Utc>,
    pub payment_reference: String,
    pub payment_amount: f64,
    pub payment_method: String,
    #[serde(default)]
    pub status: EnrollmentStatus,
    pub personal_info: PersonalInfo,
    pub education: EducationInfo,
    pub course_details: CourseSnapshot,
}
