use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CourseId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    #[default]
    Issued,
    Revoked,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    #[serde(default)]
    pub course_title: String,
    pub issue_date: DateTime<Utc>,
    pub file_url: String,
    /// Object-storage key of the uploaded artifact.
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub status: CertificateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    pub issued_by: UserId,
}
