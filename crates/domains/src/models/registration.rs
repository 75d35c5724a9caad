//! Registration form data and the validated snapshots taken from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::CourseId;

/// Raw wizard input. Every field is free text until validated; empty means
/// "not provided".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationFormData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub highest_education: String,
    pub field_of_study: String,
    pub current_occupation: String,
    pub years_of_experience: String,
    pub selected_course_id: String,
    pub learning_goals: String,
    pub preferred_schedule: String,
    pub payment_method: String,
    pub agree_to_terms: bool,
}

/// Field names as they appear in error maps and JSON payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Phone,
    HighestEducation,
    FieldOfStudy,
    CurrentOccupation,
    YearsOfExperience,
    SelectedCourseId,
    LearningGoals,
    PreferredSchedule,
    PaymentMethod,
    AgreeToTerms,
}

impl FormField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::HighestEducation => "highestEducation",
            Self::FieldOfStudy => "fieldOfStudy",
            Self::CurrentOccupation => "currentOccupation",
            Self::YearsOfExperience => "yearsOfExperience",
            Self::SelectedCourseId => "selectedCourseId",
            Self::LearningGoals => "learningGoals",
            Self::PreferredSchedule => "preferredSchedule",
            Self::PaymentMethod => "paymentMethod",
            Self::AgreeToTerms => "agreeToTerms",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationInfo {
    pub highest_education: String,
    #[serde(default)]
    pub field_of_study: String,
    #[serde(default)]
    pub current_occupation: String,
    #[serde(default)]
    pub years_of_experience: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSelection {
    pub course_id: CourseId,
    pub learning_goals: String,
    #[serde(default)]
    pub preferred_schedule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChoice {
    pub payment_method: String,
}
