//! Fixtures shared by the unit tests.

use domains::{CourseId, CourseSelection, EducationInfo, PaymentChoice, PersonalInfo};

use crate::registration::CompletedRegistration;

pub(crate) fn registration(course_id: &str) -> CompletedRegistration {
    CompletedRegistration {
        personal: PersonalInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: String::new(),
        },
        education: EducationInfo {
            highest_education: "Masters".into(),
            field_of_study: "Mathematics".into(),
            current_occupation: String::new(),
            years_of_experience: "5".into(),
        },
        selection: CourseSelection {
            course_id: CourseId::new(course_id),
            learning_goals: "Analytical engines".into(),
            preferred_schedule: "weekends".into(),
        },
        payment: PaymentChoice { payment_method: "card".into() },
    }
}
