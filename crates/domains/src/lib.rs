//! # domains
//!
//! Entities, errors and port traits for the course marketplace. This crate
//! performs no I/O; adapters implement the ports and services orchestrate
//! them.

pub mod error;
pub mod models;
pub mod ports;

pub use error::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_batch_keeps_op_order() {
        let batch = WriteBatch::new()
            .array_union(collections::USERS, "u1", "certificates", json!({ "id": "c1" }))
            .unwrap()
            .set(collections::CERTIFICATES, "c1", json!({ "id": "c1" }))
            .unwrap()
            .delete(collections::CHECKOUT_STAGING, "ref");
        assert_eq!(batch.ops.len(), 3);
        assert!(matches!(batch.ops[0], WriteOp::ArrayUnion { .. }));
        assert!(matches!(batch.ops[2], WriteOp::Delete { .. }));
    }

    #[test]
    fn enrollment_round_trips_through_json() {
        let doc = json!({
            "id": "ENR-1",
            "userId": "u1",
            "userEmail": "u1@example.com",
            "courseId": 7,
            "courseTitle": "Rust 101",
            "enrollmentDate": "2026-01-02T03:04:05Z",
            "paymentReference": "FREE-1",
            "paymentAmount": 0.0,
            "paymentMethod": "card",
            "personalInfo": { "firstName": "A", "lastName": "B", "email": "u1@example.com" },
            "education": { "highestEducation": "bachelor" },
            "courseDetails": {
                "title": "Rust 101", "slug": "rust-101", "category": "dev",
                "level": "Beginner", "price": 0.0, "learningGoals": "learn"
            }
        });
        let enrollment: Enrollment = serde_json::from_value(doc).unwrap();
        assert_eq!(enrollment.course_id, CourseId::new("7"));
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
    }
}
