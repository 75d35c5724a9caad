use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CourseId, UserId};

/// The closed set of events the admin dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    CertificateIssued,
    UserRegistered,
    CourseCreated,
    UserEnrolled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub id: CourseId,
    pub title: String,
}

/// Append-only audit entry (`activities` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub actor: ActorSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseRef>,
    /// Milliseconds since the epoch so the store can order numerically.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// How one activity is shown in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPresentation {
    pub icon: &'static str,
    pub message: String,
}

impl Activity {
    pub fn presentation(&self) -> ActivityPresentation {
        let who = if self.actor.name.is_empty() {
            self.actor.email.as_str()
        } else {
            self.actor.name.as_str()
        };
        let course = self
            .course
            .as_ref()
            .map(|c| c.title.as_str())
            .unwrap_or("a course");

        match self.kind {
            ActivityKind::CertificateIssued => ActivityPresentation {
                icon: "award",
                message: format!("Certificate issued to {who} for {course}"),
            },
            ActivityKind::UserRegistered => ActivityPresentation {
                icon: "user-plus",
                message: format!("{who} joined the platform"),
            },
            ActivityKind::CourseCreated => ActivityPresentation {
                icon: "book-open",
                message: format!("{who} created {course}"),
            },
            ActivityKind::UserEnrolled => ActivityPresentation {
                icon: "graduation-cap",
                message: format!("{who} enrolled in {course}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(kind: ActivityKind) -> Activity {
        Activity {
            id: "a1".into(),
            kind,
            actor: ActorSnapshot {
                id: UserId::new("u1"),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
            course: Some(CourseRef { id: CourseId::new("c1"), title: "Rust 101".into() }),
            timestamp: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn kind_serializes_as_type_tag() {
        let json = serde_json::to_value(activity(ActivityKind::CertificateIssued)).unwrap();
        assert_eq!(json["type"], "CERTIFICATE_ISSUED");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn presentation_names_actor_and_course() {
        let p = activity(ActivityKind::UserEnrolled).presentation();
        assert_eq!(p.icon, "graduation-cap");
        assert_eq!(p.message, "Ada enrolled in Rust 101");
    }

    #[test]
    fn presentation_falls_back_to_email() {
        let mut a = activity(ActivityKind::UserRegistered);
        a.actor.name.clear();
        assert_eq!(a.presentation().message, "ada@example.com joined the platform");
    }
}
