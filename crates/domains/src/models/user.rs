use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use super::ids::UserId;

/// Caller identity as asserted by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Profile document (`users` collection), keyed by the identity subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    /// Free-form role string; compared case-insensitively.
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    "student".to_string()
}

impl UserProfile {
    /// Role matches exactly, ignoring case only.
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }

    pub fn is_student(&self) -> bool {
        self.role.eq_ignore_ascii_case("student")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: &str) -> UserProfile {
        UserProfile {
            id: UserId::new("u1"),
            email: "u1@example.com".into(),
            display_name: String::new(),
            role: role.into(),
            certificates: vec![],
            created_at: None,
        }
    }

    #[test]
    fn roles_compare_case_insensitively() {
        assert!(profile("Student").is_student());
        assert!(profile("STUDENT").is_student());
        assert!(profile("Admin").is_admin());
        assert!(!profile("students").is_student());
        assert!(!profile(" student ").is_student());
        assert!(!profile("admin ").is_admin());
    }

    #[test]
    fn missing_role_defaults_to_student() {
        let p: UserProfile =
            serde_json::from_value(serde_json::json!({ "id": "u2", "email": "a@b.co" })).unwrap();
        assert!(p.is_student());
    }
}
