use std::sync::Arc;

use chrono::Utc;
use domains::{
    collections, ActivityKind, ActorSnapshot, DocumentStore, DomainError, Identity, Query, Result,
    UserId, UserProfile,
};

use crate::activity::{ActivityFeed, NewActivity};
use crate::docs;

/// Profile documents in the `users` collection.
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    activity: Arc<ActivityFeed>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, activity: Arc<ActivityFeed>) -> Self {
        Self { store, activity }
    }

    pub async fn get(&self, id: &UserId) -> Result<Option<UserProfile>> {
        docs::load(self.store.as_ref(), collections::USERS, id.as_str()).await
    }

    pub async fn require(&self, id: &UserId) -> Result<UserProfile> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id.as_str()))
    }

    /// Returns the caller's profile, creating a student profile on first
    /// sight and logging the registration.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<UserProfile> {
        if let Some(existing) = self.get(&identity.user_id).await? {
            return Ok(existing);
        }

        let profile = UserProfile {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
            display_name: identity.name.clone().unwrap_or_default(),
            role: "student".into(),
            certificates: Vec::new(),
            created_at: Some(Utc::now()),
        };
        docs::save(self.store.as_ref(), collections::USERS, profile.id.as_str(), &profile).await?;
        tracing::info!(user_id = %profile.id, "profile created");

        self.activity
            .record_best_effort(NewActivity::new(ActivityKind::UserRegistered, actor_of(&profile)))
            .await;
        Ok(profile)
    }

    /// Resolves the caller's profile and requires the admin role.
    pub async fn require_admin(&self, identity: &Identity) -> Result<UserProfile> {
        match self.get(&identity.user_id).await? {
            Some(profile) if profile.is_admin() => Ok(profile),
            _ => Err(DomainError::Forbidden("admin role required".into())),
        }
    }

    /// Every profile whose role is `student`, any case.
    pub async fn list_students(&self) -> Result<Vec<UserProfile>> {
        let docs = self.store.query(&Query::collection(collections::USERS)).await?;
        let mut students: Vec<UserProfile> = docs::decode_all(collections::USERS, docs)
            .into_iter()
            .filter(UserProfile::is_student)
            .collect();
        students.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(students)
    }
}

pub fn actor_of(profile: &UserProfile) -> ActorSnapshot {
    ActorSnapshot {
        id: profile.id.clone(),
        name: profile.display_name.clone(),
        email: profile.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storage_adapters::MemoryDocumentStore;

    fn directory() -> (Arc<MemoryDocumentStore>, UserDirectory) {
        let store = Arc::new(MemoryDocumentStore::new());
        let activity = Arc::new(ActivityFeed::new(store.clone(), 10));
        (store.clone(), UserDirectory::new(store, activity))
    }

    fn identity(id: &str) -> Identity {
        Identity { user_id: UserId::new(id), email: format!("{id}@example.com"), name: None }
    }

    #[tokio::test]
    async fn ensure_profile_creates_once() {
        let (store, users) = directory();
        let first = users.ensure_profile(&identity("u1")).await.unwrap();
        assert!(first.is_student());
        let again = users.ensure_profile(&identity("u1")).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.count(collections::ACTIVITIES), 1);
    }

    #[tokio::test]
    async fn students_filter_is_case_insensitive() {
        let (store, users) = directory();
        for (id, role) in [("a", "Student"), ("b", "admin"), ("c", " student ")] {
            store
                .set(collections::USERS, id, json!({ "id": id, "email": format!("{id}@x.io"), "role": role }))
                .await
                .unwrap();
        }
        let ids: Vec<_> = users
            .list_students()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn require_admin_rejects_students_and_strangers() {
        let (store, users) = directory();
        store
            .set(collections::USERS, "boss", json!({ "id": "boss", "email": "b@x.io", "role": "ADMIN" }))
            .await
            .unwrap();
        users.ensure_profile(&identity("s1")).await.unwrap();

        assert!(users.require_admin(&identity("boss")).await.is_ok());
        assert!(matches!(users.require_admin(&identity("s1")).await, Err(DomainError::Forbidden(_))));
        assert!(matches!(users.require_admin(&identity("nobody")).await, Err(DomainError::Forbidden(_))));
    }
}
