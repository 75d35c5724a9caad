//! # Activity feed
//!
//! Append-only audit log behind the admin dashboard. Every record refreshes
//! a `watch` snapshot of the most recent entries, which the streaming
//! endpoint subscribes to.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    collections, Activity, ActivityKind, ActorSnapshot, CourseRef, Direction, DocumentStore,
    Query, Result,
};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::docs;

pub struct ActivityFeed {
    store: Arc<dyn DocumentStore>,
    limit: usize,
    snapshot: watch::Sender<Vec<Activity>>,
}

/// What to record; id and timestamp are assigned on write.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub actor: ActorSnapshot,
    pub course: Option<CourseRef>,
    pub metadata: Value,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, actor: ActorSnapshot) -> Self {
        Self { kind, actor, course: None, metadata: Value::Object(Default::default()) }
    }

    pub fn course(mut self, course: CourseRef) -> Self {
        self.course = Some(course);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl ActivityFeed {
    /// `limit` caps both the live snapshot and any `recent` call.
    pub fn new(store: Arc<dyn DocumentStore>, limit: usize) -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self { store, limit: limit.max(1), snapshot }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn record(&self, entry: NewActivity) -> Result<Activity> {
        let activity = Activity {
            id: Uuid::now_v7().to_string(),
            kind: entry.kind,
            actor: entry.actor,
            course: entry.course,
            timestamp: Utc::now(),
            metadata: entry.metadata,
        };
        docs::save(self.store.as_ref(), collections::ACTIVITIES, &activity.id, &activity).await?;
        tracing::info!(kind = ?activity.kind, id = %activity.id, "activity recorded");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "activity snapshot refresh failed");
        }
        Ok(activity)
    }

    /// For audit writes that must never fail the surrounding operation.
    pub async fn record_best_effort(&self, entry: NewActivity) {
        let kind = entry.kind;
        if let Err(e) = self.record(entry).await {
            tracing::warn!(?kind, error = %e, "failed to record activity");
        }
    }

    /// Newest first, at most `min(limit, feed limit)` entries.
    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<Activity>> {
        let limit = limit.unwrap_or(self.limit).clamp(1, self.limit);
        let query = Query::collection(collections::ACTIVITIES)
            .order_by("timestamp", Direction::Descending)
            .limit(limit);
        let docs = self.store.query(&query).await?;
        Ok(docs::decode_all(collections::ACTIVITIES, docs))
    }

    /// Reloads the live snapshot from the store.
    pub async fn refresh(&self) -> Result<()> {
        let latest = self.recent(None).await?;
        self.snapshot.send_replace(latest);
        Ok(())
    }

    /// Live view of the most recent entries. The current value is whatever
    /// the last refresh saw.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Activity>> {
        self.snapshot.subscribe()
    }
}
