//! In-process implementations of the storage ports. Used for development,
//! mock-mode demos and tests; nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use domains::{
    Direction, Document, DocumentStore, DomainError, MediaStorage, Query, Result, StoredObject,
    WriteBatch, WriteOp,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ops::{apply_array_op, compare_fields, field_matches};
use crate::{object_key, sanitize_segment};

type Key = (String, String);

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<Key, Value>,
    /// Serializes writers so a batch is never interleaved with another write.
    write_lock: Mutex<()>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.docs.iter().filter(|e| e.key().0 == collection).count()
    }

    fn key(collection: &str, id: &str) -> Key {
        (collection.to_string(), id.to_string())
    }

    /// Current value of `key` as seen through the uncommitted overlay.
    fn staged(&self, overlay: &HashMap<Key, Option<Value>>, key: &Key) -> Option<Value> {
        match overlay.get(key) {
            Some(staged) => staged.clone(),
            None => self.docs.get(key).map(|v| v.value().clone()),
        }
    }

    fn stage_array_op(
        &self,
        overlay: &mut HashMap<Key, Option<Value>>,
        key: Key,
        field: &str,
        value: &Value,
        union: bool,
    ) -> Result<()> {
        let mut doc = self
            .staged(overlay, &key)
            .ok_or_else(|| DomainError::not_found("document", format!("{}/{}", key.0, key.1)))?;
        apply_array_op(&mut doc, field, value, union)?;
        overlay.insert(key, Some(doc));
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.docs.get(&Self::key(collection, id)).map(|v| v.value().clone()))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut matches: Vec<Document> = self
            .docs
            .iter()
            .filter(|e| e.key().0 == query.collection)
            .filter(|e| {
                query
                    .filters
                    .iter()
                    .all(|(field, expected)| field_matches(e.value(), field, expected))
            })
            .map(|e| Document { id: e.key().1.clone(), data: e.value().clone() })
            .collect();

        // Stable base order so results do not depend on hash iteration.
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some((field, direction)) = &query.order_by {
            matches.sort_by(|a, b| {
                let ord = compare_fields(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.docs.insert(Self::key(collection, id), data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.docs.remove(&Self::key(collection, id));
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        // Resolve the whole batch against a private overlay first; nothing
        // touches `docs` until every op has succeeded.
        let mut overlay: HashMap<Key, Option<Value>> = HashMap::new();
        for op in batch.ops {
            match op {
                WriteOp::Set { collection, id, data } => {
                    overlay.insert((collection, id), Some(data));
                }
                WriteOp::Delete { collection, id } => {
                    overlay.insert((collection, id), None);
                }
                WriteOp::ArrayUnion { collection, id, field, value } => {
                    self.stage_array_op(&mut overlay, (collection, id), &field, &value, true)?;
                }
                WriteOp::ArrayRemove { collection, id, field, value } => {
                    self.stage_array_op(&mut overlay, (collection, id), &field, &value, false)?;
                }
            }
        }

        for (key, value) in overlay {
            match value {
                Some(doc) => {
                    self.docs.insert(key, doc);
                }
                None => {
                    self.docs.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Object storage held in memory; URLs point at `url_prefix` but nothing
/// serves them.
pub struct MemoryMediaStorage {
    url_prefix: String,
    objects: DashMap<String, (String, Bytes)>,
}

impl MemoryMediaStorage {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Content type and bytes of a stored object.
    pub fn object(&self, key: &str) -> Option<(String, Bytes)> {
        self.objects.get(key).map(|e| e.value().clone())
    }
}

#[async_trait]
impl MediaStorage for MemoryMediaStorage {
    async fn save(
        &self,
        owner: &str,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject> {
        let owner = sanitize_segment(owner)?;
        let key = object_key(&owner, file_name, content_type, &data);
        self.objects.insert(key.clone(), (content_type.to_string(), data));
        Ok(StoredObject { url: format!("{}/{}", self.url_prefix, key), key })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.remove(key);
        Ok(())
    }
}
