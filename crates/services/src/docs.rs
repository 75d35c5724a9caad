//! Typed reads and writes over the schemaless [`DocumentStore`].

use domains::{Document, DocumentStore, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub(crate) async fn save<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    value: &T,
) -> Result<()> {
    store.set(collection, id, serde_json::to_value(value)?).await
}

/// Decodes every document, skipping the ones that do not fit `T`.
/// Collections are written by other tools too, so one bad row must not
/// take a whole listing down.
pub(crate) fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value(doc.data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%collection, id = %doc.id, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}
