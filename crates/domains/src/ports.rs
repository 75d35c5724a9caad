//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Every handle is constructed explicitly at startup and passed down as
//! `Arc<dyn Trait>`; nothing here is a process-wide singleton.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::Identity;

/// A schemaless document with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered, optionally ordered and limited collection scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Top-level field equality filters, ANDed together.
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { collection: String, id: String, data: Value },
    Delete { collection: String, id: String },
    /// Appends `value` to the array at `field` unless an equal element exists.
    /// Fails if the document does not exist.
    ArrayUnion { collection: String, id: String, field: String, value: Value },
    /// Removes every element equal to `value` from the array at `field`.
    ArrayRemove { collection: String, id: String, field: String, value: Value },
}

/// A set of writes applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, collection: &str, id: &str, data: impl Serialize) -> Result<Self> {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data: serde_json::to_value(data)?,
        });
        Ok(self)
    }

    pub fn delete(mut self, collection: &str, id: &str) -> Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn array_union(
        mut self,
        collection: &str,
        id: &str,
        field: &str,
        value: impl Serialize,
    ) -> Result<Self> {
        self.ops.push(WriteOp::ArrayUnion {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    pub fn array_remove(
        mut self,
        collection: &str,
        id: &str,
        field: &str,
        value: impl Serialize,
    ) -> Result<Self> {
        self.ops.push(WriteOp::ArrayRemove {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Document persistence contract (courses, users, enrollments, ...).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()>;
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
    /// Applies every op or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
    /// Releases pooled connections. Called once by the binary on exit.
    async fn shutdown(&self) {}
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Storage key, usable with [`MediaStorage::delete`].
    pub key: String,
    /// Public URL the browser can fetch.
    pub url: String,
}

/// Object storage contract for certificate artifacts and course images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores `data` under the per-owner prefix and returns its location.
    async fn save(
        &self,
        owner: &str,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Prefix carried by every simulated (mock-mode) transaction reference.
pub const MOCK_REFERENCE_PREFIX: &str = "MOCK-";

pub fn is_mock_reference(reference: &str) -> bool {
    reference.starts_with(MOCK_REFERENCE_PREFIX)
}

/// Transaction creation request, amount already in minor units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    pub amount_minor: u64,
    pub reference: String,
    pub callback_url: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayInit {
    pub authorization_url: String,
    pub reference: String,
    /// The gateway's response body, untouched.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayVerification {
    pub success: bool,
    pub amount_minor: Option<u64>,
    pub raw: Value,
}

/// External payment processor contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &InitializeRequest) -> Result<GatewayInit>;
    async fn verify(&self, reference: &str) -> Result<GatewayVerification>;
}

/// Resolves a bearer token issued by the external identity provider.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity>;
}
