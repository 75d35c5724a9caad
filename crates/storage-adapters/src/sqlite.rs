//! # SqliteDocumentStore
//!
//! Maps the schemaless document model onto a single SQLite table, with
//! bodies stored as JSON text and filters evaluated by `json_extract`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use domains::{
    Direction, Document, DocumentStore, DomainError, Query, Result, WriteBatch, WriteOp,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};

use crate::ops::apply_array_op;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

fn storage_err(err: sqlx::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

/// `$.field` path for `json_extract`; only plain identifiers are accepted.
fn json_path(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DomainError::Validation(format!("unsupported field name {field:?}")));
    }
    Ok(format!("$.{field}"))
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `url` and runs migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage_err)?
            .create_if_missing(true);
        // Each in-memory connection is its own database, so keep just one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))?;

        tracing::info!(url, "document store ready");
        Ok(Self { pool })
    }

    async fn load_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(storage_err)?;
        row.map(|r| serde_json::from_str(&r.get::<String, _>("body")).map_err(DomainError::from))
            .transpose()
    }

    async fn upsert_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(serde_json::to_string(data)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn array_op_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
        field: &str,
        value: &Value,
        union: bool,
    ) -> Result<()> {
        let mut doc = Self::load_in_tx(tx, collection, id)
            .await?
            .ok_or_else(|| DomainError::not_found("document", format!("{collection}/{id}")))?;
        apply_array_op(&mut doc, field, value, union)?;
        Self::upsert_in_tx(tx, collection, id, &doc).await
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(|r| serde_json::from_str(&r.get::<String, _>("body")).map_err(DomainError::from))
            .transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        let mut paths = Vec::with_capacity(query.filters.len());
        for (field, value) in &query.filters {
            let path = json_path(field)?;
            match value {
                Value::Null => sql.push_str(" AND json_extract(body, ?) IS NULL"),
                Value::Array(_) | Value::Object(_) => {
                    return Err(DomainError::Validation(format!(
                        "cannot filter {field:?} on a composite value"
                    )))
                }
                _ => sql.push_str(" AND json_extract(body, ?) = ?"),
            }
            paths.push(path);
        }
        let order_path = match &query.order_by {
            Some((field, direction)) => {
                let dir = match direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                sql.push_str(&format!(" ORDER BY json_extract(body, ?) {dir}, id ASC"));
                Some(json_path(field)?)
            }
            None => {
                sql.push_str(" ORDER BY id ASC");
                None
            }
        };
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(query.collection.as_str());
        for ((_, value), path) in query.filters.iter().zip(&paths) {
            q = q.bind(path.clone());
            q = match value {
                Value::Null => q,
                Value::Bool(b) => q.bind(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => q.bind(i),
                    None => q.bind(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => q.bind(s.clone()),
                Value::Array(_) | Value::Object(_) => q,
            };
        }
        if let Some(path) = order_path {
            q = q.bind(path);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.into_iter()
            .map(|row| -> Result<Document> {
                Ok(Document {
                    id: row.get("id"),
                    data: serde_json::from_str(&row.get::<String, _>("body"))?,
                })
            })
            .collect()
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        Self::upsert_in_tx(&mut tx, collection, id, &data).await?;
        tx.commit().await.map_err(storage_err)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All ops run inside one transaction; dropping `tx` on error rolls
    /// everything back.
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for op in &batch.ops {
            match op {
                WriteOp::Set { collection, id, data } => {
                    Self::upsert_in_tx(&mut tx, collection, id, data).await?;
                }
                WriteOp::Delete { collection, id } => {
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(collection)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage_err)?;
                }
                WriteOp::ArrayUnion { collection, id, field, value } => {
                    Self::array_op_in_tx(&mut tx, collection, id, field, value, true).await?;
                }
                WriteOp::ArrayRemove { collection, id, field, value } => {
                    Self::array_op_in_tx(&mut tx, collection, id, field, value, false).await?;
                }
            }
        }
        tx.commit().await.map_err(storage_err)
    }

    async fn shutdown(&self) {
        self.pool.close().await;
        tracing::info!("document store closed");
    }
}
