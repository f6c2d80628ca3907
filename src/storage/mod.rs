//! Document store contract.
//!
//! A container holds one JSON document per identity. Every write stamps the
//! document with a fresh entity tag; conditional operations compare that tag
//! and write in one indivisible step. Outcomes the caller is expected to act
//! on (missing document, stale tag, unchanged document) come back as
//! [`StoreOutcome`] variants, while infrastructure failures are errors.

mod sqlite_store;

pub use sqlite_store::{is_valid_container_name, SqliteContainer};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::ETag;
use crate::error::{AppointmentError, Result};

/// Field names the store owns inside a persisted document.
pub mod fields {
    pub const ID: &str = "id";
    pub const RESOURCE_ID: &str = "_rid";
    pub const ETAG: &str = "_etag";
    pub const TIMESTAMP: &str = "_ts";

    pub const ALL: [&str; 4] = [ID, RESOURCE_ID, ETAG, TIMESTAMP];
}

/// Precondition attached to a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Condition {
    #[default]
    None,
    /// Proceed only if the stored tag equals this one.
    IfMatch(ETag),
    /// Report [`StoreOutcome::NotModified`] if the stored tag equals this one.
    IfNoneMatch(ETag),
}

/// Result of a store operation that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome<T> {
    Ok(T),
    NotFound,
    PreconditionFailed,
    NotModified,
}

impl<T> StoreOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreOutcome<U> {
        match self {
            StoreOutcome::Ok(value) => StoreOutcome::Ok(f(value)),
            StoreOutcome::NotFound => StoreOutcome::NotFound,
            StoreOutcome::PreconditionFailed => StoreOutcome::PreconditionFailed,
            StoreOutcome::NotModified => StoreOutcome::NotModified,
        }
    }
}

/// A document as held by the store: the caller's body plus the fields the
/// store manages.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: Uuid,
    pub resource_id: String,
    pub etag: ETag,
    /// Last successful write, Unix seconds.
    pub timestamp: i64,
    pub body: Map<String, Value>,
}

impl StoredDocument {
    /// The full persisted document: business fields merged with `id`,
    /// `_rid`, `_etag` and `_ts`.
    pub fn to_document(&self) -> Value {
        let mut doc = self.body.clone();
        doc.insert(fields::ID.to_string(), Value::String(self.id.to_string()));
        doc.insert(
            fields::RESOURCE_ID.to_string(),
            Value::String(self.resource_id.clone()),
        );
        doc.insert(
            fields::ETAG.to_string(),
            Value::String(self.etag.as_str().to_string()),
        );
        doc.insert(fields::TIMESTAMP.to_string(), Value::from(self.timestamp));
        Value::Object(doc)
    }
}

/// One page of a container scan.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<StoredDocument>,
    /// Where the next page starts; `None` once the scan is exhausted.
    pub continuation: Option<String>,
}

/// Strip store-managed fields from a body supplied by a writer.
///
/// Non-object bodies are rejected because the store keys fields by name.
pub fn into_body(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(mut map) => {
            for field in fields::ALL {
                map.remove(field);
            }
            Ok(map)
        }
        other => Err(AppointmentError::Storage(format!(
            "documents must be JSON objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single logical collection of JSON documents keyed by identity.
///
/// Implementations must make every conditional write a single atomic
/// compare-and-write. `cancel` aborts the call; a canceled write must leave
/// the container untouched and return [`AppointmentError::Canceled`].
#[async_trait]
pub trait DocumentContainer: Send + Sync {
    async fn read(
        &self,
        id: Uuid,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>>;

    /// Insert a new document. `PreconditionFailed` if the id is taken.
    async fn create(
        &self,
        id: Uuid,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>>;

    /// Insert or overwrite.
    async fn upsert(
        &self,
        id: Uuid,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>>;

    /// Overwrite an existing document. `NotFound` if absent.
    async fn replace(
        &self,
        id: Uuid,
        body: Value,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>>;

    async fn delete(
        &self,
        id: Uuid,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<()>>;

    /// Read up to `max_items` documents starting at `continuation`.
    async fn read_page(
        &self,
        continuation: Option<&str>,
        max_items: usize,
        cancel: &CancellationToken,
    ) -> Result<DocumentPage>;
}
