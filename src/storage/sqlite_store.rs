use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{into_body, Condition, DocumentContainer, DocumentPage, StoreOutcome, StoredDocument};
use crate::entity::ETag;
use crate::error::{AppointmentError, Result};

/// Row as read from SQLite, before conversion into a [`StoredDocument`].
type RawRow = (i64, String, String, i64, String);

/// Returns true if `name` can be used verbatim as a container (table) name.
pub fn is_valid_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQLite-backed document container.
///
/// Each container is a table with one row per document. The SQLite rowid is
/// the storage-internal resource id, so it survives overwrites.
pub struct SqliteContainer {
    conn: Arc<Mutex<Connection>>,
    table: String,
    path: Option<PathBuf>,
}

impl SqliteContainer {
    /// Open or create the database file and the container table.
    pub fn open(path: &Path, container: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, container, Some(path.to_path_buf()))
    }

    /// A private in-memory database, gone when the container is dropped.
    pub fn open_in_memory(container: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, container, None)
    }

    fn with_connection(conn: Connection, container: &str, path: Option<PathBuf>) -> Result<Self> {
        if !is_valid_container_name(container) {
            return Err(AppointmentError::Config(format!(
                "invalid container name '{}'",
                container
            )));
        }

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            table: container.to_string(),
            path,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.try_lock().map_err(|_| {
            AppointmentError::Storage("container connection busy during setup".to_string())
        })?;

        // rid doubles as the scan cursor for paging
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    rid INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    etag TEXT NOT NULL,
                    ts INTEGER NOT NULL,
                    body TEXT NOT NULL
                )",
                self.table
            ),
            [],
        )?;

        Ok(())
    }

    pub fn container_name(&self) -> &str {
        &self.table
    }

    /// Database file, or `None` for an in-memory container.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str, &CancellationToken) -> Result<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(AppointmentError::Canceled);
        }

        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            if cancel.is_cancelled() {
                return Err(AppointmentError::Canceled);
            }
            op(&mut *conn, &table, &cancel)
        })
        .await?
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Commit, unless the caller gave up in the meantime.
fn commit_unless_canceled(tx: Transaction<'_>, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        tx.rollback()?;
        return Err(AppointmentError::Canceled);
    }
    tx.commit()?;
    Ok(())
}

fn condition_params(condition: &Condition) -> (Option<&str>, Option<&str>) {
    match condition {
        Condition::None => (None, None),
        Condition::IfMatch(etag) => (Some(etag.as_str()), None),
        Condition::IfNoneMatch(etag) => (None, Some(etag.as_str())),
    }
}

fn select_row(conn: &Connection, table: &str, id: &Uuid) -> Result<Option<RawRow>> {
    let row = conn
        .query_row(
            &format!("SELECT rid, id, etag, ts, body FROM {} WHERE id = ?1", table),
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    Ok(row)
}

fn exists(conn: &Connection, table: &str, id: &Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT rid FROM {} WHERE id = ?1", table),
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn to_document(row: RawRow) -> Result<StoredDocument> {
    let (rid, id, etag, ts, body) = row;
    let id = Uuid::parse_str(&id)
        .map_err(|e| AppointmentError::InvalidData(format!("document id '{}': {}", id, e)))?;
    let etag = ETag::new(etag)
        .ok_or_else(|| AppointmentError::InvalidData(format!("document {} has no etag", id)))?;
    let body: Map<String, Value> = serde_json::from_str(&body)
        .map_err(|e| AppointmentError::InvalidData(format!("document {} body: {}", id, e)))?;

    Ok(StoredDocument {
        id,
        resource_id: rid.to_string(),
        etag,
        timestamp: ts,
        body,
    })
}

/// Re-read a row that was written inside the current transaction.
fn written(tx: &Transaction<'_>, table: &str, id: &Uuid) -> Result<StoredDocument> {
    let row = select_row(tx, table, id)?.ok_or_else(|| {
        AppointmentError::Storage(format!("document {} vanished after write", id))
    })?;
    to_document(row)
}

#[async_trait]
impl DocumentContainer for SqliteContainer {
    async fn read(
        &self,
        id: Uuid,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>> {
        debug!(container = %self.table, %id, ?condition, "read");
        let condition = condition.clone();

        self.run(cancel, move |conn, table, _| {
            let Some(row) = select_row(conn, table, &id)? else {
                return Ok(StoreOutcome::NotFound);
            };
            let doc = to_document(row)?;

            Ok(match condition {
                Condition::IfNoneMatch(ref etag) if etag.matches(&doc.etag) => {
                    StoreOutcome::NotModified
                }
                Condition::IfMatch(ref etag) if !etag.matches(&doc.etag) => {
                    StoreOutcome::PreconditionFailed
                }
                _ => StoreOutcome::Ok(doc),
            })
        })
        .await
    }

    async fn create(
        &self,
        id: Uuid,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>> {
        debug!(container = %self.table, %id, "create");
        let body = serde_json::to_string(&into_body(body)?)?;

        self.run(cancel, move |conn, table, cancel| {
            let tx = write_tx(conn)?;
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO {} (id, etag, ts, body) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO NOTHING",
                    table
                ),
                params![id.to_string(), ETag::generate().as_str(), now_ts(), body],
            )?;

            if inserted == 0 {
                tx.rollback()?;
                return Ok(StoreOutcome::PreconditionFailed);
            }

            let doc = written(&tx, table, &id)?;
            commit_unless_canceled(tx, cancel)?;
            Ok(StoreOutcome::Ok(doc))
        })
        .await
    }

    async fn upsert(
        &self,
        id: Uuid,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>> {
        debug!(container = %self.table, %id, "upsert");
        let body = serde_json::to_string(&into_body(body)?)?;

        self.run(cancel, move |conn, table, cancel| {
            let tx = write_tx(conn)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (id, etag, ts, body) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                        etag = excluded.etag,
                        ts = excluded.ts,
                        body = excluded.body",
                    table
                ),
                params![id.to_string(), ETag::generate().as_str(), now_ts(), body],
            )?;

            let doc = written(&tx, table, &id)?;
            commit_unless_canceled(tx, cancel)?;
            Ok(StoreOutcome::Ok(doc))
        })
        .await
    }

    async fn replace(
        &self,
        id: Uuid,
        body: Value,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<StoredDocument>> {
        debug!(container = %self.table, %id, ?condition, "replace");
        let body = serde_json::to_string(&into_body(body)?)?;
        let condition = condition.clone();

        self.run(cancel, move |conn, table, cancel| {
            let (if_match, if_none_match) = condition_params(&condition);
            let tx = write_tx(conn)?;

            // compare and write in one statement
            let updated = tx.execute(
                &format!(
                    "UPDATE {} SET etag = ?2, ts = ?3, body = ?4
                     WHERE id = ?1
                       AND (?5 IS NULL OR ?5 = '*' OR etag = ?5)
                       AND (?6 IS NULL OR (?6 <> '*' AND etag <> ?6))",
                    table
                ),
                params![
                    id.to_string(),
                    ETag::generate().as_str(),
                    now_ts(),
                    body,
                    if_match,
                    if_none_match
                ],
            )?;

            if updated == 0 {
                let outcome = if exists(&tx, table, &id)? {
                    StoreOutcome::PreconditionFailed
                } else {
                    StoreOutcome::NotFound
                };
                tx.rollback()?;
                return Ok(outcome);
            }

            let doc = written(&tx, table, &id)?;
            commit_unless_canceled(tx, cancel)?;
            Ok(StoreOutcome::Ok(doc))
        })
        .await
    }

    async fn delete(
        &self,
        id: Uuid,
        condition: &Condition,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome<()>> {
        debug!(container = %self.table, %id, ?condition, "delete");
        let condition = condition.clone();

        self.run(cancel, move |conn, table, cancel| {
            let (if_match, if_none_match) = condition_params(&condition);
            let tx = write_tx(conn)?;

            let deleted = tx.execute(
                &format!(
                    "DELETE FROM {}
                     WHERE id = ?1
                       AND (?2 IS NULL OR ?2 = '*' OR etag = ?2)
                       AND (?3 IS NULL OR (?3 <> '*' AND etag <> ?3))",
                    table
                ),
                params![id.to_string(), if_match, if_none_match],
            )?;

            if deleted == 0 {
                let outcome = if exists(&tx, table, &id)? {
                    StoreOutcome::PreconditionFailed
                } else {
                    StoreOutcome::NotFound
                };
                tx.rollback()?;
                return Ok(outcome);
            }

            commit_unless_canceled(tx, cancel)?;
            Ok(StoreOutcome::Ok(()))
        })
        .await
    }

    async fn read_page(
        &self,
        continuation: Option<&str>,
        max_items: usize,
        cancel: &CancellationToken,
    ) -> Result<DocumentPage> {
        let after: i64 = match continuation {
            Some(token) => token.parse().map_err(|_| {
                AppointmentError::Storage(format!("invalid continuation token '{}'", token))
            })?,
            None => 0,
        };
        let limit = max_items.max(1);
        debug!(container = %self.table, after, limit, "read page");

        self.run(cancel, move |conn, table, _| {
            let mut stmt = conn.prepare(&format!(
                "SELECT rid, id, etag, ts, body FROM {} WHERE rid > ?1 ORDER BY rid LIMIT ?2",
                table
            ))?;

            let rows = stmt
                .query_map(params![after, limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<std::result::Result<Vec<RawRow>, _>>()?;

            let last_rid = rows.last().map(|row| row.0);
            let full = rows.len() == limit;
            let documents = rows
                .into_iter()
                .map(to_document)
                .collect::<Result<Vec<_>>>()?;

            Ok(DocumentPage {
                documents,
                continuation: if full {
                    last_rid.map(|rid| rid.to_string())
                } else {
                    None
                },
            })
        })
        .await
    }
}
