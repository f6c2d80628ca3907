//! Repository layer: optimistic-concurrency CRUD over a document container.
//!
//! Reads and writes hand back [`Tracked`] values so the identity and entity
//! tag travel with the entity instead of inside it. Conditional operations
//! delegate the compare-and-write to the store; nothing here checks a tag
//! and then writes.

mod document_repository;
mod record;
mod tracked;

pub use document_repository::{
    AppointmentRequestRepository, DocumentRepository, DEFAULT_PAGE_SIZE,
};
pub use record::{
    AppointmentRequestRecord, AppointmentRequestRecordTranslator, DocumentMeta, RecordTranslator,
};
pub use tracked::Tracked;

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::ETag;
use crate::error::Result;

/// Outcome of [`OptimisticRepository::get_if_modified`].
#[derive(Debug, Clone, PartialEq)]
pub enum IfModified<E> {
    /// The stored tag still equals the one supplied.
    Unchanged,
    Modified(Tracked<E>),
}

/// One page of entities from a collection scan.
#[derive(Debug, Clone)]
pub struct EntityPage<E> {
    pub entities: Vec<Tracked<E>>,
    pub continuation: Option<String>,
}

/// Unconditional and conditional access to a single collection keyed by
/// identity.
#[async_trait]
pub trait OptimisticRepository<E: Send + 'static>: Send + Sync {
    /// `NotFound` if absent.
    async fn get(&self, id: Uuid, cancel: &CancellationToken) -> Result<Tracked<E>>;

    /// Read one page of the collection, starting at `continuation`.
    async fn get_page(
        &self,
        continuation: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<EntityPage<E>>;

    /// `Unchanged` when the stored tag equals `etag`. Any other tag,
    /// including one the store never issued, yields the current entity.
    async fn get_if_modified(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<IfModified<E>>;

    /// Store under a freshly assigned identity.
    async fn add(&self, entity: E, cancel: &CancellationToken) -> Result<Tracked<E>>;

    /// `NotFound` if absent.
    async fn remove(&self, id: Uuid, cancel: &CancellationToken) -> Result<()>;

    /// Upsert: creates the record if it does not exist.
    async fn replace(&self, id: Uuid, entity: E, cancel: &CancellationToken)
        -> Result<Tracked<E>>;

    /// `Concurrency` if the stored tag differs, `NotFound` if absent.
    async fn remove_if_match(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// `Concurrency` if the stored tag differs, `NotFound` if absent.
    async fn replace_if_match(
        &self,
        id: Uuid,
        entity: E,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<Tracked<E>>;

    /// Lazily walk the whole collection, one page at a time.
    fn get_all(&self) -> EntityCursor<'_, E, Self>
    where
        Self: Sized,
    {
        EntityCursor::new(self)
    }
}

/// Single-pass cursor over a collection.
///
/// Pages are fetched on demand. Once it has returned `None` it stays
/// exhausted; walk again with a new cursor.
pub struct EntityCursor<'r, E, R> {
    repo: &'r R,
    buffered: VecDeque<Tracked<E>>,
    continuation: Option<String>,
    exhausted: bool,
}

impl<'r, E, R> EntityCursor<'r, E, R>
where
    E: Send + 'static,
    R: OptimisticRepository<E>,
{
    pub fn new(repo: &'r R) -> Self {
        Self {
            repo,
            buffered: VecDeque::new(),
            continuation: None,
            exhausted: false,
        }
    }

    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Tracked<E>>> {
        loop {
            if let Some(entity) = self.buffered.pop_front() {
                return Ok(Some(entity));
            }
            if self.exhausted {
                return Ok(None);
            }

            // advance only once a page is in hand
            let page = self.repo.get_page(self.continuation.clone(), cancel).await?;
            self.exhausted = page.continuation.is_none();
            self.continuation = page.continuation;
            self.buffered.extend(page.entities);
        }
    }

    /// Drain the remaining entities.
    pub async fn collect(mut self, cancel: &CancellationToken) -> Result<Vec<Tracked<E>>> {
        let mut all = Vec::new();
        while let Some(entity) = self.next(cancel).await? {
            all.push(entity);
        }
        Ok(all)
    }
}
