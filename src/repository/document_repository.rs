use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::record::{AppointmentRequestRecordTranslator, RecordTranslator};
use super::{EntityPage, IfModified, OptimisticRepository, Tracked};
use crate::entity::{AppointmentRequest, ETag};
use crate::error::{AppointmentError, Result};
use crate::storage::{Condition, DocumentContainer, StoreOutcome, StoredDocument};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Repository for appointment requests.
pub type AppointmentRequestRepository =
    DocumentRepository<AppointmentRequest, AppointmentRequestRecordTranslator>;

/// Generic repository over an injected [`DocumentContainer`].
///
/// Translates between entity and record with `T` and turns store outcomes
/// into domain errors. Nothing below this type leaks to callers.
pub struct DocumentRepository<E, T> {
    container: Arc<dyn DocumentContainer>,
    translator: T,
    page_size: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E, T> DocumentRepository<E, T>
where
    E: Send + Sync + 'static,
    T: RecordTranslator<E>,
{
    pub fn new(container: Arc<dyn DocumentContainer>, translator: T) -> Self {
        Self {
            container,
            translator,
            page_size: DEFAULT_PAGE_SIZE,
            _entity: PhantomData,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn track(&self, doc: StoredDocument) -> Result<Tracked<E>> {
        let id = doc.id;
        let etag = doc.etag.clone();
        let record: T::Record = serde_json::from_value(doc.to_document())
            .map_err(|e| AppointmentError::InvalidData(format!("record {}: {}", id, e)))?;
        let entity = self.translator.to_domain(record)?;
        Ok(Tracked::new(entity, id, etag))
    }

    fn body(&self, entity: &E, id: Uuid) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.translator.to_record(entity, id))?)
    }
}

/// Translate an outcome that has no legitimate `NotModified` branch.
fn expect_written<T>(outcome: StoreOutcome<T>, id: Uuid) -> Result<T> {
    match outcome {
        StoreOutcome::Ok(value) => Ok(value),
        StoreOutcome::NotFound => Err(AppointmentError::NotFound(id)),
        StoreOutcome::PreconditionFailed => {
            warn!(%id, "conditional write rejected: stale entity tag");
            Err(AppointmentError::Concurrency)
        }
        StoreOutcome::NotModified => Err(AppointmentError::Storage(format!(
            "unexpected not-modified outcome for {}",
            id
        ))),
    }
}

#[async_trait]
impl<E, T> OptimisticRepository<E> for DocumentRepository<E, T>
where
    E: Send + Sync + 'static,
    T: RecordTranslator<E>,
{
    async fn get(&self, id: Uuid, cancel: &CancellationToken) -> Result<Tracked<E>> {
        let outcome = self.container.read(id, &Condition::None, cancel).await?;
        let doc = expect_written(outcome, id)?;
        self.track(doc)
    }

    async fn get_page(
        &self,
        continuation: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<EntityPage<E>> {
        let page = self
            .container
            .read_page(continuation.as_deref(), self.page_size, cancel)
            .await?;
        debug!(count = page.documents.len(), more = page.continuation.is_some(), "page read");

        let entities = page
            .documents
            .into_iter()
            .map(|doc| self.track(doc))
            .collect::<Result<Vec<_>>>()?;

        Ok(EntityPage {
            entities,
            continuation: page.continuation,
        })
    }

    async fn get_if_modified(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<IfModified<E>> {
        let condition = Condition::IfNoneMatch(etag.clone());
        match self.container.read(id, &condition, cancel).await? {
            StoreOutcome::NotModified => {
                debug!(%id, "unchanged since {}", etag);
                Ok(IfModified::Unchanged)
            }
            outcome => {
                let doc = expect_written(outcome, id)?;
                Ok(IfModified::Modified(self.track(doc)?))
            }
        }
    }

    async fn add(&self, entity: E, cancel: &CancellationToken) -> Result<Tracked<E>> {
        let id = Uuid::new_v4();
        let body = self.body(&entity, id)?;

        let doc = expect_written(self.container.create(id, body, cancel).await?, id)?;
        info!(%id, etag = %doc.etag, "added");
        Ok(Tracked::new(entity, id, doc.etag))
    }

    async fn remove(&self, id: Uuid, cancel: &CancellationToken) -> Result<()> {
        let outcome = self.container.delete(id, &Condition::None, cancel).await?;
        expect_written(outcome, id)?;
        info!(%id, "removed");
        Ok(())
    }

    async fn replace(
        &self,
        id: Uuid,
        entity: E,
        cancel: &CancellationToken,
    ) -> Result<Tracked<E>> {
        let body = self.body(&entity, id)?;

        let doc = expect_written(self.container.upsert(id, body, cancel).await?, id)?;
        info!(%id, etag = %doc.etag, "replaced");
        Ok(Tracked::new(entity, id, doc.etag))
    }

    async fn remove_if_match(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let condition = Condition::IfMatch(etag.clone());
        let outcome = self.container.delete(id, &condition, cancel).await?;
        expect_written(outcome, id)?;
        info!(%id, "removed at {}", etag);
        Ok(())
    }

    async fn replace_if_match(
        &self,
        id: Uuid,
        entity: E,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<Tracked<E>> {
        let body = self.body(&entity, id)?;
        let condition = Condition::IfMatch(etag.clone());

        let outcome = self.container.replace(id, body, &condition, cancel).await?;
        let doc = expect_written(outcome, id)?;
        info!(%id, from = %etag, to = %doc.etag, "replaced");
        Ok(Tracked::new(entity, id, doc.etag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteContainer;
    use serde_json::json;

    fn repository() -> AppointmentRequestRepository {
        let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
        AppointmentRequestRepository::new(container, AppointmentRequestRecordTranslator)
    }

    fn request(description: &str) -> AppointmentRequest {
        AppointmentRequest::new(description, "", Vec::new())
    }

    #[tokio::test]
    async fn test_walkthrough() {
        let repo = repository();
        let cancel = CancellationToken::new();

        // 1. add
        let added = repo.add(request("A"), &cancel).await.unwrap();
        let id = added.id();
        let t1 = added.etag().clone();

        // 2. get
        let got = repo.get(id, &cancel).await.unwrap();
        assert_eq!(got.description, "A");
        assert_eq!(got.etag(), &t1);

        // 3. replace with the current tag
        let replaced = repo
            .replace_if_match(id, request("B"), &t1, &cancel)
            .await
            .unwrap();
        let t2 = replaced.etag().clone();
        assert_ne!(t1, t2);

        // 4. replace with the stale tag
        let err = repo
            .replace_if_match(id, request("C"), &t1, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Concurrency));

        // 5. conditional read with the current tag
        let unchanged = repo.get_if_modified(id, &t2, &cancel).await.unwrap();
        assert_eq!(unchanged, IfModified::Unchanged);

        // 6. conditional remove, then gone
        repo.remove_if_match(id, &t2, &cancel).await.unwrap();
        let err = repo.get(id, &cancel).await.unwrap_err();
        assert!(matches!(err, AppointmentError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_get_returns_field_equal_entity() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let mut entity = request("Physio");
        entity.notes = "left knee".to_string();
        entity.participants = vec!["dr. who".to_string()];
        entity.categories = vec!["health".to_string()];
        entity.proposed_start_date_times = vec![entity.creation_date];

        let added = repo.add(entity.clone(), &cancel).await.unwrap();
        let got = repo.get(added.id(), &cancel).await.unwrap();

        assert_eq!(got.entity(), &entity);
        assert_eq!(got.etag(), added.etag());
    }

    #[tokio::test]
    async fn test_added_identities_are_unique() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let a = repo.add(request("same"), &cancel).await.unwrap();
        let b = repo.add(request("same"), &cancel).await.unwrap();
        assert_ne!(a.id(), b.id());
        // equal values, independent records
        assert_eq!(a.entity(), b.entity());
    }

    #[tokio::test]
    async fn test_get_if_modified_with_other_tag_returns_current() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let added = repo.add(request("A"), &cancel).await.unwrap();
        let bogus = ETag::new("\"never-issued\"").unwrap();

        match repo.get_if_modified(added.id(), &bogus, &cancel).await.unwrap() {
            IfModified::Modified(current) => {
                assert_eq!(current.etag(), added.etag());
                assert_eq!(current.description, "A");
            }
            IfModified::Unchanged => panic!("expected the current entity"),
        }
    }

    #[tokio::test]
    async fn test_get_if_modified_does_not_touch_store() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let added = repo.add(request("A"), &cancel).await.unwrap();
        repo.get_if_modified(added.id(), added.etag(), &cancel)
            .await
            .unwrap();

        let got = repo.get(added.id(), &cancel).await.unwrap();
        assert_eq!(got.etag(), added.etag());
    }

    #[tokio::test]
    async fn test_get_if_modified_missing() {
        let repo = repository();
        let cancel = CancellationToken::new();
        let etag = ETag::new("\"x\"").unwrap();

        let err = repo
            .get_if_modified(Uuid::new_v4(), &etag, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_not_found_cases() {
        let repo = repository();
        let cancel = CancellationToken::new();
        let etag = ETag::new("\"x\"").unwrap();

        assert!(matches!(
            repo.get(Uuid::new_v4(), &cancel).await,
            Err(AppointmentError::NotFound(_))
        ));
        assert!(matches!(
            repo.remove(Uuid::new_v4(), &cancel).await,
            Err(AppointmentError::NotFound(_))
        ));
        assert!(matches!(
            repo.remove_if_match(Uuid::new_v4(), &etag, &cancel).await,
            Err(AppointmentError::NotFound(_))
        ));
        assert!(matches!(
            repo.replace_if_match(Uuid::new_v4(), request("A"), &etag, &cancel)
                .await,
            Err(AppointmentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_if_match_stale() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let added = repo.add(request("A"), &cancel).await.unwrap();
        repo.replace(added.id(), request("B"), &cancel).await.unwrap();

        let err = repo
            .remove_if_match(added.id(), added.etag(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::Concurrency));
        assert!(repo.get(added.id(), &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_replace_is_upsert() {
        let repo = repository();
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        let created = repo.replace(id, request("new"), &cancel).await.unwrap();
        assert_eq!(created.id(), id);

        let got = repo.get(id, &cancel).await.unwrap();
        assert_eq!(got.description, "new");
        assert_eq!(got.etag(), created.etag());
    }

    #[tokio::test]
    async fn test_get_all_pages_lazily() {
        let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
        let repo =
            AppointmentRequestRepository::new(container, AppointmentRequestRecordTranslator)
                .with_page_size(2);
        let cancel = CancellationToken::new();

        for name in ["a", "b", "c", "d", "e"] {
            repo.add(request(name), &cancel).await.unwrap();
        }

        let mut cursor = repo.get_all();
        let mut names = Vec::new();
        while let Some(item) = cursor.next(&cancel).await.unwrap() {
            names.push(item.description.clone());
        }
        assert_eq!(names, ["a", "b", "c", "d", "e"]);

        // single pass
        assert!(cursor.next(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_resumes_after_failed_page() {
        let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
        let repo =
            AppointmentRequestRepository::new(container, AppointmentRequestRecordTranslator)
                .with_page_size(2);
        let cancel = CancellationToken::new();

        for name in ["a", "b", "c", "d"] {
            repo.add(request(name), &cancel).await.unwrap();
        }

        let mut cursor = repo.get_all();
        let mut names = Vec::new();
        for _ in 0..2 {
            let item = cursor.next(&cancel).await.unwrap().unwrap();
            names.push(item.description.clone());
        }

        let canceled = CancellationToken::new();
        canceled.cancel();
        let err = cursor.next(&canceled).await.unwrap_err();
        assert!(matches!(err, AppointmentError::Canceled));

        while let Some(item) = cursor.next(&cancel).await.unwrap() {
            names.push(item.description.clone());
        }
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_get_all_carries_metadata() {
        let repo = repository();
        let cancel = CancellationToken::new();

        let added = repo.add(request("a"), &cancel).await.unwrap();
        let all = repo.get_all().collect(&cancel).await.unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id(), added.id());
        assert_eq!(all[0].etag(), added.etag());
    }

    #[tokio::test]
    async fn test_canceled_add_returns_nothing() {
        let repo = repository();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = repo.add(request("A"), &cancel).await.unwrap_err();
        assert!(matches!(err, AppointmentError::Canceled));

        let live = CancellationToken::new();
        assert!(repo.get_all().collect(&live).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
        let repo = AppointmentRequestRepository::new(
            container.clone(),
            AppointmentRequestRecordTranslator,
        );
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        container
            .create(id, json!({"description": "no status"}), &cancel)
            .await
            .unwrap();

        let err = repo.get(id, &cancel).await.unwrap_err();
        assert!(matches!(err, AppointmentError::InvalidData(_)));
    }
}
