//! Application service for appointment requests.
//!
//! Sits between the HTTP layer and the repository: translates DTOs to
//! entities and back, and hands entity tags to the caller next to each value
//! rather than inside it. Errors pass through untouched.

mod dto;
mod patch;

pub use dto::{AppointmentRequestDto, AppointmentRequestDtoTranslator};
pub use patch::{apply_patch, parse_patch};

use json_patch::Patch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::{AppointmentRequest, ETag};
use crate::error::Result;
use crate::repository::{IfModified, OptimisticRepository};

/// Outcome of a conditional read.
///
/// `NotModified` is a successful read, not a conflict: the caller's copy is
/// current.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalRead {
    NotModified { etag: ETag },
    Modified { dto: AppointmentRequestDto, etag: ETag },
}

/// One element of a collection read.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub id: Uuid,
    pub etag: ETag,
    pub dto: AppointmentRequestDto,
}

pub struct AppointmentRequestService<R> {
    repository: R,
    translator: AppointmentRequestDtoTranslator,
}

impl<R> AppointmentRequestService<R>
where
    R: OptimisticRepository<AppointmentRequest>,
{
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            translator: AppointmentRequestDtoTranslator,
        }
    }

    pub async fn create_request(
        &self,
        dto: AppointmentRequestDto,
        cancel: &CancellationToken,
    ) -> Result<(Uuid, ETag)> {
        let entity = self.translator.to_entity(dto)?;
        let tracked = self.repository.add(entity, cancel).await?;
        Ok((tracked.id(), tracked.etag().clone()))
    }

    pub async fn get_request(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(AppointmentRequestDto, ETag)> {
        let tracked = self.repository.get(id, cancel).await?;
        Ok((self.translator.to_dto(&tracked), tracked.etag().clone()))
    }

    pub async fn get_request_if_none_match(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<ConditionalRead> {
        // "*" matches whatever exists; answer with the tag actually stored.
        if etag.is_wildcard() {
            let tracked = self.repository.get(id, cancel).await?;
            return Ok(ConditionalRead::NotModified {
                etag: tracked.etag().clone(),
            });
        }

        match self.repository.get_if_modified(id, etag, cancel).await? {
            IfModified::Unchanged => Ok(ConditionalRead::NotModified { etag: etag.clone() }),
            IfModified::Modified(tracked) => Ok(ConditionalRead::Modified {
                dto: self.translator.to_dto(&tracked),
                etag: tracked.etag().clone(),
            }),
        }
    }

    pub async fn get_requests(&self, cancel: &CancellationToken) -> Result<Vec<RequestSummary>> {
        let mut cursor = self.repository.get_all();
        let mut items = Vec::new();
        while let Some(tracked) = cursor.next(cancel).await? {
            items.push(RequestSummary {
                id: tracked.id(),
                etag: tracked.etag().clone(),
                dto: self.translator.to_dto(&tracked),
            });
        }
        Ok(items)
    }

    pub async fn remove_request(&self, id: Uuid, cancel: &CancellationToken) -> Result<()> {
        self.repository.remove(id, cancel).await
    }

    pub async fn remove_request_if_match(
        &self,
        id: Uuid,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.repository.remove_if_match(id, etag, cancel).await
    }

    pub async fn replace_request(
        &self,
        id: Uuid,
        dto: AppointmentRequestDto,
        cancel: &CancellationToken,
    ) -> Result<ETag> {
        let entity = self.translator.to_entity(dto)?;
        let tracked = self.repository.replace(id, entity, cancel).await?;
        Ok(tracked.etag().clone())
    }

    pub async fn replace_request_if_match(
        &self,
        id: Uuid,
        dto: AppointmentRequestDto,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<ETag> {
        let entity = self.translator.to_entity(dto)?;
        let tracked = self
            .repository
            .replace_if_match(id, entity, etag, cancel)
            .await?;
        Ok(tracked.etag().clone())
    }

    /// Read, patch, then overwrite unconditionally.
    pub async fn update_request(
        &self,
        id: Uuid,
        patch: &Patch,
        cancel: &CancellationToken,
    ) -> Result<(AppointmentRequestDto, ETag)> {
        let patched = self.patched_entity(id, patch, cancel).await?;
        let tracked = self.repository.replace(id, patched, cancel).await?;
        Ok((self.translator.to_dto(&tracked), tracked.etag().clone()))
    }

    /// Read, patch, then overwrite only if the stored tag is still `etag`.
    ///
    /// Conflicts if the record changed after the read, even though the read
    /// itself succeeded.
    pub async fn update_request_if_match(
        &self,
        id: Uuid,
        patch: &Patch,
        etag: &ETag,
        cancel: &CancellationToken,
    ) -> Result<(AppointmentRequestDto, ETag)> {
        let patched = self.patched_entity(id, patch, cancel).await?;
        let tracked = self
            .repository
            .replace_if_match(id, patched, etag, cancel)
            .await?;
        Ok((self.translator.to_dto(&tracked), tracked.etag().clone()))
    }

    async fn patched_entity(
        &self,
        id: Uuid,
        patch: &Patch,
        cancel: &CancellationToken,
    ) -> Result<AppointmentRequest> {
        let current = self.repository.get(id, cancel).await?;
        let dto = apply_patch(&self.translator.to_dto(&current), patch)?;
        self.translator.to_entity(dto)
    }
}
