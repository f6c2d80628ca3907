use uuid::Uuid;

use crate::entity::ETag;

/// An entity together with the identity and version it was read or written
/// under.
///
/// Only the repository builds these, so holding a `Tracked` is proof the
/// value came from the store. The metadata lives exactly as long as the
/// value; a later write hands back a new `Tracked` with the new tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<E> {
    entity: E,
    id: Uuid,
    etag: ETag,
}

impl<E> Tracked<E> {
    pub(crate) fn new(entity: E, id: Uuid, etag: ETag) -> Self {
        Self { entity, id, etag }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn etag(&self) -> &ETag {
        &self.etag
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }
}

impl<E> std::ops::Deref for Tracked<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}
