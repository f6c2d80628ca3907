//! Stored shape of an appointment request and its translation to and from
//! the domain entity.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{AppointmentRequest, AppointmentRequestStatus, ETag, MeetingDuration};
use crate::error::{AppointmentError, Result};

/// Fields the store manages on every document.
///
/// Only `id` is written by the repository; the rest are filled in by the
/// store and are ignored on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: Uuid,
    #[serde(rename = "_rid", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl DocumentMeta {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            resource_id: None,
            etag: None,
            timestamp: None,
        }
    }
}

/// An appointment request as persisted.
///
/// Every business field is optional here: a document written by an older
/// version, or by hand, may lack any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequestRecord {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub creation_date: Option<DateTime<Utc>>,
    pub categories: Option<Vec<String>>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<AppointmentRequestStatus>,
    pub duration: Option<MeetingDuration>,
    pub participants: Option<Vec<String>>,
    pub proposed_start_date_times: Option<Vec<DateTime<Utc>>>,
}

/// Maps a domain entity to its stored record and back.
pub trait RecordTranslator<E>: Send + Sync {
    type Record: Serialize + DeserializeOwned + Send;

    /// Rebuild the entity. Fails with `InvalidData` if the record is
    /// missing something the entity requires.
    fn to_domain(&self, record: Self::Record) -> Result<E>;

    /// Build the record to persist under `id`.
    fn to_record(&self, entity: &E, id: Uuid) -> Self::Record;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentRequestRecordTranslator;

fn required<T>(value: Option<T>, id: Uuid, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        AppointmentError::InvalidData(format!("record {} is missing '{}'", id, field))
    })
}

impl RecordTranslator<AppointmentRequest> for AppointmentRequestRecordTranslator {
    type Record = AppointmentRequestRecord;

    fn to_domain(&self, record: AppointmentRequestRecord) -> Result<AppointmentRequest> {
        let id = record.meta.id;
        Ok(AppointmentRequest {
            creation_date: required(record.creation_date, id, "creationDate")?,
            categories: record.categories.unwrap_or_default(),
            description: required(record.description, id, "description")?,
            notes: record.notes.unwrap_or_default(),
            status: required(record.status, id, "status")?,
            duration: required(record.duration, id, "duration")?,
            participants: record.participants.unwrap_or_default(),
            proposed_start_date_times: record.proposed_start_date_times.unwrap_or_default(),
        })
    }

    fn to_record(&self, entity: &AppointmentRequest, id: Uuid) -> AppointmentRequestRecord {
        AppointmentRequestRecord {
            meta: DocumentMeta::new(id),
            creation_date: Some(entity.creation_date),
            categories: Some(entity.categories.clone()),
            description: Some(entity.description.clone()),
            notes: Some(entity.notes.clone()),
            status: Some(entity.status),
            duration: Some(entity.duration),
            participants: Some(entity.participants.clone()),
            proposed_start_date_times: Some(entity.proposed_start_date_times.clone()),
        }
    }
}
