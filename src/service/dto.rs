//! Caller-facing representation of an appointment request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{AppointmentRequest, AppointmentRequestStatus, MeetingDuration};
use crate::error::{AppointmentError, Result};

/// Appointment request as sent and received over the API.
///
/// Everything is optional on the wire; [`AppointmentRequestDtoTranslator`]
/// enforces which fields a valid request must carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequestDto {
    /// Date the request was first created, e.g. `2023-06-07T17:49:12.9565268Z`
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: Option<AppointmentRequestStatus>,
    pub duration: Option<MeetingDuration>,
    pub participants: Option<Vec<String>>,
    pub proposed_start_date_times: Option<Vec<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentRequestDtoTranslator;

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppointmentError::Validation(format!("The {} field is required.", field)))
}

impl AppointmentRequestDtoTranslator {
    pub fn to_entity(&self, dto: AppointmentRequestDto) -> Result<AppointmentRequest> {
        let description = required(dto.description, "description")?;
        if description.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "The description field is required.".to_string(),
            ));
        }

        Ok(AppointmentRequest {
            creation_date: required(dto.creation_date, "creationDate")?,
            categories: dto.categories.unwrap_or_default(),
            description,
            notes: dto.notes.unwrap_or_default(),
            status: required(dto.status, "status")?,
            duration: required(dto.duration, "duration")?,
            participants: required(dto.participants, "participants")?,
            proposed_start_date_times: required(
                dto.proposed_start_date_times,
                "proposedStartDateTimes",
            )?,
        })
    }

    pub fn to_dto(&self, entity: &AppointmentRequest) -> AppointmentRequestDto {
        AppointmentRequestDto {
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
