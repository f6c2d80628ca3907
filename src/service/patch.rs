//! JSON Patch (RFC 6902) support for partial updates.

use json_patch::Patch;

use super::dto::AppointmentRequestDto;
use crate::error::{AppointmentError, Result};

/// Parse a patch document from a request body.
pub fn parse_patch(body: &[u8]) -> Result<Patch> {
    serde_json::from_slice(body).map_err(|e| AppointmentError::InvalidPatch(e.to_string()))
}

/// Apply `patch` to the JSON form of `dto`.
///
/// The result is not validated here; translating it back to an entity does
/// that.
pub fn apply_patch(dto: &AppointmentRequestDto, patch: &Patch) -> Result<AppointmentRequestDto> {
    let mut doc = serde_json::to_value(dto)?;
    json_patch::patch(&mut doc, patch).map_err(|e| AppointmentError::InvalidPatch(e.to_string()))?;
    serde_json::from_value(doc).map_err(|e| AppointmentError::InvalidPatch(e.to_string()))
}
