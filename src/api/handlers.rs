use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::problem::ApiError;
use super::{AppState, COLLECTION_PATH};
use crate::entity::{AppointmentRequest, ETag};
use crate::error::AppointmentError;
use crate::repository::OptimisticRepository;
use crate::service::{parse_patch, AppointmentRequestDto, ConditionalRead};

type ApiResult = Result<Response, ApiError>;

/// One element of `GET /appointment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub href: String,
    pub data: AppointmentRequestDto,
    pub etag: ETag,
}

/// Blank or absent means "no precondition". Any other value, including one
/// with non-ASCII bytes, is a tag to compare against. A list of tags is
/// compared as a single token.
fn conditional_header(headers: &HeaderMap, name: HeaderName) -> Option<ETag> {
    headers
        .get(name)
        .and_then(|value| ETag::new(String::from_utf8_lossy(value.as_bytes())))
}

fn etag_value(etag: &ETag) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(etag.as_str()).map_err(|_| {
        ApiError(AppointmentError::InvalidData(format!(
            "entity tag {} is not a valid header value",
            etag
        )))
    })
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError(AppointmentError::Validation(format!(
            "The value '{}' is not a valid identifier.",
            raw
        )))
    })
}

fn parse_dto(body: &[u8]) -> Result<AppointmentRequestDto, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError(AppointmentError::Validation(e.to_string())))
}

fn href(id: Uuid) -> String {
    format!("{}/{}", COLLECTION_PATH, id)
}

/// Token for one request. Cancelled when the request future is dropped or
/// the server shuts down.
fn request_token<R>(state: &AppState<R>) -> CancellationToken {
    state.shutdown.child_token()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn list_requests<R>(State(state): State<AppState<R>>) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    let items: Vec<ListItem> = state
        .service
        .get_requests(&cancel)
        .await?
        .into_iter()
        .map(|summary| ListItem {
            href: href(summary.id),
            data: summary.dto,
            etag: summary.etag,
        })
        .collect();

    debug!(count = items.len(), "listed appointment requests");
    Ok(Json(items).into_response())
}

pub async fn get_request<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let id = parse_id(&id)?;
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    match conditional_header(&headers, header::IF_NONE_MATCH) {
        None => {
            let (dto, etag) = state.service.get_request(id, &cancel).await?;
            Ok(([(header::ETAG, etag_value(&etag)?)], Json(dto)).into_response())
        }
        Some(etag) => match state
            .service
            .get_request_if_none_match(id, &etag, &cancel)
            .await?
        {
            ConditionalRead::NotModified { etag } => Ok((
                StatusCode::NOT_MODIFIED,
                [(header::ETAG, etag_value(&etag)?)],
            )
                .into_response()),
            ConditionalRead::Modified { dto, etag } => {
                Ok(([(header::ETAG, etag_value(&etag)?)], Json(dto)).into_response())
            }
        },
    }
}

pub async fn create_request<R>(State(state): State<AppState<R>>, body: Bytes) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let dto = parse_dto(&body)?;
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    let (id, etag) = state.service.create_request(dto, &cancel).await?;
    let location = HeaderValue::from_str(&href(id))
        .map_err(|e| ApiError(AppointmentError::Storage(e.to_string())))?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location), (header::ETAG, etag_value(&etag)?)],
    )
        .into_response())
}

pub async fn replace_request<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let id = parse_id(&id)?;
    let dto = parse_dto(&body)?;
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    let etag = match conditional_header(&headers, header::IF_MATCH) {
        Some(expected) => {
            state
                .service
                .replace_request_if_match(id, dto, &expected, &cancel)
                .await?
        }
        None => state.service.replace_request(id, dto, &cancel).await?,
    };

    Ok((StatusCode::NO_CONTENT, [(header::ETAG, etag_value(&etag)?)]).into_response())
}

pub async fn update_request<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let id = parse_id(&id)?;
    let patch = parse_patch(&body)?;
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    let (dto, etag) = match conditional_header(&headers, header::IF_MATCH) {
        Some(expected) => {
            state
                .service
                .update_request_if_match(id, &patch, &expected, &cancel)
                .await?
        }
        None => state.service.update_request(id, &patch, &cancel).await?,
    };

    Ok(([(header::ETAG, etag_value(&etag)?)], Json(dto)).into_response())
}

pub async fn remove_request<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let id = parse_id(&id)?;
    let cancel = request_token(&state);
    let _guard = cancel.clone().drop_guard();

    match conditional_header(&headers, header::IF_MATCH) {
        Some(expected) => {
            state
                .service
                .remove_request_if_match(id, &expected, &cancel)
                .await?
        }
        None => state.service.remove_request(id, &cancel).await?,
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
