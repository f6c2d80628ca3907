use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use appointments::api::{router, AppState, PROBLEM_JSON};
use appointments::repository::AppointmentRequestRecordTranslator;
use appointments::{AppointmentRequestRepository, AppointmentRequestService, SqliteContainer};

fn app() -> Router {
    let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
    let repository =
        AppointmentRequestRepository::new(container, AppointmentRequestRecordTranslator)
            .with_page_size(2);
    let service = AppointmentRequestService::new(repository);
    router(AppState::new(service, CancellationToken::new()))
}

fn request_body(description: &str) -> Value {
    json!({
        "creationDate": "2023-06-07T17:49:12.9565268Z",
        "description": description,
        "notes": "",
        "status": "proposed",
        "duration": "hour",
        "participants": ["alice"],
        "proposedStartDateTimes": ["2023-07-01T09:00:00Z"]
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(header::HeaderName, &str)],
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, *value);
    }
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn etag_of(response: &Response) -> String {
    response
        .headers()
        .get(header::ETAG)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

async fn create(app: &Router, description: &str) -> (String, String) {
    let response = send(
        app,
        Method::POST,
        "/appointment",
        &[],
        Some(request_body(description)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    (location, etag_of(&response))
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let response = send(&app, Method::GET, "/health", &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_create_returns_location_and_etag() {
    let app = app();
    let (location, etag) = create(&app, "A").await;
    assert!(location.starts_with("/appointment/"));

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(etag_of(&response), etag);
    let body = json_body(response).await;
    assert_eq!(body["description"], "A");
    assert_eq!(body["status"], "proposed");
}

#[tokio::test]
async fn test_create_with_missing_field_is_bad_request() {
    let app = app();
    let mut body = request_body("A");
    body.as_object_mut().unwrap().remove("status");

    let response = send(&app, Method::POST, "/appointment", &[], Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        PROBLEM_JSON
    );
    assert_eq!(json_body(response).await["title"], "Bad request");
}

#[tokio::test]
async fn test_conditional_get() {
    let app = app();
    let (location, etag) = create(&app, "A").await;

    let response = send(
        &app,
        Method::GET,
        &location,
        &[(header::IF_NONE_MATCH, etag.as_str())],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(etag_of(&response), etag);

    let response = send(
        &app,
        Method::GET,
        &location,
        &[(header::IF_NONE_MATCH, "\"something-else\"")],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(etag_of(&response), etag);
}

#[tokio::test]
async fn test_blank_if_match_is_unconditional() {
    let app = app();
    let (location, _) = create(&app, "A").await;

    let response = send(
        &app,
        Method::PUT,
        &location,
        &[(header::IF_MATCH, "")],
        Some(request_body("B")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_put_with_stale_etag_is_precondition_failed() {
    let app = app();
    let (location, stale) = create(&app, "A").await;

    let response = send(
        &app,
        Method::PUT,
        &location,
        &[(header::IF_MATCH, stale.as_str())],
        Some(request_body("B")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let fresh = etag_of(&response);
    assert_ne!(fresh, stale);

    let response = send(
        &app,
        Method::PUT,
        &location,
        &[(header::IF_MATCH, stale.as_str())],
        Some(request_body("C")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(json_body(response).await["title"], "Precondition Failed.");

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(etag_of(&response), fresh);
    assert_eq!(json_body(response).await["description"], "B");
}

#[tokio::test]
async fn test_put_with_non_ascii_stale_etag_is_precondition_failed() {
    let app = app();
    let (location, _) = create(&app, "A").await;
    send(&app, Method::PUT, &location, &[], Some(request_body("B"))).await;

    let request = Request::builder()
        .method(Method::PUT)
        .uri(&location)
        .header(
            header::IF_MATCH,
            header::HeaderValue::from_bytes(b"\"\xE9stale\"").unwrap(),
        )
        .body(Body::from(serde_json::to_vec(&request_body("C")).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(json_body(response).await["description"], "B");
}

#[tokio::test]
async fn test_patch_with_stale_etag_is_precondition_failed() {
    let app = app();
    let (location, stale) = create(&app, "A").await;
    send(&app, Method::PUT, &location, &[], Some(request_body("B"))).await;

    let response = send(
        &app,
        Method::PATCH,
        &location,
        &[(header::IF_MATCH, stale.as_str())],
        Some(json!([{"op": "replace", "path": "/description", "value": "C"}])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(json_body(response).await["description"], "B");
}

#[tokio::test]
async fn test_conditional_operations_on_missing_id() {
    let app = app();
    let uri = format!("/appointment/{}", uuid::Uuid::new_v4());
    let tag = "\"whatever\"";

    let response = send(
        &app,
        Method::PATCH,
        &uri,
        &[],
        Some(json!([{"op": "replace", "path": "/description", "value": "C"}])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::PUT,
        &uri,
        &[(header::IF_MATCH, tag)],
        Some(request_body("C")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::GET,
        &uri,
        &[(header::IF_NONE_MATCH, tag)],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wildcard_preconditions() {
    let app = app();
    let (location, _) = create(&app, "A").await;

    let response = send(
        &app,
        Method::PUT,
        &location,
        &[(header::IF_MATCH, "*")],
        Some(request_body("B")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let current = etag_of(&response);

    let response = send(
        &app,
        Method::GET,
        &location,
        &[(header::IF_NONE_MATCH, "*")],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(etag_of(&response), current);

    let missing = format!("/appointment/{}", uuid::Uuid::new_v4());
    let response = send(
        &app,
        Method::PUT,
        &missing,
        &[(header::IF_MATCH, "*")],
        Some(request_body("B")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, Method::DELETE, &location, &[(header::IF_MATCH, "*")], None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_patch_returns_new_etag_and_body() {
    let app = app();
    let (location, etag) = create(&app, "A").await;

    let response = send(
        &app,
        Method::PATCH,
        &location,
        &[(header::IF_MATCH, etag.as_str())],
        Some(json!([{"op": "replace", "path": "/description", "value": "B"}])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let new_etag = etag_of(&response);
    assert_ne!(new_etag, etag);
    assert_eq!(json_body(response).await["description"], "B");

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(etag_of(&response), new_etag);
}

#[tokio::test]
async fn test_malformed_patch_is_bad_request() {
    let app = app();
    let (location, _) = create(&app, "A").await;

    let response = send(
        &app,
        Method::PATCH,
        &location,
        &[],
        Some(json!({"op": "replace"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["title"],
        "Malformed patch document"
    );
}

#[tokio::test]
async fn test_missing_is_not_found() {
    let app = app();
    let uri = format!("/appointment/{}", uuid::Uuid::new_v4());

    let response = send(&app, Method::GET, &uri, &[], None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await["title"],
        "Requested item is not found"
    );

    let response = send(&app, Method::DELETE, &uri, &[], None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::DELETE,
        &uri,
        &[(header::IF_MATCH, "\"whatever\"")],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = app();
    let response = send(&app, Method::GET, "/appointment/not-a-uuid", &[], None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conditional_delete() {
    let app = app();
    let (location, stale) = create(&app, "A").await;

    let response = send(&app, Method::PUT, &location, &[], Some(request_body("B"))).await;
    let fresh = etag_of(&response);

    let response = send(
        &app,
        Method::DELETE,
        &location,
        &[(header::IF_MATCH, stale.as_str())],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = send(
        &app,
        Method::DELETE,
        &location,
        &[(header::IF_MATCH, fresh.as_str())],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, &location, &[], None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_spans_pages() {
    let app = app();
    let mut created = Vec::new();
    for description in ["A", "B", "C", "D", "E"] {
        created.push(create(&app, description).await);
    }

    let response = send(&app, Method::GET, "/appointment", &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 5);

    for (item, (location, etag)) in items.iter().zip(&created) {
        assert_eq!(item["href"], location.as_str());
        assert_eq!(item["etag"], etag.as_str());
    }
    assert_eq!(items[4]["data"]["description"], "E");
}

#[tokio::test]
async fn test_shutdown_cancels_requests() {
    let container = Arc::new(SqliteContainer::open_in_memory("appointments").unwrap());
    let repository =
        AppointmentRequestRepository::new(container, AppointmentRequestRecordTranslator);
    let shutdown = CancellationToken::new();
    let app = router(AppState::new(
        AppointmentRequestService::new(repository),
        shutdown.clone(),
    ));

    shutdown.cancel();
    let response = send(
        &app,
        Method::POST,
        "/appointment",
        &[],
        Some(request_body("A")),
    )
    .await;
    assert_eq!(response.status().as_u16(), 499);
}
