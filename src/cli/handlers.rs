use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::entity::{AppointmentRequestStatus, ETag};
use crate::error::{AppointmentError, Result};
use crate::repository::{AppointmentRequestRecordTranslator, AppointmentRequestRepository};
use crate::service::{AppointmentRequestService, ConditionalRead};
use crate::storage::SqliteContainer;

type Service = AppointmentRequestService<AppointmentRequestRepository>;

fn open_service(config: &AppConfig, database: Option<PathBuf>) -> Result<Service> {
    let path = database.unwrap_or_else(|| config.database_path.clone());
    let container = SqliteContainer::open(&path, &config.container_name)?;
    debug!(
        database = ?container.path(),
        container = container.container_name(),
        "opened store"
    );
    let repository =
        AppointmentRequestRepository::new(Arc::new(container), AppointmentRequestRecordTranslator)
            .with_page_size(config.page_size);
    Ok(AppointmentRequestService::new(repository))
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id)
        .map_err(|_| AppointmentError::Validation(format!("invalid id '{}': expected a UUID", id)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn handle_serve(
    mut config: AppConfig,
    bind: Option<String>,
    database: Option<PathBuf>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(database) = database {
        config.database_path = database;
    }

    let service = open_service(&config, None)?;
    info!(bind = %config.bind, "starting server");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "cannot listen for interrupt"),
        }
        signal.cancel();
    });

    let listener = TcpListener::bind(&config.bind).await?;
    api::serve(listener, AppState::new(service, shutdown)).await
}

pub async fn handle_list(
    config: AppConfig,
    database: Option<PathBuf>,
    status: Option<AppointmentRequestStatus>,
    json: bool,
) -> Result<()> {
    let service = open_service(&config, database)?;
    let cancel = CancellationToken::new();
    let mut requests = service.get_requests(&cancel).await?;
    if let Some(status) = status {
        requests.retain(|r| r.dto.status == Some(status));
    }

    if json {
        let items: Vec<_> = requests
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "etag": r.etag,
                    "data": r.dto,
                })
            })
            .collect();
        return print_json(&items);
    }

    if requests.is_empty() {
        println!("No appointment requests found.");
        return Ok(());
    }

    println!("Appointment requests:\n");
    for r in requests {
        let status = r
            .dto
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {} [{}] {}",
            r.id,
            status,
            r.dto.description.as_deref().unwrap_or("")
        );
        println!("      etag: {}", r.etag);
    }
    Ok(())
}

pub async fn handle_get(
    config: AppConfig,
    id: String,
    if_none_match: Option<String>,
    database: Option<PathBuf>,
) -> Result<()> {
    let id = parse_id(&id)?;
    let service = open_service(&config, database)?;
    let cancel = CancellationToken::new();

    let (dto, etag) = match if_none_match.and_then(ETag::new) {
        Some(expected) => match service
            .get_request_if_none_match(id, &expected, &cancel)
            .await?
        {
            ConditionalRead::NotModified { etag } => {
                println!("Not modified (etag {})", etag);
                return Ok(());
            }
            ConditionalRead::Modified { dto, etag } => (dto, etag),
        },
        None => service.get_request(id, &cancel).await?,
    };

    print_json(&serde_json::json!({
        "id": id,
        "etag": etag,
        "data": dto,
    }))
}

pub async fn handle_delete(
    config: AppConfig,
    id: String,
    if_match: Option<String>,
    database: Option<PathBuf>,
) -> Result<()> {
    let id = parse_id(&id)?;
    let service = open_service(&config, database)?;
    let cancel = CancellationToken::new();

    match if_match.and_then(ETag::new) {
        Some(expected) => {
            service
                .remove_request_if_match(id, &expected, &cancel)
                .await?
        }
        None => service.remove_request(id, &cancel).await?,
    }

    println!("Deleted appointment request {}", id);
    Ok(())
}
