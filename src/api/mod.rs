//! HTTP transport.
//!
//! Maps requests and conditional headers onto [`AppointmentRequestService`]
//! calls, and errors onto problem-details responses.

mod handlers;
mod problem;

pub use handlers::ListItem;
pub use problem::{ApiError, ProblemDetails, PROBLEM_JSON};

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::entity::AppointmentRequest;
use crate::error::Result;
use crate::repository::OptimisticRepository;
use crate::service::AppointmentRequestService;

pub const COLLECTION_PATH: &str = "/appointment";

pub struct AppState<R> {
    pub service: Arc<AppointmentRequestService<R>>,
    /// Parent of every per-request token.
    pub shutdown: CancellationToken,
}

impl<R> AppState<R> {
    pub fn new(service: AppointmentRequestService<R>, shutdown: CancellationToken) -> Self {
        Self {
            service: Arc::new(service),
            shutdown,
        }
    }
}

// Derived Clone would require `R: Clone`.
impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            shutdown: self.shutdown.clone(),
        }
    }
}

pub fn router<R>(state: AppState<R>) -> Router
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            COLLECTION_PATH,
            get(handlers::list_requests::<R>).post(handlers::create_request::<R>),
        )
        .route(
            "/appointment/{id}",
            get(handlers::get_request::<R>)
                .put(handlers::replace_request::<R>)
                .patch(handlers::update_request::<R>)
                .delete(handlers::remove_request::<R>),
        )
        .with_state(state)
}

/// Serve until the state's shutdown token is cancelled.
pub async fn serve<R>(listener: TcpListener, state: AppState<R>) -> Result<()>
where
    R: OptimisticRepository<AppointmentRequest> + 'static,
{
    let shutdown = state.shutdown.clone();
    info!(addr = ?listener.local_addr().ok(), "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
