pub mod api;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod repository;
pub mod service;
pub mod storage;

pub use config::AppConfig;
pub use entity::{AppointmentRequest, AppointmentRequestStatus, ETag, MeetingDuration};
pub use error::{AppointmentError, Result};
pub use repository::{AppointmentRequestRepository, OptimisticRepository, Tracked};
pub use service::{AppointmentRequestDto, AppointmentRequestService, ConditionalRead};
pub use storage::{DocumentContainer, SqliteContainer};
