//! Service configuration.
//!
//! Loaded from an optional YAML file; anything the file leaves out keeps its
//! default. Command-line flags are applied on top by the CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppointmentError, Result};
use crate::repository::DEFAULT_PAGE_SIZE;
use crate::storage::is_valid_container_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub bind: String,
    pub database_path: PathBuf,
    /// Table holding the appointment request documents.
    pub container_name: String,
    /// Documents fetched per round trip when walking the collection.
    pub page_size: usize,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("appointments.db"),
            container_name: "appointments".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| AppointmentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppointmentError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_container_name(&self.container_name) {
            return Err(AppointmentError::Config(format!(
                "invalid container name '{}': use letters, digits and underscores",
                self.container_name
            )));
        }
        if self.page_size == 0 {
            return Err(AppointmentError::Config(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
