use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::entity::AppointmentRequestStatus;

#[derive(Parser, Debug)]
#[command(name = "appointments")]
#[command(version, about = "Appointment request service with optimistic concurrency")]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "appointments=trace" (RUST_LOG wins if set)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server until interrupted
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// SQLite database file (overrides the config file)
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },

    /// List stored appointment requests
    List {
        /// SQLite database file (overrides the config file)
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,

        /// Only show requests with this status (proposed, accepted, declined, cancelled)
        #[arg(long)]
        status: Option<AppointmentRequestStatus>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single appointment request
    Get {
        /// Appointment request ID (UUID)
        id: String,

        /// Only print the request if its entity tag differs from this one
        #[arg(long, value_name = "ETAG")]
        if_none_match: Option<String>,

        /// SQLite database file (overrides the config file)
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },

    /// Delete an appointment request
    Delete {
        /// Appointment request ID (UUID)
        id: String,

        /// Only delete if the stored entity tag still equals this one
        #[arg(long, value_name = "ETAG")]
        if_match: Option<String>,

        /// SQLite database file (overrides the config file)
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },
}
