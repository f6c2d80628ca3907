// src/entity/appointment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AppointmentRequestStatus {
    #[default]
    Proposed,
    Accepted,
    Declined,
    Cancelled,
}

impl std::fmt::Display for AppointmentRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentRequestStatus::Proposed => write!(f, "proposed"),
            AppointmentRequestStatus::Accepted => write!(f, "accepted"),
            AppointmentRequestStatus::Declined => write!(f, "declined"),
            AppointmentRequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for AppointmentRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proposed" => Ok(AppointmentRequestStatus::Proposed),
            "accepted" => Ok(AppointmentRequestStatus::Accepted),
            "declined" => Ok(AppointmentRequestStatus::Declined),
            "cancelled" | "canceled" => Ok(AppointmentRequestStatus::Cancelled),
            _ => Err(format!("Invalid appointment request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MeetingDuration {
    QuarterHour,
    HalfHour,
    #[default]
    Hour,
    TwoHours,
    HalfDay,
    FullDay,
}

impl MeetingDuration {
    pub fn minutes(self) -> u32 {
        match self {
            MeetingDuration::QuarterHour => 15,
            MeetingDuration::HalfHour => 30,
            MeetingDuration::Hour => 60,
            MeetingDuration::TwoHours => 120,
            MeetingDuration::HalfDay => 240,
            MeetingDuration::FullDay => 480,
        }
    }
}

impl std::fmt::Display for MeetingDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// A request for an appointment.
///
/// Carries business fields only. Identity and version live next to the value
/// in [`crate::repository::Tracked`], never inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRequest {
    pub creation_date: DateTime<Utc>,
    pub categories: Vec<String>,
    pub description: String,
    pub notes: String,
    pub status: AppointmentRequestStatus,
    pub duration: MeetingDuration,
    pub participants: Vec<String>,
    pub proposed_start_date_times: Vec<DateTime<Utc>>,
}

impl AppointmentRequest {
    pub fn new(
        description: impl Into<String>,
        notes: impl Into<String>,
        proposed_start_date_times: Vec<DateTime<Utc>>,
    ) -> Self {
        Self {
            creation_date: Utc::now(),
            categories: Vec::new(),
            description: description.into(),
            notes: notes.into(),
            status: AppointmentRequestStatus::default(),
            duration: MeetingDuration::default(),
            participants: Vec::new(),
            proposed_start_date_times,
        }
    }
}
