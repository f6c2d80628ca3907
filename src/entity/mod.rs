mod appointment;
mod etag;

pub use appointment::{AppointmentRequest, AppointmentRequestStatus, MeetingDuration};
pub use etag::ETag;
