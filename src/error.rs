use derive_more::Display;

use crate::store::StoreError;

/// Attendance failure taxonomy. Every variant maps to a structured JSON
/// response in the API layer; none aborts the process.
#[derive(Debug, Display)]
pub enum AttendanceError {
    /// Caller is outside the authorized clinic perimeter.
    #[display(fmt = "outside the authorized clinic perimeter")]
    Location,
    /// A record already exists for this subject today. `completed` tells
    /// whether it is still open or the day's session is already finished.
    #[display(fmt = "an attendance record already exists for today (completed: {})", completed)]
    DuplicateSession { completed: bool },
    /// Check-out target missing or already closed.
    #[display(fmt = "attendance record unavailable (already closed: {})", already_closed)]
    SessionNotFound { already_closed: bool },
    #[display(fmt = "persistence failure: {}", _0)]
    Persistence(StoreError),
}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OpenSessionExists => AttendanceError::DuplicateSession { completed: false },
            StoreError::SessionComplete => AttendanceError::DuplicateSession { completed: true },
            StoreError::NotFound => AttendanceError::SessionNotFound {
                already_closed: false,
            },
            StoreError::AlreadyClosed => AttendanceError::SessionNotFound {
                already_closed: true,
            },
            other => AttendanceError::Persistence(other),
        }
    }
}
