pub mod mysql;

use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, SubjectKind};

#[derive(Debug, Display)]
pub enum StoreError {
    /// An open session already exists for (subject, date).
    #[display(fmt = "an open session already exists for this subject today")]
    OpenSessionExists,
    /// A completed session exists for (subject, date); the day is closed.
    #[display(fmt = "a completed session already exists for this subject today")]
    SessionComplete,
    #[display(fmt = "attendance record not found")]
    NotFound,
    #[display(fmt = "attendance record is already closed")]
    AlreadyClosed,
    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub subject_id: u64,
    pub subject_kind: SubjectKind,
    pub date: NaiveDate,
    pub check_in_time: NaiveDateTime,
    pub status: AttendanceStatus,
    pub location_coordinates: String,
}

#[derive(Debug, Clone)]
pub struct SessionClose {
    pub check_out_time: NaiveDateTime,
    pub location_coordinates: String,
}

/// Persistence seam for attendance records. The MySQL implementation backs
/// the server; tests drive the arbitration logic through an in-memory one.
pub trait AttendanceStore {
    /// Create a check-in record. The open/closed-session check for
    /// (subject, date) and the insert happen as one atomic unit, so two
    /// concurrent check-ins cannot both observe "no session" and insert.
    async fn create_check_in(&self, new: NewCheckIn) -> Result<AttendanceRecord, StoreError>;

    /// Close the session with the given id, setting check-out time,
    /// derived working hours, coordinates and the verified flag.
    /// Fails with `NotFound` or `AlreadyClosed`.
    async fn close_session(
        &self,
        id: u64,
        close: SessionClose,
    ) -> Result<AttendanceRecord, StoreError>;

    /// The open record for (subject, date), if any.
    async fn find_open(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Records for a subject since `since`, date descending then
    /// check-in time descending.
    async fn history(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// All records for one calendar day (manager roster view).
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError>;
}
