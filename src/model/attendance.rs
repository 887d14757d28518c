use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Workday starts at 09:00 local; check-ins after start + grace are Late.
pub const WORKDAY_START_HOUR: u32 = 9;
pub const LATE_GRACE_MINUTES: i64 = 15;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[sqlx(rename_all = "lowercase")]
pub enum SubjectKind {
    Doctor,
    Receptionist,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[sqlx(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl AttendanceStatus {
    /// Fixed at check-in from the 09:00 + 15 min cutoff; never recomputed
    /// at check-out.
    pub fn classify(check_in: NaiveDateTime) -> Self {
        let workday_start = check_in
            .date()
            .and_hms_opt(WORKDAY_START_HOUR, 0, 0)
            .unwrap();
        if check_in > workday_start + Duration::minutes(LATE_GRACE_MINUTES) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }
}

/// Session length in hours, rounded to 2 decimal places.
pub fn working_hours(check_in: NaiveDateTime, check_out: NaiveDateTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds() as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub subject_id: u64,
    pub subject_kind: SubjectKind,
    pub date: NaiveDate,
    pub check_in_time: NaiveDateTime,
    pub check_out_time: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub working_hours: Option<f64>,
    /// Last reported "lat,lon" pair, overwritten at check-in and check-out.
    pub location_coordinates: String,
    pub is_verified: bool,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}
