use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::error::AttendanceError;
use crate::geo::GeoPoint;
use crate::model::attendance::SubjectKind;
use crate::service::attendance::{AttendanceService, DEFAULT_HISTORY_DAYS, HistoryRow, TodayStatus};
use crate::store::mysql::MySqlAttendanceStore;

type Service = AttendanceService<MySqlAttendanceStore>;

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[schema(example = 7)]
    pub subject_id: u64,
    #[schema(example = "doctor")]
    pub subject_kind: SubjectKind,
    #[schema(example = 30.0122589)]
    pub latitude: f64,
    #[schema(example = 30.9870651)]
    pub longitude: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutRequest {
    #[schema(example = 1)]
    pub record_id: u64,
    #[schema(example = 30.0122589)]
    pub latitude: f64,
    #[schema(example = 30.9870651)]
    pub longitude: f64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// How many days back to include (default 30)
    #[schema(example = 30)]
    pub days: Option<u32>,
}

fn reject(err: AttendanceError) -> HttpResponse {
    match err {
        AttendanceError::Location => HttpResponse::BadRequest().json(json!({
            "error": "location",
            "message": "You must be within clinic premises"
        })),
        AttendanceError::DuplicateSession { completed } => HttpResponse::BadRequest().json(json!({
            "error": "duplicate_session",
            "detail": if completed { "completed" } else { "open" },
            "message": if completed {
                "You have already completed a session today"
            } else {
                "You have already checked in today"
            }
        })),
        AttendanceError::SessionNotFound { already_closed } => {
            if already_closed {
                HttpResponse::BadRequest().json(json!({
                    "error": "session_not_found",
                    "reason": "already_closed",
                    "message": "You have already checked out"
                }))
            } else {
                HttpResponse::NotFound().json(json!({
                    "error": "session_not_found",
                    "reason": "not_found",
                    "message": "Attendance record not found"
                }))
            }
        }
        AttendanceError::Persistence(e) => {
            error!(error = %e, "attendance persistence failure");
            HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }))
        }
    }
}

fn parse_point(latitude: f64, longitude: f64) -> Result<GeoPoint, HttpResponse> {
    let point = GeoPoint::new(latitude, longitude);
    if !point.is_valid() {
        return Err(HttpResponse::BadRequest().json(json!({
            "error": "invalid_coordinates",
            "message": "Latitude must be in [-90, 90] and longitude in [-180, 180]"
        })));
    }
    Ok(point)
}

/// Geofenced check-in
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "record_id": 1,
            "check_in_time": "2026-03-02T09:05:00",
            "status": "present",
            "message": "Checked in successfully"
        })),
        (status = 400, description = "Outside geofence or already checked in", body = Object, example = json!({
            "error": "duplicate_session",
            "detail": "open",
            "message": "You have already checked in today"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    service: web::Data<Service>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    let point = match parse_point(payload.latitude, payload.longitude) {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    match service
        .check_in(payload.subject_id, payload.subject_kind, point)
        .await
    {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "record_id": outcome.record_id,
            "check_in_time": outcome.check_in_time,
            "status": outcome.status,
            "message": "Checked in successfully"
        }))),
        Err(e) => Ok(reject(e)),
    }
}

/// Geofenced check-out
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "check_out_time": "2026-03-02T17:00:00",
            "working_hours": 7.92,
            "message": "Checked out successfully"
        })),
        (status = 400, description = "Outside geofence or already checked out"),
        (status = 404, description = "Attendance record not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    service: web::Data<Service>,
    payload: web::Json<CheckOutRequest>,
) -> actix_web::Result<impl Responder> {
    let point = match parse_point(payload.latitude, payload.longitude) {
        Ok(p) => p,
        Err(resp) => return Ok(resp),
    };

    match service.check_out(payload.record_id, point).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "check_out_time": outcome.check_out_time,
            "working_hours": outcome.working_hours,
            "message": "Checked out successfully"
        }))),
        Err(e) => Ok(reject(e)),
    }
}

/// Today's attendance status for a subject
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today/{subject_kind}/{subject_id}",
    params(
        ("subject_kind", Path, description = "doctor or receptionist"),
        ("subject_id", Path, description = "Staff member ID")
    ),
    responses(
        (status = 200, description = "Today's status", body = TodayStatus),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn today_status(
    service: web::Data<Service>,
    path: web::Path<(SubjectKind, u64)>,
) -> actix_web::Result<impl Responder> {
    let (subject_kind, subject_id) = path.into_inner();

    match service.today_status(subject_id, subject_kind).await {
        Ok(status) => Ok(HttpResponse::Ok().json(status)),
        Err(e) => Ok(reject(e)),
    }
}

/// Attendance history for a subject, most recent first
#[utoipa::path(
    get,
    path = "/api/v1/attendance/history/{subject_kind}/{subject_id}",
    params(
        ("subject_kind", Path, description = "doctor or receptionist"),
        ("subject_id", Path, description = "Staff member ID"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "History rows, date descending", body = [HistoryRow]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn history(
    service: web::Data<Service>,
    path: web::Path<(SubjectKind, u64)>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let (subject_kind, subject_id) = path.into_inner();
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);

    match service.history(subject_id, subject_kind, days).await {
        Ok(rows) => Ok(HttpResponse::Ok().json(rows)),
        Err(e) => Ok(reject(e)),
    }
}

/// Roster: all attendance records for one calendar day
#[utoipa::path(
    get,
    path = "/api/v1/attendance/roster/{date}",
    params(
        ("date", Path, description = "Calendar day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Records for the day"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn roster(
    service: web::Data<Service>,
    path: web::Path<NaiveDate>,
) -> actix_web::Result<impl Responder> {
    let date = path.into_inner();

    match service.roster(date).await {
        Ok(records) => Ok(HttpResponse::Ok().json(records)),
        Err(e) => Ok(reject(e)),
    }
}
