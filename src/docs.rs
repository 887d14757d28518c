use crate::api::attendance::{CheckInRequest, CheckOutRequest, HistoryQuery};
use crate::model::attendance::{AttendanceStatus, SubjectKind};
use crate::service::attendance::{CheckInOutcome, CheckOutOutcome, HistoryRow, TodayStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinic Attendance API",
        version = "1.0.0",
        description = r#"
## Dental Clinic Attendance Service

Geofenced attendance check-in/check-out for clinic staff.

### 🔹 Key Features
- **Geofence Verification**
  - Haversine distance against the configured clinic perimeter
- **Session Arbitration**
  - One open session per staff member per day
- **History & Roster**
  - Per-subject history and per-day roster views

### 📦 Response Format
- JSON-based RESTful responses

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today_status,
        crate::api::attendance::history,
        crate::api::attendance::roster
    ),
    components(
        schemas(
            CheckInRequest,
            CheckOutRequest,
            HistoryQuery,
            CheckInOutcome,
            CheckOutOutcome,
            TodayStatus,
            HistoryRow,
            SubjectKind,
            AttendanceStatus
        )
    ),
    tags(
        (name = "Attendance", description = "Geofenced attendance APIs"),
    )
)]
pub struct ApiDoc;
