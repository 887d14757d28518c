use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AttendanceError;
use crate::geo::{Geofence, GeoPoint};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, SubjectKind};
use crate::store::{AttendanceStore, NewCheckIn, SessionClose};

pub const DEFAULT_HISTORY_DAYS: u32 = 30;
/// Upper bound on the history window; keeps caller-supplied day counts
/// from overflowing the date arithmetic.
pub const MAX_HISTORY_DAYS: u32 = 3650;

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckInOutcome {
    pub record_id: u64,
    #[schema(example = "2026-03-02T09:05:00", value_type = String)]
    pub check_in_time: NaiveDateTime,
    pub status: AttendanceStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckOutOutcome {
    #[schema(example = "2026-03-02T17:00:00", value_type = String)]
    pub check_out_time: NaiveDateTime,
    #[schema(example = 7.92)]
    pub working_hours: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TodayStatus {
    pub is_checked_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "2026-03-02T09:05:00", value_type = String)]
    pub check_in_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttendanceStatus>,
}

/// Display row for the history endpoint: dates as `YYYY-MM-DD`, times in
/// 12-hour clock, working hours fixed to 2 decimals.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryRow {
    pub record_id: u64,
    #[schema(example = "2026-03-02")]
    pub date: String,
    #[schema(example = "09:05 AM")]
    pub check_in: String,
    #[schema(example = "05:00 PM")]
    pub check_out: Option<String>,
    pub status: AttendanceStatus,
    #[schema(example = "7.92")]
    pub working_hours: Option<String>,
    pub location: String,
    pub is_verified: bool,
}

impl HistoryRow {
    fn from_record(record: &AttendanceRecord) -> Self {
        Self {
            record_id: record.id,
            date: record.date.format("%Y-%m-%d").to_string(),
            check_in: record.check_in_time.format("%I:%M %p").to_string(),
            check_out: record
                .check_out_time
                .map(|t| t.format("%I:%M %p").to_string()),
            status: record.status,
            working_hours: record.working_hours.map(|h| format!("{h:.2}")),
            location: record.location_coordinates.clone(),
            is_verified: record.is_verified,
        }
    }
}

/// Geofenced check-in/check-out arbitration. Holds the injected clinic
/// geofence and the persistence collaborator; all decisions flow through
/// here so the handlers stay thin.
#[derive(Clone)]
pub struct AttendanceService<S> {
    store: S,
    geofence: Geofence,
}

impl<S: AttendanceStore> AttendanceService<S> {
    pub fn new(store: S, geofence: Geofence) -> Self {
        Self { store, geofence }
    }

    pub async fn check_in(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        location: GeoPoint,
    ) -> Result<CheckInOutcome, AttendanceError> {
        if !self.geofence.contains(location) {
            return Err(AttendanceError::Location);
        }

        let now = Local::now().naive_local();
        let record = self
            .store
            .create_check_in(NewCheckIn {
                subject_id,
                subject_kind,
                date: now.date(),
                check_in_time: now,
                status: AttendanceStatus::classify(now),
                location_coordinates: coordinates(location),
            })
            .await?;

        tracing::info!(
            record_id = record.id,
            subject_id,
            kind = %subject_kind,
            status = %record.status,
            "checked in"
        );

        Ok(CheckInOutcome {
            record_id: record.id,
            check_in_time: record.check_in_time,
            status: record.status,
        })
    }

    pub async fn check_out(
        &self,
        record_id: u64,
        location: GeoPoint,
    ) -> Result<CheckOutOutcome, AttendanceError> {
        if !self.geofence.contains(location) {
            return Err(AttendanceError::Location);
        }

        let now = Local::now().naive_local();
        let record = self
            .store
            .close_session(
                record_id,
                SessionClose {
                    check_out_time: now,
                    location_coordinates: coordinates(location),
                },
            )
            .await?;

        // close_session always fills these on success
        let check_out_time = record.check_out_time.unwrap_or(now);
        let working_hours = record.working_hours.unwrap_or_default();

        tracing::info!(record_id, working_hours, "checked out");

        Ok(CheckOutOutcome {
            check_out_time,
            working_hours,
        })
    }

    pub async fn today_status(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
    ) -> Result<TodayStatus, AttendanceError> {
        let today = Local::now().date_naive();
        let open = self.store.find_open(subject_id, subject_kind, today).await?;

        Ok(match open {
            Some(record) => TodayStatus {
                is_checked_in: true,
                record_id: Some(record.id),
                check_in_time: Some(record.check_in_time),
                status: Some(record.status),
            },
            None => TodayStatus {
                is_checked_in: false,
                record_id: None,
                check_in_time: None,
                status: None,
            },
        })
    }

    pub async fn history(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        days: u32,
    ) -> Result<Vec<HistoryRow>, AttendanceError> {
        let days = days.min(MAX_HISTORY_DAYS);
        let since = Local::now().date_naive() - Duration::days(days as i64);
        let records = self.store.history(subject_id, subject_kind, since).await?;
        Ok(records.iter().map(HistoryRow::from_record).collect())
    }

    /// Manager roster: every record for one calendar day.
    pub async fn roster(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        Ok(self.store.list_by_date(date).await?)
    }
}

fn coordinates(location: GeoPoint) -> String {
    format!("{},{}", location.latitude, location.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    const CLINIC: GeoPoint = GeoPoint {
        latitude: 30.0122589,
        longitude: 30.9870651,
    };
    const RADIUS_M: u32 = 2000;

    // Far outside any 2 km fence around the clinic.
    const ELSEWHERE: GeoPoint = GeoPoint {
        latitude: 31.0122589,
        longitude: 30.9870651,
    };

    /// One mutex covers the duplicate check and the insert, mirroring the
    /// transactional contract of the MySQL store.
    #[derive(Default)]
    struct MemStore {
        records: Mutex<Vec<AttendanceRecord>>,
    }

    impl AttendanceStore for &MemStore {
        async fn create_check_in(
            &self,
            new: NewCheckIn,
        ) -> Result<AttendanceRecord, StoreError> {
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records.iter().find(|r| {
                r.subject_id == new.subject_id
                    && r.subject_kind == new.subject_kind
                    && r.date == new.date
            }) {
                return Err(if existing.is_open() {
                    StoreError::OpenSessionExists
                } else {
                    StoreError::SessionComplete
                });
            }
            let record = AttendanceRecord {
                id: records.len() as u64 + 1,
                subject_id: new.subject_id,
                subject_kind: new.subject_kind,
                date: new.date,
                check_in_time: new.check_in_time,
                check_out_time: None,
                status: new.status,
                working_hours: None,
                location_coordinates: new.location_coordinates,
                is_verified: true,
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn close_session(
            &self,
            id: u64,
            close: SessionClose,
        ) -> Result<AttendanceRecord, StoreError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(StoreError::NotFound)?;
            if !record.is_open() {
                return Err(StoreError::AlreadyClosed);
            }
            record.check_out_time = Some(close.check_out_time);
            record.working_hours = Some(crate::model::attendance::working_hours(
                record.check_in_time,
                close.check_out_time,
            ));
            record.location_coordinates = close.location_coordinates;
            record.is_verified = true;
            Ok(record.clone())
        }

        async fn find_open(
            &self,
            subject_id: u64,
            subject_kind: SubjectKind,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .find(|r| {
                    r.subject_id == subject_id
                        && r.subject_kind == subject_kind
                        && r.date == date
                        && r.is_open()
                })
                .cloned())
        }

        async fn history(
            &self,
            subject_id: u64,
            subject_kind: SubjectKind,
            since: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            let mut out: Vec<_> = records
                .iter()
                .filter(|r| {
                    r.subject_id == subject_id
                        && r.subject_kind == subject_kind
                        && r.date >= since
                })
                .cloned()
                .collect();
            out.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then(b.check_in_time.cmp(&a.check_in_time))
            });
            Ok(out)
        }

        async fn list_by_date(
            &self,
            date: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().filter(|r| r.date == date).cloned().collect())
        }
    }

    fn service(store: &MemStore) -> AttendanceService<&MemStore> {
        AttendanceService::new(store, Geofence::new(CLINIC, RADIUS_M))
    }

    #[actix_web::test]
    async fn check_in_at_clinic_center_succeeds() {
        let store = MemStore::default();
        let outcome = service(&store).check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();

        assert_eq!(outcome.record_id, 1);
        let records = store.records.lock().unwrap();
        assert!(records[0].is_open());
        assert!(records[0].is_verified);
        assert_eq!(records[0].location_coordinates, "30.0122589,30.9870651");
    }

    #[actix_web::test]
    async fn check_in_outside_fence_is_rejected() {
        let store = MemStore::default();
        let err = service(&store)
            .check_in(7, SubjectKind::Doctor, ELSEWHERE)
            .await
            .unwrap_err();

        assert!(matches!(err, AttendanceError::Location));
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn second_check_in_same_day_is_duplicate() {
        let store = MemStore::default();
        let svc = service(&store);
        svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();

        let err = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::DuplicateSession { completed: false }
        ));
    }

    #[actix_web::test]
    async fn check_in_after_checkout_is_still_blocked_for_the_day() {
        let store = MemStore::default();
        let svc = service(&store);
        let first = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();
        svc.check_out(first.record_id, CLINIC).await.unwrap();

        let err = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::DuplicateSession { completed: true }
        ));
    }

    #[actix_web::test]
    async fn same_subject_id_different_kind_may_both_check_in() {
        let store = MemStore::default();
        let svc = service(&store);
        svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();
        svc.check_in(7, SubjectKind::Receptionist, CLINIC).await.unwrap();
    }

    #[actix_web::test]
    async fn check_out_closes_the_session() {
        let store = MemStore::default();
        let svc = service(&store);
        let checked_in = svc.check_in(7, SubjectKind::Receptionist, CLINIC).await.unwrap();

        let outcome = svc.check_out(checked_in.record_id, CLINIC).await.unwrap();
        assert!(outcome.working_hours >= 0.0);

        let records = store.records.lock().unwrap();
        assert!(!records[0].is_open());
        assert_eq!(records[0].working_hours, Some(outcome.working_hours));
    }

    #[actix_web::test]
    async fn check_out_outside_fence_is_rejected() {
        let store = MemStore::default();
        let svc = service(&store);
        let checked_in = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();

        let err = svc.check_out(checked_in.record_id, ELSEWHERE).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Location));
        assert!(store.records.lock().unwrap()[0].is_open());
    }

    #[actix_web::test]
    async fn check_out_unknown_record_is_not_found() {
        let store = MemStore::default();
        let err = service(&store).check_out(99, CLINIC).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionNotFound {
                already_closed: false
            }
        ));
    }

    #[actix_web::test]
    async fn double_check_out_reports_already_closed() {
        let store = MemStore::default();
        let svc = service(&store);
        let checked_in = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();
        svc.check_out(checked_in.record_id, CLINIC).await.unwrap();

        let err = svc.check_out(checked_in.record_id, CLINIC).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::SessionNotFound {
                already_closed: true
            }
        ));
    }

    #[actix_web::test]
    async fn today_status_reflects_open_session() {
        let store = MemStore::default();
        let svc = service(&store);

        let before = svc.today_status(7, SubjectKind::Doctor).await.unwrap();
        assert!(!before.is_checked_in);
        assert!(before.record_id.is_none());

        let checked_in = svc.check_in(7, SubjectKind::Doctor, CLINIC).await.unwrap();
        let after = svc.today_status(7, SubjectKind::Doctor).await.unwrap();
        assert!(after.is_checked_in);
        assert_eq!(after.record_id, Some(checked_in.record_id));

        svc.check_out(checked_in.record_id, CLINIC).await.unwrap();
        let closed = svc.today_status(7, SubjectKind::Doctor).await.unwrap();
        assert!(!closed.is_checked_in);
    }

    #[actix_web::test]
    async fn history_is_ordered_and_formatted() {
        let store = MemStore::default();
        let today = Local::now().date_naive();

        // Seed two past days directly; ids don't collide with check-ins.
        let seed = |id: u64, days_ago: i64, h_in: u32, h_out: u32| {
            let date = today - Duration::days(days_ago);
            let check_in = date.and_hms_opt(h_in, 0, 0).unwrap();
            let check_out = date.and_hms_opt(h_out, 30, 0).unwrap();
            store.records.lock().unwrap().push(AttendanceRecord {
                id,
                subject_id: 7,
                subject_kind: SubjectKind::Doctor,
                date,
                check_in_time: check_in,
                check_out_time: Some(check_out),
                status: AttendanceStatus::Present,
                working_hours: Some(crate::model::attendance::working_hours(
                    check_in, check_out,
                )),
                location_coordinates: "30.0122589,30.9870651".into(),
                is_verified: true,
            });
        };
        seed(1, 2, 9, 13);
        seed(2, 1, 9, 17);

        let rows = service(&store)
            .history(7, SubjectKind::Doctor, DEFAULT_HISTORY_DAYS)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        // Most recent day first.
        assert_eq!(rows[0].record_id, 2);
        assert_eq!(rows[0].check_in, "09:00 AM");
        assert_eq!(rows[0].check_out.as_deref(), Some("05:30 PM"));
        assert_eq!(rows[0].working_hours.as_deref(), Some("8.50"));
        assert_eq!(rows[1].working_hours.as_deref(), Some("4.50"));
        assert_eq!(rows[1].date, (today - Duration::days(2)).format("%Y-%m-%d").to_string());
    }

    #[actix_web::test]
    async fn history_tolerates_oversized_day_window() {
        let store = MemStore::default();
        let today = Local::now().date_naive();
        store.records.lock().unwrap().push(AttendanceRecord {
            id: 1,
            subject_id: 7,
            subject_kind: SubjectKind::Doctor,
            date: today,
            check_in_time: today.and_hms_opt(9, 0, 0).unwrap(),
            check_out_time: None,
            status: AttendanceStatus::Present,
            working_hours: None,
            location_coordinates: "0,0".into(),
            is_verified: true,
        });

        // u32::MAX days must clamp, not overflow the date arithmetic.
        let rows = service(&store)
            .history(7, SubjectKind::Doctor, u32::MAX)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[actix_web::test]
    async fn history_window_excludes_older_records() {
        let store = MemStore::default();
        let today = Local::now().date_naive();
        let old_date = today - Duration::days(40);
        store.records.lock().unwrap().push(AttendanceRecord {
            id: 1,
            subject_id: 7,
            subject_kind: SubjectKind::Doctor,
            date: old_date,
            check_in_time: old_date.and_hms_opt(9, 0, 0).unwrap(),
            check_out_time: None,
            status: AttendanceStatus::Present,
            working_hours: None,
            location_coordinates: "0,0".into(),
            is_verified: true,
        });

        let rows = service(&store)
            .history(7, SubjectKind::Doctor, DEFAULT_HISTORY_DAYS)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
