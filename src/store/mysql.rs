use chrono::NaiveDate;
use sqlx::MySqlPool;

use super::{AttendanceStore, NewCheckIn, SessionClose, StoreError};
use crate::model::attendance::{working_hours, AttendanceRecord, SubjectKind};

const RECORD_COLUMNS: &str = "id, subject_id, subject_kind, date, check_in_time, \
     check_out_time, status, working_hours, location_coordinates, is_verified";

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// MySQL reports a `uq_subject_day` violation as SQLSTATE 23000
/// (error 1062).
fn is_duplicate_key_code(code: Option<&str>) -> bool {
    matches!(code, Some("23000") | Some("1062"))
}

fn map_check_in_insert_error(e: sqlx::Error) -> StoreError {
    // Two racing check-ins both see no row under FOR UPDATE; the loser's
    // insert trips the unique key and must surface as a duplicate session.
    if let sqlx::Error::Database(db_err) = &e {
        if is_duplicate_key_code(db_err.code().as_deref()) {
            return StoreError::OpenSessionExists;
        }
    }
    StoreError::Database(e)
}

impl AttendanceStore for MySqlAttendanceStore {
    async fn create_check_in(&self, new: NewCheckIn) -> Result<AttendanceRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock any existing row for this subject+day so a concurrent
        // check-in cannot slip past the duplicate check.
        let select_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE subject_id = ? AND subject_kind = ? AND date = ? \
             ORDER BY check_in_time DESC LIMIT 1 FOR UPDATE"
        );
        let existing: Option<AttendanceRecord> = sqlx::query_as(&select_sql)
            .bind(new.subject_id)
            .bind(new.subject_kind)
            .bind(new.date)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(record) = existing {
            return Err(if record.is_open() {
                StoreError::OpenSessionExists
            } else {
                StoreError::SessionComplete
            });
        }

        let result = sqlx::query(
            "INSERT INTO attendance_records \
             (subject_id, subject_kind, date, check_in_time, status, \
              location_coordinates, is_verified) \
             VALUES (?, ?, ?, ?, ?, ?, TRUE)",
        )
        .bind(new.subject_id)
        .bind(new.subject_kind)
        .bind(new.date)
        .bind(new.check_in_time)
        .bind(new.status)
        .bind(&new.location_coordinates)
        .execute(&mut *tx)
        .await
        .map_err(map_check_in_insert_error)?;

        tx.commit().await?;

        Ok(AttendanceRecord {
            id: result.last_insert_id(),
            subject_id: new.subject_id,
            subject_kind: new.subject_kind,
            date: new.date,
            check_in_time: new.check_in_time,
            check_out_time: None,
            status: new.status,
            working_hours: None,
            location_coordinates: new.location_coordinates,
            is_verified: true,
        })
    }

    async fn close_session(
        &self,
        id: u64,
        close: SessionClose,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let select_sql =
            format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ? FOR UPDATE");
        let record: Option<AttendanceRecord> = sqlx::query_as(&select_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(mut record) = record else {
            return Err(StoreError::NotFound);
        };
        if !record.is_open() {
            return Err(StoreError::AlreadyClosed);
        }

        let hours = working_hours(record.check_in_time, close.check_out_time);

        sqlx::query(
            "UPDATE attendance_records \
             SET check_out_time = ?, working_hours = ?, \
                 location_coordinates = ?, is_verified = TRUE \
             WHERE id = ?",
        )
        .bind(close.check_out_time)
        .bind(hours)
        .bind(&close.location_coordinates)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        record.check_out_time = Some(close.check_out_time);
        record.working_hours = Some(hours);
        record.location_coordinates = close.location_coordinates;
        record.is_verified = true;
        Ok(record)
    }

    async fn find_open(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE subject_id = ? AND subject_kind = ? AND date = ? \
               AND check_out_time IS NULL"
        );
        let record = sqlx::query_as(&sql)
            .bind(subject_id)
            .bind(subject_kind)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn history(
        &self,
        subject_id: u64,
        subject_kind: SubjectKind,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE subject_id = ? AND subject_kind = ? AND date >= ? \
             ORDER BY date DESC, check_in_time DESC"
        );
        let records = sqlx::query_as(&sql)
            .bind(subject_id)
            .bind(subject_kind)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE date = ? ORDER BY check_in_time"
        );
        let records = sqlx::query_as(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}
