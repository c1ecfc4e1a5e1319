//! Attendance queries. Rows are only written through `pool::PgUserTx`.

use sqlx::{PgExecutor, Row};

use super::StoreResult;
use crate::models::{Attendance, AttendanceOutcome, AttendanceRecord};

pub(crate) async fn insert_attendance<'e, E>(executor: E, attendance: &Attendance) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO letsmeet.attendance
            (id, meeting_id, user_id, outcome, cancelled_at, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(attendance.id)
    .bind(attendance.meeting_id)
    .bind(&attendance.user_id)
    .bind(attendance.outcome.as_str())
    .bind(attendance.cancelled_at)
    .bind(attendance.recorded_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Tally a user's recorded outcomes
pub(crate) async fn attendance_record<'e, E>(executor: E, user_id: &str) -> StoreResult<AttendanceRecord>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT outcome, COUNT(*) AS total FROM letsmeet.attendance WHERE user_id = $1 GROUP BY outcome",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    let mut record = AttendanceRecord::default();
    for row in rows {
        let outcome: String = row.try_get("outcome")?;
        let total: i64 = row.try_get("total")?;
        let total = total as u32;
        match outcome.parse::<AttendanceOutcome>()? {
            AttendanceOutcome::Attended => record.attended = total,
            AttendanceOutcome::NoShow => record.no_shows = total,
            AttendanceOutcome::Cancelled => record.cancellations = total,
        }
    }

    Ok(record)
}
