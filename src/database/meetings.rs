//! Meeting Repository - PostgreSQL operations for meetings using sqlx

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgExecutor, Row};
use tracing::debug;
use uuid::Uuid;

use super::StoreResult;
use crate::models::{Meeting, MeetingStatus};

const MEETING_COLUMNS: &str = "id, host_id, title, description, meeting_date, location, location_detail, \
     category, max_participants, interests, participation_fee, gender_restriction, \
     age_range_min, age_range_max, status, created_at, updated_at";

pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO letsmeet.meetings
            (id, host_id, title, description, meeting_date, location, location_detail,
             category, max_participants, interests, participation_fee, gender_restriction,
             age_range_min, age_range_max, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(meeting.id)
        .bind(&meeting.host_id)
        .bind(&meeting.title)
        .bind(&meeting.description)
        .bind(meeting.meeting_date)
        .bind(&meeting.location)
        .bind(&meeting.location_detail)
        .bind(&meeting.category)
        .bind(meeting.max_participants as i32)
        .bind(&meeting.interests)
        .bind(meeting.participation_fee)
        .bind(meeting.gender_restriction.as_str())
        .bind(meeting.age_range_min.map(|age| age as i32))
        .bind(meeting.age_range_max.map(|age| age as i32))
        .bind(meeting.status.as_str())
        .bind(meeting.created_at)
        .bind(meeting.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(meeting_id = %meeting.id, "Meeting inserted");
        Ok(())
    }

    pub async fn get_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<Meeting>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM letsmeet.meetings WHERE id = $1",
            MEETING_COLUMNS
        ))
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(meeting_from_row).transpose()
    }

    pub async fn list_open(
        &self,
        after: DateTime<Utc>,
        interests: &[String],
    ) -> StoreResult<Vec<Meeting>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM letsmeet.meetings
            WHERE status = 'open' AND meeting_date > $1 AND interests @> $2
            ORDER BY meeting_date ASC
            "#,
            MEETING_COLUMNS
        ))
        .bind(after)
        .bind(interests.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(meeting_from_row).collect()
    }
}

/// Read a meeting and hold its row lock until the transaction ends
pub(crate) async fn lock_meeting_row<'e, E>(
    executor: E,
    meeting_id: Uuid,
) -> StoreResult<Option<Meeting>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM letsmeet.meetings WHERE id = $1 FOR UPDATE",
        MEETING_COLUMNS
    ))
    .bind(meeting_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(meeting_from_row).transpose()
}

pub(crate) async fn update_status<'e, E>(
    executor: E,
    meeting_id: Uuid,
    status: MeetingStatus,
    updated_at: DateTime<Utc>,
) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE letsmeet.meetings SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(meeting_id)
        .bind(status.as_str())
        .bind(updated_at)
        .execute(executor)
        .await?;

    Ok(())
}

pub(crate) fn meeting_from_row(row: &PgRow) -> StoreResult<Meeting> {
    let max_participants: i32 = row.try_get("max_participants")?;
    let age_range_min: Option<i32> = row.try_get("age_range_min")?;
    let age_range_max: Option<i32> = row.try_get("age_range_max")?;
    let gender_restriction: String = row.try_get("gender_restriction")?;
    let status: String = row.try_get("status")?;

    Ok(Meeting {
        id: row.try_get("id")?,
        host_id: row.try_get("host_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        meeting_date: row.try_get("meeting_date")?,
        location: row.try_get("location")?,
        location_detail: row.try_get("location_detail")?,
        category: row.try_get("category")?,
        max_participants: max_participants.max(0) as u32,
        interests: row.try_get("interests")?,
        participation_fee: row.try_get("participation_fee")?,
        gender_restriction: gender_restriction.parse()?,
        age_range_min: age_range_min.map(|age| age.max(0) as u32),
        age_range_max: age_range_max.map(|age| age.max(0) as u32),
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
