//! Application Repository - PostgreSQL operations for applications using sqlx
//!
//! `(meeting_id, user_id)` carries a UNIQUE constraint; duplicate inserts
//! surface as `StoreError::UniqueViolation`.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::models::{Application, ApplicationStatus};

const APPLICATION_COLUMNS: &str =
    "id, meeting_id, user_id, status, answers, applied_at, reviewed_at";

pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        fetch_application(&self.pool, application_id).await
    }

    pub async fn find_application(
        &self,
        meeting_id: Uuid,
        user_id: &str,
    ) -> StoreResult<Option<Application>> {
        find_by_applicant(&self.pool, meeting_id, user_id).await
    }

    /// Newest first
    pub async fn list_for_meeting(&self, meeting_id: Uuid) -> StoreResult<Vec<Application>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM letsmeet.applications WHERE meeting_id = $1 ORDER BY applied_at DESC, id DESC",
            APPLICATION_COLUMNS
        ))
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(application_from_row).collect()
    }

    pub async fn count_approved(&self, meeting_id: Uuid) -> StoreResult<u32> {
        count_approved(&self.pool, meeting_id).await
    }
}

pub(crate) async fn fetch_application<'e, E>(
    executor: E,
    application_id: Uuid,
) -> StoreResult<Option<Application>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM letsmeet.applications WHERE id = $1",
        APPLICATION_COLUMNS
    ))
    .bind(application_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(application_from_row).transpose()
}

pub(crate) async fn find_by_applicant<'e, E>(
    executor: E,
    meeting_id: Uuid,
    user_id: &str,
) -> StoreResult<Option<Application>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM letsmeet.applications WHERE meeting_id = $1 AND user_id = $2",
        APPLICATION_COLUMNS
    ))
    .bind(meeting_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(application_from_row).transpose()
}

pub(crate) async fn count_approved<'e, E>(executor: E, meeting_id: Uuid) -> StoreResult<u32>
where
    E: PgExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM letsmeet.applications WHERE meeting_id = $1 AND status = 'approved'",
    )
    .bind(meeting_id)
    .fetch_one(executor)
    .await?;

    Ok(count as u32)
}

pub(crate) async fn insert_application<'e, E>(
    executor: E,
    application: &Application,
) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO letsmeet.applications
            (id, meeting_id, user_id, status, answers, applied_at, reviewed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(application.id)
    .bind(application.meeting_id)
    .bind(&application.user_id)
    .bind(application.status.as_str())
    .bind(&application.answers)
    .bind(application.applied_at)
    .bind(application.reviewed_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn update_status<'e, E>(
    executor: E,
    application_id: Uuid,
    status: ApplicationStatus,
    reviewed_at: Option<DateTime<Utc>>,
) -> StoreResult<Application>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        r#"
        UPDATE letsmeet.applications
        SET status = $2, reviewed_at = COALESCE($3, reviewed_at)
        WHERE id = $1
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(application_id)
    .bind(status.as_str())
    .bind(reviewed_at)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => application_from_row(&row),
        None => Err(StoreError::Missing(format!("application {}", application_id))),
    }
}

pub(crate) fn application_from_row(row: &PgRow) -> StoreResult<Application> {
    let status: String = row.try_get("status")?;

    Ok(Application {
        id: row.try_get("id")?,
        meeting_id: row.try_get("meeting_id")?,
        user_id: row.try_get("user_id")?,
        status: status.parse()?,
        answers: row.try_get("answers")?,
        applied_at: row.try_get("applied_at")?,
        reviewed_at: row.try_get("reviewed_at")?,
    })
}
