//! Score Ledger Repository - append-only score history
//!
//! Entries are only written inside a user lock together with the cached
//! `trust_score` update; see `pool::PgUserTx`.

use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use super::StoreResult;
use crate::models::{ScoreEntry, ScoreReason};

pub struct ScoreLedgerRepository {
    pool: PgPool,
}

impl ScoreLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ledger entries for a user, newest first
    pub async fn history(&self, user_id: &str) -> StoreResult<Vec<ScoreEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, delta, reason, related_meeting_id, description, score_after, created_at
            FROM letsmeet.score_history
            WHERE user_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

pub(crate) async fn insert_entry<'e, E>(executor: E, entry: &ScoreEntry) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO letsmeet.score_history
            (id, user_id, delta, reason, related_meeting_id, description, score_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.user_id)
    .bind(entry.delta)
    .bind(entry.reason.as_str())
    .bind(entry.related_meeting_id)
    .bind(&entry.description)
    .bind(entry.score_after)
    .bind(entry.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn set_cached_score<'e, E>(executor: E, user_id: &str, score: i32) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE letsmeet.users SET trust_score = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(score)
        .execute(executor)
        .await?;

    Ok(())
}

pub(crate) async fn count_entries<'e, E>(
    executor: E,
    user_id: &str,
    reason: ScoreReason,
) -> StoreResult<u32>
where
    E: PgExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM letsmeet.score_history WHERE user_id = $1 AND reason = $2",
    )
    .bind(user_id)
    .bind(reason.as_str())
    .fetch_one(executor)
    .await?;

    Ok(count as u32)
}

pub(crate) async fn find_meeting_entry<'e, E>(
    executor: E,
    user_id: &str,
    reason: ScoreReason,
    meeting_id: Uuid,
) -> StoreResult<Option<ScoreEntry>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT id, user_id, delta, reason, related_meeting_id, description, score_after, created_at
        FROM letsmeet.score_history
        WHERE user_id = $1 AND reason = $2 AND related_meeting_id = $3
        ORDER BY seq ASC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(reason.as_str())
    .bind(meeting_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

fn entry_from_row(row: &PgRow) -> StoreResult<ScoreEntry> {
    let reason: String = row.try_get("reason")?;

    Ok(ScoreEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        delta: row.try_get("delta")?,
        reason: reason.parse()?,
        related_meeting_id: row.try_get("related_meeting_id")?,
        description: row.try_get("description")?,
        score_after: row.try_get("score_after")?,
        created_at: row.try_get("created_at")?,
    })
}
