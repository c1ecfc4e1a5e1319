//! User Repository - PostgreSQL operations for profiles using sqlx

use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgExecutor, Row};
use tracing::debug;

use super::ledger::{insert_entry, set_cached_score};
use super::StoreResult;
use crate::models::{ScoreEntry, User};
use crate::reputation::clamp_score;

const USER_COLUMNS: &str = "id, nickname, profile_image_url, trust_score, interests, is_active, created_at, updated_at";

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        fetch_user(&self.pool, user_id).await
    }

    pub async fn get_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM letsmeet.users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Insert the profile and its initial ledger entry in one transaction
    pub async fn create_user(&self, user: &User, initial: ScoreEntry) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO letsmeet.users
                (id, nickname, profile_image_url, trust_score, interests, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, $6, $7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.nickname)
        .bind(&user.profile_image_url)
        .bind(&user.interests)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await?;

        let score = clamp_score(initial.delta);
        let entry = ScoreEntry {
            score_after: score,
            ..initial
        };
        insert_entry(&mut *tx, &entry).await?;
        set_cached_score(&mut *tx, &user.id, score).await?;

        tx.commit().await?;

        debug!(user_id = %user.id, score, "User created");
        Ok(User {
            trust_score: score,
            ..user.clone()
        })
    }

    pub async fn update_profile(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE letsmeet.users
            SET nickname = $2,
                profile_image_url = $3,
                interests = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(&user.id)
        .bind(&user.nickname)
        .bind(&user.profile_image_url)
        .bind(&user.interests)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(super::StoreError::Missing(format!("user {}", user.id)));
        }
        Ok(())
    }
}

pub(crate) async fn fetch_user<'e, E>(executor: E, user_id: &str) -> StoreResult<Option<User>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM letsmeet.users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Read a user and hold its row lock until the transaction ends
pub(crate) async fn lock_user_row<'e, E>(executor: E, user_id: &str) -> StoreResult<Option<User>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM letsmeet.users WHERE id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub(crate) fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        nickname: row.try_get("nickname")?,
        profile_image_url: row.try_get("profile_image_url")?,
        trust_score: row.try_get("trust_score")?,
        interests: row.try_get("interests")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
