//! Database Connection Pool using sqlx
//!
//! Owns the repositories and implements [`MeetupStore`] on PostgreSQL. Lock
//! tokens are open transactions holding a `FOR UPDATE` row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    applications, attendance, ledger, meetings, users, ApplicationRepository, MeetingRepository,
    MeetingTx, MeetupStore, ScoreLedgerRepository, StoreResult, UserRepository, UserTx,
};
use crate::models::{
    Application, ApplicationStatus, Attendance, AttendanceRecord, Meeting, MeetingStatus,
    ScoreEntry, ScoreReason, User,
};
use crate::reputation::clamp_score;

const SCHEMA: &[(&str, &str)] = &[
    ("schema", "CREATE SCHEMA IF NOT EXISTS letsmeet"),
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS letsmeet.users (
            id TEXT PRIMARY KEY,
            nickname TEXT NOT NULL,
            profile_image_url TEXT,
            trust_score INTEGER NOT NULL DEFAULT 0 CHECK (trust_score BETWEEN 0 AND 100),
            interests TEXT[] NOT NULL DEFAULT '{}',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "meetings",
        r#"
        CREATE TABLE IF NOT EXISTS letsmeet.meetings (
            id UUID PRIMARY KEY,
            host_id TEXT NOT NULL REFERENCES letsmeet.users(id),
            title VARCHAR(40) NOT NULL,
            description TEXT,
            meeting_date TIMESTAMPTZ NOT NULL,
            location TEXT NOT NULL,
            location_detail TEXT,
            category TEXT NOT NULL,
            max_participants INTEGER NOT NULL CHECK (max_participants BETWEEN 2 AND 20),
            interests TEXT[] NOT NULL DEFAULT '{}',
            participation_fee BIGINT NOT NULL DEFAULT 0 CHECK (participation_fee >= 0),
            gender_restriction TEXT NOT NULL DEFAULT 'all',
            age_range_min INTEGER,
            age_range_max INTEGER,
            status TEXT NOT NULL DEFAULT 'open',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "applications",
        r#"
        CREATE TABLE IF NOT EXISTS letsmeet.applications (
            id UUID PRIMARY KEY,
            meeting_id UUID NOT NULL REFERENCES letsmeet.meetings(id),
            user_id TEXT NOT NULL REFERENCES letsmeet.users(id),
            status TEXT NOT NULL DEFAULT 'pending',
            answers TEXT[] NOT NULL DEFAULT '{}',
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            reviewed_at TIMESTAMPTZ,
            CONSTRAINT applications_meeting_user_key UNIQUE (meeting_id, user_id)
        )
        "#,
    ),
    (
        "attendance",
        r#"
        CREATE TABLE IF NOT EXISTS letsmeet.attendance (
            id UUID PRIMARY KEY,
            meeting_id UUID NOT NULL REFERENCES letsmeet.meetings(id),
            user_id TEXT NOT NULL REFERENCES letsmeet.users(id),
            outcome TEXT NOT NULL,
            cancelled_at TIMESTAMPTZ,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT attendance_meeting_user_key UNIQUE (meeting_id, user_id)
        )
        "#,
    ),
    (
        "score_history",
        r#"
        CREATE TABLE IF NOT EXISTS letsmeet.score_history (
            seq BIGSERIAL,
            id UUID PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES letsmeet.users(id),
            delta INTEGER NOT NULL,
            reason TEXT NOT NULL,
            related_meeting_id UUID REFERENCES letsmeet.meetings(id),
            description TEXT,
            score_after INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "meetings index",
        "CREATE INDEX IF NOT EXISTS idx_meetings_open ON letsmeet.meetings (status, meeting_date)",
    ),
    (
        "applications index",
        "CREATE INDEX IF NOT EXISTS idx_applications_meeting ON letsmeet.applications (meeting_id, status)",
    ),
    (
        "score history index",
        "CREATE INDEX IF NOT EXISTS idx_score_history_user ON letsmeet.score_history (user_id, created_at DESC)",
    ),
];

pub struct DatabasePool {
    pool: PgPool,
    users: UserRepository,
    meetings: MeetingRepository,
    applications: ApplicationRepository,
    ledger: ScoreLedgerRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        info!(max_connections, "Connected to PostgreSQL");

        Ok(Self {
            users: UserRepository::new(pool.clone()),
            meetings: MeetingRepository::new(pool.clone()),
            applications: ApplicationRepository::new(pool.clone()),
            ledger: ScoreLedgerRepository::new(pool.clone()),
            pool,
        })
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        info!("Initializing database schema...");

        for (name, statement) in SCHEMA {
            debug!(object = *name, "Applying schema statement");
            sqlx::query(*statement).execute(&self.pool).await?;
        }

        info!("Database schema initialized");
        Ok(())
    }
}

/// Meeting lock held as `SELECT ... FOR UPDATE` inside an open transaction
pub struct PgMeetingTx {
    tx: Transaction<'static, Postgres>,
    meeting: Meeting,
}

#[async_trait]
impl MeetingTx for PgMeetingTx {
    fn meeting(&self) -> &Meeting {
        &self.meeting
    }

    async fn approved_count(&mut self) -> StoreResult<u32> {
        applications::count_approved(&mut *self.tx, self.meeting.id).await
    }

    async fn application(&mut self, application_id: Uuid) -> StoreResult<Option<Application>> {
        let found = applications::fetch_application(&mut *self.tx, application_id).await?;
        Ok(found.filter(|app| app.meeting_id == self.meeting.id))
    }

    async fn application_of(&mut self, user_id: &str) -> StoreResult<Option<Application>> {
        applications::find_by_applicant(&mut *self.tx, self.meeting.id, user_id).await
    }

    async fn insert_application(&mut self, application: &Application) -> StoreResult<()> {
        applications::insert_application(&mut *self.tx, application).await
    }

    async fn set_application_status(
        &mut self,
        application_id: Uuid,
        status: ApplicationStatus,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Application> {
        applications::update_status(&mut *self.tx, application_id, status, reviewed_at).await
    }

    async fn set_meeting_status(&mut self, status: MeetingStatus) -> StoreResult<()> {
        let now = Utc::now();
        meetings::update_status(&mut *self.tx, self.meeting.id, status, now).await?;
        self.meeting.status = status;
        self.meeting.updated_at = now;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// User lock held on the profile row; ledger and cached score move together
pub struct PgUserTx {
    tx: Transaction<'static, Postgres>,
    user: User,
}

#[async_trait]
impl UserTx for PgUserTx {
    fn user(&self) -> &User {
        &self.user
    }

    async fn attendance_record(&mut self) -> StoreResult<AttendanceRecord> {
        attendance::attendance_record(&mut *self.tx, &self.user.id).await
    }

    async fn insert_attendance(&mut self, attendance: &Attendance) -> StoreResult<()> {
        attendance::insert_attendance(&mut *self.tx, attendance).await
    }

    async fn count_entries(&mut self, reason: ScoreReason) -> StoreResult<u32> {
        ledger::count_entries(&mut *self.tx, &self.user.id, reason).await
    }

    async fn meeting_entry(
        &mut self,
        reason: ScoreReason,
        meeting_id: Uuid,
    ) -> StoreResult<Option<ScoreEntry>> {
        ledger::find_meeting_entry(&mut *self.tx, &self.user.id, reason, meeting_id).await
    }

    async fn append_score(&mut self, entry: ScoreEntry) -> StoreResult<ScoreEntry> {
        let score = clamp_score(self.user.trust_score.saturating_add(entry.delta));
        let entry = ScoreEntry {
            score_after: score,
            ..entry
        };

        ledger::insert_entry(&mut *self.tx, &entry).await?;
        ledger::set_cached_score(&mut *self.tx, &self.user.id, score).await?;
        self.user.trust_score = score;

        Ok(entry)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl MeetupStore for DatabasePool {
    type MeetingTx = PgMeetingTx;
    type UserTx = PgUserTx;

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.users.get_user(user_id).await
    }

    async fn get_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>> {
        self.users.get_users(user_ids).await
    }

    async fn create_user(&self, user: &User, initial: ScoreEntry) -> StoreResult<User> {
        self.users.create_user(user, initial).await
    }

    async fn update_profile(&self, user: &User) -> StoreResult<()> {
        self.users.update_profile(user).await
    }

    async fn score_history(&self, user_id: &str) -> StoreResult<Vec<ScoreEntry>> {
        self.ledger.history(user_id).await
    }

    async fn lock_user(&self, user_id: &str) -> StoreResult<Option<PgUserTx>> {
        let mut tx = self.pool.begin().await?;
        match users::lock_user_row(&mut *tx, user_id).await? {
            Some(user) => Ok(Some(PgUserTx { tx, user })),
            None => Ok(None),
        }
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()> {
        self.meetings.insert_meeting(meeting).await
    }

    async fn get_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<Meeting>> {
        self.meetings.get_meeting(meeting_id).await
    }

    async fn list_open_meetings(
        &self,
        after: DateTime<Utc>,
        interests: &[String],
    ) -> StoreResult<Vec<Meeting>> {
        self.meetings.list_open(after, interests).await
    }

    async fn lock_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<PgMeetingTx>> {
        let mut tx = self.pool.begin().await?;
        match meetings::lock_meeting_row(&mut *tx, meeting_id).await? {
            Some(meeting) => Ok(Some(PgMeetingTx { tx, meeting })),
            None => Ok(None),
        }
    }

    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        self.applications.get_application(application_id).await
    }

    async fn find_application(
        &self,
        meeting_id: Uuid,
        user_id: &str,
    ) -> StoreResult<Option<Application>> {
        self.applications.find_application(meeting_id, user_id).await
    }

    async fn list_applications(&self, meeting_id: Uuid) -> StoreResult<Vec<Application>> {
        self.applications.list_for_meeting(meeting_id).await
    }

    async fn count_approved(&self, meeting_id: Uuid) -> StoreResult<u32> {
        self.applications.count_approved(meeting_id).await
    }
}
