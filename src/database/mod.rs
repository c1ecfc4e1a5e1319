//! Persistence Layer
//!
//! The core talks to storage through [`MeetupStore`]. Check-then-act
//! sequences run inside lock tokens handed out by the store:
//!
//! - [`MeetingTx`] serializes everything touching one meeting's applications
//!   (capacity checks, approvals, status changes).
//! - [`UserTx`] serializes ledger appends for one user so the cached score and
//!   the ledger never disagree.
//!
//! Dropping a token without calling `commit` discards its writes.
//!
//! Two implementations ship with the crate: [`DatabasePool`] on PostgreSQL
//! and [`MemoryStore`] for tests and local runs.

pub mod applications;
pub mod attendance;
pub mod ledger;
pub mod meetings;
pub mod memory;
pub mod pool;
pub mod users;

pub use applications::ApplicationRepository;
pub use ledger::ScoreLedgerRepository;
pub use meetings::MeetingRepository;
pub use memory::MemoryStore;
pub use pool::DatabasePool;
pub use users::UserRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Application, ApplicationStatus, Attendance, AttendanceRecord, Meeting, MeetingStatus,
    ParseTagError, ScoreEntry, ScoreReason, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0} not found")]
    Missing(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return StoreError::UniqueViolation(constraint);
        }
        StoreError::Database(err)
    }
}

impl From<ParseTagError> for StoreError {
    fn from(err: ParseTagError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional store behind the core operations
#[async_trait]
pub trait MeetupStore: Send + Sync + 'static {
    type MeetingTx: MeetingTx;
    type UserTx: UserTx;

    // Users

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;

    async fn get_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>>;

    /// Insert a profile together with its first ledger entry.
    /// Fails with `UniqueViolation` when the profile already exists.
    async fn create_user(&self, user: &User, initial: ScoreEntry) -> StoreResult<User>;

    /// Persist nickname, image and interests. Never touches the score.
    async fn update_profile(&self, user: &User) -> StoreResult<()>;

    /// Ledger entries for a user, newest first
    async fn score_history(&self, user_id: &str) -> StoreResult<Vec<ScoreEntry>>;

    /// Lock a user's ledger; `None` when the user does not exist
    async fn lock_user(&self, user_id: &str) -> StoreResult<Option<Self::UserTx>>;

    // Meetings

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()>;

    async fn get_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<Meeting>>;

    /// Open meetings scheduled after `after` carrying every tag in
    /// `interests`, soonest first
    async fn list_open_meetings(
        &self,
        after: DateTime<Utc>,
        interests: &[String],
    ) -> StoreResult<Vec<Meeting>>;

    /// Lock a meeting for a check-then-act sequence; `None` when absent
    async fn lock_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<Self::MeetingTx>>;

    // Applications

    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>>;

    async fn find_application(
        &self,
        meeting_id: Uuid,
        user_id: &str,
    ) -> StoreResult<Option<Application>>;

    /// Applications for a meeting, newest first
    async fn list_applications(&self, meeting_id: Uuid) -> StoreResult<Vec<Application>>;

    async fn count_approved(&self, meeting_id: Uuid) -> StoreResult<u32>;
}

/// Exclusive handle on one meeting and its applications
#[async_trait]
pub trait MeetingTx: Send {
    /// The meeting as read when the lock was taken, plus this token's writes
    fn meeting(&self) -> &Meeting;

    async fn approved_count(&mut self) -> StoreResult<u32>;

    async fn application(&mut self, application_id: Uuid) -> StoreResult<Option<Application>>;

    async fn application_of(&mut self, user_id: &str) -> StoreResult<Option<Application>>;

    /// Fails with `UniqueViolation` if the applicant already has a row
    async fn insert_application(&mut self, application: &Application) -> StoreResult<()>;

    async fn set_application_status(
        &mut self,
        application_id: Uuid,
        status: ApplicationStatus,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Application>;

    async fn set_meeting_status(&mut self, status: MeetingStatus) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;
}

/// Exclusive handle on one user's ledger and cached score
#[async_trait]
pub trait UserTx: Send {
    fn user(&self) -> &User;

    async fn attendance_record(&mut self) -> StoreResult<AttendanceRecord>;

    /// Fails with `UniqueViolation` if the (meeting, user) pair is recorded
    async fn insert_attendance(&mut self, attendance: &Attendance) -> StoreResult<()>;

    async fn count_entries(&mut self, reason: ScoreReason) -> StoreResult<u32>;

    /// The user's entry with this reason tied to `meeting_id`, if any
    async fn meeting_entry(
        &mut self,
        reason: ScoreReason,
        meeting_id: Uuid,
    ) -> StoreResult<Option<ScoreEntry>>;

    /// Append an entry and fold it into the cached score.
    /// Returns the entry with `score_after` filled in.
    async fn append_score(&mut self, entry: ScoreEntry) -> StoreResult<ScoreEntry>;

    async fn commit(self) -> StoreResult<()>;
}
