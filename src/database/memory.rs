//! In-memory store
//!
//! Backs tests and local runs without PostgreSQL. Lock tokens hold an owned
//! per-key mutex and stage their writes; `commit` applies them, dropping the
//! token discards them. Map locks are always taken in the order users,
//! applications, attendance, ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{MeetingTx, MeetupStore, StoreError, StoreResult, UserTx};
use crate::models::{
    Application, ApplicationStatus, Attendance, AttendanceRecord, Meeting, MeetingStatus,
    ScoreEntry, ScoreReason, User,
};
use crate::reputation::clamp_score;

const APPLICATION_KEY: &str = "applications_meeting_user_key";
const ATTENDANCE_KEY: &str = "attendance_meeting_user_key";
const USER_KEY: &str = "users_pkey";

#[derive(Default)]
struct MemoryState {
    users: RwLock<HashMap<String, User>>,
    meetings: RwLock<HashMap<Uuid, Meeting>>,
    applications: RwLock<HashMap<Uuid, Application>>,
    attendance: RwLock<Vec<Attendance>>,
    ledger: RwLock<Vec<ScoreEntry>>,
    meeting_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

async fn acquire<K>(locks: &DashMap<K, Arc<Mutex<()>>>, key: K) -> OwnedMutexGuard<()>
where
    K: Eq + Hash,
{
    // Clone the Arc out so no map shard stays borrowed across the await
    let lock = locks.entry(key).or_default().clone();
    lock.lock_owned().await
}

pub struct MemoryMeetingTx {
    _guard: OwnedMutexGuard<()>,
    state: Arc<MemoryState>,
    meeting: Meeting,
    meeting_dirty: bool,
    staged: HashMap<Uuid, Application>,
}

impl MemoryMeetingTx {
    /// Committed applications for this meeting with staged writes laid over them
    async fn applications(&self) -> Vec<Application> {
        let applications = self.state.applications.read().await;
        let mut merged: Vec<Application> = applications
            .values()
            .filter(|app| app.meeting_id == self.meeting.id && !self.staged.contains_key(&app.id))
            .cloned()
            .collect();
        merged.extend(self.staged.values().cloned());
        merged
    }
}

#[async_trait]
impl MeetingTx for MemoryMeetingTx {
    fn meeting(&self) -> &Meeting {
        &self.meeting
    }

    async fn approved_count(&mut self) -> StoreResult<u32> {
        let approved = self
            .applications()
            .await
            .iter()
            .filter(|app| app.status == ApplicationStatus::Approved)
            .count();
        Ok(approved as u32)
    }

    async fn application(&mut self, application_id: Uuid) -> StoreResult<Option<Application>> {
        if let Some(app) = self.staged.get(&application_id) {
            return Ok(Some(app.clone()));
        }
        let applications = self.state.applications.read().await;
        Ok(applications
            .get(&application_id)
            .filter(|app| app.meeting_id == self.meeting.id)
            .cloned())
    }

    async fn application_of(&mut self, user_id: &str) -> StoreResult<Option<Application>> {
        Ok(self
            .applications()
            .await
            .into_iter()
            .find(|app| app.user_id == user_id))
    }

    async fn insert_application(&mut self, application: &Application) -> StoreResult<()> {
        if self.application_of(&application.user_id).await?.is_some() {
            return Err(StoreError::UniqueViolation(APPLICATION_KEY.to_string()));
        }
        self.staged.insert(application.id, application.clone());
        Ok(())
    }

    async fn set_application_status(
        &mut self,
        application_id: Uuid,
        status: ApplicationStatus,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Application> {
        let mut app = self
            .application(application_id)
            .await?
            .ok_or_else(|| StoreError::Missing(format!("application {}", application_id)))?;

        app.status = status;
        if reviewed_at.is_some() {
            app.reviewed_at = reviewed_at;
        }
        self.staged.insert(app.id, app.clone());
        Ok(app)
    }

    async fn set_meeting_status(&mut self, status: MeetingStatus) -> StoreResult<()> {
        self.meeting.status = status;
        self.meeting.updated_at = Utc::now();
        self.meeting_dirty = true;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        if !self.staged.is_empty() {
            let mut applications = self.state.applications.write().await;
            applications.extend(self.staged);
        }
        if self.meeting_dirty {
            let mut meetings = self.state.meetings.write().await;
            meetings.insert(self.meeting.id, self.meeting);
        }
        Ok(())
    }
}

pub struct MemoryUserTx {
    _guard: OwnedMutexGuard<()>,
    state: Arc<MemoryState>,
    user: User,
    attendance: Vec<Attendance>,
    entries: Vec<ScoreEntry>,
}

#[async_trait]
impl UserTx for MemoryUserTx {
    fn user(&self) -> &User {
        &self.user
    }

    async fn attendance_record(&mut self) -> StoreResult<AttendanceRecord> {
        let committed = self.state.attendance.read().await;
        let record = committed
            .iter()
            .filter(|row| row.user_id == self.user.id)
            .chain(self.attendance.iter())
            .fold(AttendanceRecord::default(), |record, row| record.with(row.outcome));
        Ok(record)
    }

    async fn insert_attendance(&mut self, attendance: &Attendance) -> StoreResult<()> {
        let committed = self.state.attendance.read().await;
        let duplicate = committed
            .iter()
            .chain(self.attendance.iter())
            .any(|row| row.meeting_id == attendance.meeting_id && row.user_id == attendance.user_id);
        drop(committed);

        if duplicate {
            return Err(StoreError::UniqueViolation(ATTENDANCE_KEY.to_string()));
        }
        self.attendance.push(attendance.clone());
        Ok(())
    }

    async fn count_entries(&mut self, reason: ScoreReason) -> StoreResult<u32> {
        let ledger = self.state.ledger.read().await;
        let count = ledger
            .iter()
            .filter(|entry| entry.user_id == self.user.id)
            .chain(self.entries.iter())
            .filter(|entry| entry.reason == reason)
            .count();
        Ok(count as u32)
    }

    async fn meeting_entry(
        &mut self,
        reason: ScoreReason,
        meeting_id: Uuid,
    ) -> StoreResult<Option<ScoreEntry>> {
        let ledger = self.state.ledger.read().await;
        let found = ledger
            .iter()
            .filter(|entry| entry.user_id == self.user.id)
            .chain(self.entries.iter())
            .find(|entry| entry.reason == reason && entry.related_meeting_id == Some(meeting_id))
            .cloned();
        Ok(found)
    }

    async fn append_score(&mut self, entry: ScoreEntry) -> StoreResult<ScoreEntry> {
        let score = clamp_score(self.user.trust_score.saturating_add(entry.delta));
        let entry = ScoreEntry {
            score_after: score,
            ..entry
        };
        self.user.trust_score = score;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self) -> StoreResult<()> {
        let mut users = self.state.users.write().await;
        let mut attendance = self.state.attendance.write().await;
        let mut ledger = self.state.ledger.write().await;

        let stored = users
            .get_mut(&self.user.id)
            .ok_or_else(|| StoreError::Missing(format!("user {}", self.user.id)))?;
        if !self.entries.is_empty() {
            stored.trust_score = self.user.trust_score;
            stored.updated_at = Utc::now();
        }

        attendance.extend(self.attendance);
        ledger.extend(self.entries);
        Ok(())
    }
}

#[async_trait]
impl MeetupStore for MemoryStore {
    type MeetingTx = MemoryMeetingTx;
    type UserTx = MemoryUserTx;

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.users.read().await.get(user_id).cloned())
    }

    async fn get_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>> {
        let users = self.inner.users.read().await;
        Ok(user_ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn create_user(&self, user: &User, initial: ScoreEntry) -> StoreResult<User> {
        let mut users = self.inner.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation(USER_KEY.to_string()));
        }

        let score = clamp_score(initial.delta);
        let created = User {
            trust_score: score,
            ..user.clone()
        };
        users.insert(created.id.clone(), created.clone());

        let mut ledger = self.inner.ledger.write().await;
        ledger.push(ScoreEntry {
            score_after: score,
            ..initial
        });

        Ok(created)
    }

    async fn update_profile(&self, user: &User) -> StoreResult<()> {
        let mut users = self.inner.users.write().await;
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::Missing(format!("user {}", user.id)))?;

        stored.nickname = user.nickname.clone();
        stored.profile_image_url = user.profile_image_url.clone();
        stored.interests = user.interests.clone();
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn score_history(&self, user_id: &str) -> StoreResult<Vec<ScoreEntry>> {
        let ledger = self.inner.ledger.read().await;
        Ok(ledger
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn lock_user(&self, user_id: &str) -> StoreResult<Option<MemoryUserTx>> {
        let guard = acquire(&self.inner.user_locks, user_id.to_string()).await;
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        Ok(Some(MemoryUserTx {
            _guard: guard,
            state: Arc::clone(&self.inner),
            user,
            attendance: Vec::new(),
            entries: Vec::new(),
        }))
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()> {
        let mut meetings = self.inner.meetings.write().await;
        if meetings.contains_key(&meeting.id) {
            return Err(StoreError::UniqueViolation("meetings_pkey".to_string()));
        }
        meetings.insert(meeting.id, meeting.clone());
        Ok(())
    }

    async fn get_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<Meeting>> {
        Ok(self.inner.meetings.read().await.get(&meeting_id).cloned())
    }

    async fn list_open_meetings(
        &self,
        after: DateTime<Utc>,
        interests: &[String],
    ) -> StoreResult<Vec<Meeting>> {
        let meetings = self.inner.meetings.read().await;
        let mut open: Vec<Meeting> = meetings
            .values()
            .filter(|m| m.is_open() && m.meeting_date > after && m.has_interests(interests))
            .cloned()
            .collect();
        open.sort_by_key(|m| m.meeting_date);
        Ok(open)
    }

    async fn lock_meeting(&self, meeting_id: Uuid) -> StoreResult<Option<MemoryMeetingTx>> {
        let guard = acquire(&self.inner.meeting_locks, meeting_id).await;
        let Some(meeting) = self.get_meeting(meeting_id).await? else {
            return Ok(None);
        };

        Ok(Some(MemoryMeetingTx {
            _guard: guard,
            state: Arc::clone(&self.inner),
            meeting,
            meeting_dirty: false,
            staged: HashMap::new(),
        }))
    }

    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self.inner.applications.read().await.get(&application_id).cloned())
    }

    async fn find_application(
        &self,
        meeting_id: Uuid,
        user_id: &str,
    ) -> StoreResult<Option<Application>> {
        let applications = self.inner.applications.read().await;
        Ok(applications
            .values()
            .find(|app| app.meeting_id == meeting_id && app.user_id == user_id)
            .cloned())
    }

    async fn list_applications(&self, meeting_id: Uuid) -> StoreResult<Vec<Application>> {
        let applications = self.inner.applications.read().await;
        let mut listed: Vec<Application> = applications
            .values()
            .filter(|app| app.meeting_id == meeting_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            b.applied_at
                .cmp(&a.applied_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(listed)
    }

    async fn count_approved(&self, meeting_id: Uuid) -> StoreResult<u32> {
        let applications = self.inner.applications.read().await;
        let approved = applications
            .values()
            .filter(|app| app.meeting_id == meeting_id && app.status == ApplicationStatus::Approved)
            .count();
        Ok(approved as u32)
    }
}
