//! Score Keeper - Ledger Orchestrator
//!
//! Turns meeting outcomes into ledger entries. Each append runs under the
//! user's lock token so the entry and the cached score are written together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::{MeetupStore, StoreError, UserTx};
use crate::error::{ConflictReason, CoreError, CoreResult, ForbiddenReason, Resource, ValidationError};
use crate::models::{
    ApplicationStatus, Attendance, AttendanceOutcome, MeetingStatus, ScoreEntry, ScoreReason,
};
use crate::reputation::score::{cancellation_penalty, host_experience_delta, reliability_delta};

/// Result of recording one attendance outcome
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceResolution {
    pub attendance: Attendance,
    pub entry: ScoreEntry,
}

pub struct ScoreKeeper<S: MeetupStore> {
    store: Arc<S>,
}

impl<S: MeetupStore> ScoreKeeper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record whether an approved participant attended.
    ///
    /// The host records any outcome; a participant may only record their own
    /// cancellation. `cancelled_at` defaults to now for cancellations.
    /// Nothing is recorded against a cancelled meeting, and attended or
    /// no-show outcomes wait until the meeting has taken place.
    pub async fn record_attendance(
        &self,
        actor_id: &str,
        meeting_id: Uuid,
        user_id: &str,
        outcome: AttendanceOutcome,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> CoreResult<AttendanceResolution> {
        let meeting = self
            .store
            .get_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;

        let self_cancel = actor_id == user_id && outcome == AttendanceOutcome::Cancelled;
        if !meeting.is_hosted_by(actor_id) && !self_cancel {
            warn!(meeting_id = %meeting_id, actor_id, "Attendance recorded by non-host");
            return Err(CoreError::Forbidden(ForbiddenReason::NotHost));
        }

        if meeting.status == MeetingStatus::Cancelled {
            return Err(CoreError::Conflict(ConflictReason::MeetingCancelled));
        }
        if outcome != AttendanceOutcome::Cancelled && !meeting.has_taken_place(Utc::now()) {
            return Err(CoreError::Conflict(ConflictReason::MeetingNotYetHeld(
                meeting.meeting_date,
            )));
        }

        let approved = self
            .store
            .find_application(meeting_id, user_id)
            .await?
            .is_some_and(|app| app.status == ApplicationStatus::Approved);
        if !approved {
            return Err(CoreError::Conflict(ConflictReason::NotAParticipant));
        }

        let mut tx = self
            .store
            .lock_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(Resource::User(user_id.to_string())))?;

        let before = tx.attendance_record().await?;
        let (delta, reason, cancelled_at) = match outcome {
            AttendanceOutcome::Attended => (
                reliability_delta(&before, &before.with(outcome)),
                ScoreReason::Attendance,
                None,
            ),
            AttendanceOutcome::NoShow => (
                reliability_delta(&before, &before.with(outcome)),
                ScoreReason::NoShow,
                None,
            ),
            AttendanceOutcome::Cancelled => {
                let at = cancelled_at.unwrap_or_else(Utc::now);
                let penalty = cancellation_penalty(at, meeting.meeting_date);
                let reason = if penalty < 0 {
                    ScoreReason::LateCancel
                } else {
                    ScoreReason::Cancellation
                };
                (penalty, reason, Some(at))
            }
        };

        let attendance = Attendance::new(meeting_id, user_id.to_string(), outcome, cancelled_at);
        match tx.insert_attendance(&attendance).await {
            Err(StoreError::UniqueViolation(_)) => {
                return Err(CoreError::Conflict(ConflictReason::DuplicateAttendance));
            }
            other => other?,
        }

        let entry = tx
            .append_score(
                ScoreEntry::new(user_id.to_string(), delta, reason)
                    .for_meeting(meeting_id)
                    .with_description(format!("{} at '{}'", outcome, meeting.title)),
            )
            .await?;
        tx.commit().await?;

        info!(
            meeting_id = %meeting_id,
            user_id,
            outcome = %outcome,
            delta,
            score = entry.score_after,
            "Attendance recorded"
        );

        Ok(AttendanceResolution { attendance, entry })
    }

    /// Manual ledger adjustment, limited to the manual reasons
    pub async fn credit(
        &self,
        user_id: &str,
        delta: i32,
        reason: ScoreReason,
        meeting_id: Option<Uuid>,
        description: Option<String>,
    ) -> CoreResult<ScoreEntry> {
        if !reason.is_manual() {
            return Err(ValidationError::ReasonNotManual(reason.to_string()).into());
        }
        if delta == 0 {
            return Err(ValidationError::ZeroScoreDelta.into());
        }

        let mut tx = self
            .store
            .lock_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(Resource::User(user_id.to_string())))?;

        let mut entry = ScoreEntry::new(user_id.to_string(), delta, reason);
        entry.related_meeting_id = meeting_id;
        entry.description = description;

        let entry = tx.append_score(entry).await?;
        tx.commit().await?;

        info!(user_id, reason = %reason, delta, score = entry.score_after, "Score credited");
        Ok(entry)
    }

    /// Credit the host-experience step for a completed meeting.
    ///
    /// At most one entry per meeting; a repeat call returns the existing
    /// entry. Returns `None` when the host profile no longer exists.
    pub async fn record_hosting(
        &self,
        host_id: &str,
        meeting_id: Uuid,
    ) -> CoreResult<Option<ScoreEntry>> {
        let Some(mut tx) = self.store.lock_user(host_id).await? else {
            warn!(host_id, meeting_id = %meeting_id, "Host profile missing; no experience credited");
            return Ok(None);
        };

        if let Some(existing) = tx
            .meeting_entry(ScoreReason::HostExperience, meeting_id)
            .await?
        {
            debug!(host_id, meeting_id = %meeting_id, "Host experience already credited");
            return Ok(Some(existing));
        }

        let hosted = tx.count_entries(ScoreReason::HostExperience).await? + 1;
        let delta = host_experience_delta(hosted);

        let entry = tx
            .append_score(
                ScoreEntry::new(host_id.to_string(), delta, ScoreReason::HostExperience)
                    .for_meeting(meeting_id)
                    .with_description(format!("hosted meeting #{}", hosted)),
            )
            .await?;
        tx.commit().await?;

        info!(host_id, hosted, delta, score = entry.score_after, "Host experience credited");
        Ok(Some(entry))
    }

    /// Ledger entries for a user, newest first
    pub async fn history(&self, user_id: &str) -> CoreResult<Vec<ScoreEntry>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(CoreError::NotFound(Resource::User(user_id.to_string())));
        }
        Ok(self.store.score_history(user_id).await?)
    }
}
