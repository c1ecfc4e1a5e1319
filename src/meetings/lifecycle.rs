//! Meeting Lifecycle
//!
//! Status machine: open -> closed | cancelled | completed, closed -> completed.
//! Completed and cancelled are terminal.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    DESCRIPTION_MAX_CHARS, DESCRIPTION_MIN_CHARS, MAX_MEETING_INTERESTS, MAX_PARTICIPANTS,
    MIN_PARTICIPANTS, TITLE_MAX_CHARS,
};
use crate::database::{MeetingTx, MeetupStore, StoreResult};
use crate::error::{ConflictReason, CoreError, CoreResult, ForbiddenReason, Resource, ValidationError};
use crate::models::{Meeting, MeetingParams, MeetingStatus, MeetingView};
use crate::reputation::{Privilege, ScoreKeeper, TrustGate};

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Validate a creation request and build the open meeting it describes
pub fn build_meeting(
    host_id: &str,
    params: MeetingParams,
    now: DateTime<Utc>,
) -> Result<Meeting, ValidationError> {
    let title = required(params.title, "title")?;
    let meeting_date = params
        .meeting_date
        .ok_or(ValidationError::MissingField("meeting_date"))?;
    let location = required(params.location, "location")?;
    let max_participants = params
        .max_participants
        .ok_or(ValidationError::MissingField("max_participants"))?;
    let interests = params
        .interests
        .ok_or(ValidationError::MissingField("interests"))?;
    let category = required(params.category, "category")?;

    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong {
            max: TITLE_MAX_CHARS,
        });
    }

    let description = params.description.filter(|d| !d.is_empty());
    if let Some(description) = &description {
        let len = description.chars().count();
        if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&len) {
            return Err(ValidationError::DescriptionLength {
                min: DESCRIPTION_MIN_CHARS,
                max: DESCRIPTION_MAX_CHARS,
            });
        }
    }

    if meeting_date <= now {
        return Err(ValidationError::MeetingDateNotFuture);
    }

    if max_participants < MIN_PARTICIPANTS as i32 || max_participants > MAX_PARTICIPANTS as i32 {
        return Err(ValidationError::CapacityOutOfRange {
            min: MIN_PARTICIPANTS,
            max: MAX_PARTICIPANTS,
        });
    }

    if interests.len() > MAX_MEETING_INTERESTS {
        return Err(ValidationError::TooManyInterests {
            max: MAX_MEETING_INTERESTS,
        });
    }

    let participation_fee = params.participation_fee.unwrap_or(0);
    if participation_fee < 0 {
        return Err(ValidationError::NegativeFee);
    }

    if let (Some(min), Some(max)) = (params.age_range_min, params.age_range_max)
        && min > max
    {
        return Err(ValidationError::AgeRangeInverted);
    }

    Ok(Meeting {
        id: Uuid::new_v4(),
        host_id: host_id.to_string(),
        title,
        description,
        meeting_date,
        location,
        location_detail: params.location_detail.filter(|d| !d.trim().is_empty()),
        category,
        max_participants: max_participants as u32,
        interests,
        participation_fee,
        gender_restriction: params.gender_restriction.unwrap_or_default(),
        age_range_min: params.age_range_min,
        age_range_max: params.age_range_max,
        status: MeetingStatus::Open,
        created_at: now,
        updated_at: now,
    })
}

/// Close an open meeting once approvals reach capacity. Returns true if it
/// transitioned.
pub(crate) async fn close_if_full_in<T: MeetingTx>(tx: &mut T) -> StoreResult<bool> {
    if !tx.meeting().is_open() {
        return Ok(false);
    }

    let approved = tx.approved_count().await?;
    if approved < tx.meeting().max_participants {
        return Ok(false);
    }

    tx.set_meeting_status(MeetingStatus::Closed).await?;
    info!(meeting_id = %tx.meeting().id, approved, "Meeting full; closed");
    Ok(true)
}

pub struct MeetingLifecycle<S: MeetupStore> {
    store: Arc<S>,
    gate: TrustGate,
    keeper: ScoreKeeper<S>,
}

impl<S: MeetupStore> MeetingLifecycle<S> {
    pub fn new(store: Arc<S>, gate: TrustGate) -> Self {
        Self {
            keeper: ScoreKeeper::new(Arc::clone(&store)),
            store,
            gate,
        }
    }

    pub async fn create_meeting(&self, host_id: &str, params: MeetingParams) -> CoreResult<MeetingView> {
        let host = self.store.get_user(host_id).await?;
        self.gate.authorize(host.as_ref(), Privilege::Host)?;

        let meeting = build_meeting(host_id, params, Utc::now()).inspect_err(|err| {
            warn!(host_id, error = %err, "Meeting rejected");
        })?;
        self.store.insert_meeting(&meeting).await?;

        info!(
            meeting_id = %meeting.id,
            host_id,
            capacity = meeting.max_participants,
            date = %meeting.meeting_date,
            "Meeting created"
        );

        Ok(MeetingView {
            host_nickname: host.map(|h| h.nickname).unwrap_or_default(),
            approved_count: 0,
            user_application: None,
            meeting,
        })
    }

    /// Idempotent; returns the status after the check
    pub async fn close_if_full(&self, meeting_id: Uuid) -> CoreResult<MeetingStatus> {
        let mut tx = self
            .store
            .lock_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;

        close_if_full_in(&mut tx).await?;
        let status = tx.meeting().status;
        tx.commit().await?;
        Ok(status)
    }

    /// Meeting with host nickname and, for a signed-in viewer, their application
    pub async fn get_meeting(&self, meeting_id: Uuid, viewer_id: Option<&str>) -> CoreResult<MeetingView> {
        let meeting = self
            .store
            .get_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;

        let host_nickname = self
            .store
            .get_user(&meeting.host_id)
            .await?
            .map(|host| host.nickname)
            .unwrap_or_default();
        let approved_count = self.store.count_approved(meeting_id).await?;

        let user_application = match viewer_id {
            Some(viewer_id) => self
                .store
                .find_application(meeting_id, viewer_id)
                .await?
                .map(|app| app.summary()),
            None => None,
        };

        debug!(meeting_id = %meeting_id, viewer = ?viewer_id, "Meeting fetched");
        Ok(MeetingView {
            meeting,
            host_nickname,
            approved_count,
            user_application,
        })
    }

    /// Open future meetings carrying every requested interest, soonest first
    pub async fn list_open_meetings(&self, interests: &[String]) -> CoreResult<Vec<Meeting>> {
        let meetings = self.store.list_open_meetings(Utc::now(), interests).await?;
        debug!(count = meetings.len(), filter = ?interests, "Open meetings listed");
        Ok(meetings)
    }

    pub async fn cancel_meeting(&self, meeting_id: Uuid, host_id: &str) -> CoreResult<Meeting> {
        let tx = self
            .begin_transition(meeting_id, host_id, MeetingStatus::Cancelled)
            .await?;
        finish_transition(tx, MeetingStatus::Cancelled).await
    }

    /// Mark a meeting as held and credit the host's experience.
    ///
    /// Only once the start time has passed. The credit is appended while the
    /// meeting is still locked, before the status commits; a retry after a
    /// failed commit finds the existing entry instead of crediting twice.
    pub async fn complete_meeting(&self, meeting_id: Uuid, host_id: &str) -> CoreResult<Meeting> {
        let tx = self
            .begin_transition(meeting_id, host_id, MeetingStatus::Completed)
            .await?;
        self.keeper.record_hosting(host_id, meeting_id).await?;
        finish_transition(tx, MeetingStatus::Completed).await
    }

    /// Lock the meeting and stage `next`; the caller commits
    async fn begin_transition(
        &self,
        meeting_id: Uuid,
        host_id: &str,
        next: MeetingStatus,
    ) -> CoreResult<S::MeetingTx> {
        let mut tx = self
            .store
            .lock_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;

        let current = tx.meeting().status;
        if !tx.meeting().is_hosted_by(host_id) {
            warn!(meeting_id = %meeting_id, host_id, to = %next, "Status change by non-host");
            return Err(CoreError::Forbidden(ForbiddenReason::NotHost));
        }
        if !current.can_transition_to(next) {
            return Err(CoreError::Conflict(ConflictReason::InvalidMeetingTransition {
                from: current,
                to: next,
            }));
        }
        if next == MeetingStatus::Completed && !tx.meeting().has_taken_place(Utc::now()) {
            return Err(CoreError::Conflict(ConflictReason::MeetingNotYetHeld(
                tx.meeting().meeting_date,
            )));
        }

        debug!(meeting_id = %meeting_id, from = %current, to = %next, "Meeting status staged");
        tx.set_meeting_status(next).await?;
        Ok(tx)
    }
}

async fn finish_transition<T: MeetingTx>(tx: T, next: MeetingStatus) -> CoreResult<Meeting> {
    let meeting = tx.meeting().clone();
    tx.commit().await?;

    info!(meeting_id = %meeting.id, to = %next, "Meeting status changed");
    Ok(meeting)
}
