//! Application Workflow
//!
//! Every check-then-act sequence here runs under the meeting's lock token, so
//! two requests against one meeting observe each other's writes. Requests for
//! different meetings do not contend.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::lifecycle::close_if_full_in;
use crate::database::{MeetingTx, MeetupStore, StoreError};
use crate::error::{ConflictReason, CoreError, CoreResult, ForbiddenReason, Resource};
use crate::models::{Application, ApplicationStatus, ApplicationWithApplicant, User};
use crate::reputation::{Privilege, TrustGate};

pub struct ApplicationWorkflow<S: MeetupStore> {
    store: Arc<S>,
    gate: TrustGate,
}

impl<S: MeetupStore> ApplicationWorkflow<S> {
    pub fn new(store: Arc<S>, gate: TrustGate) -> Self {
        Self { store, gate }
    }

    pub async fn apply(
        &self,
        meeting_id: Uuid,
        applicant_id: &str,
        answers: Vec<String>,
    ) -> CoreResult<Application> {
        let applicant = self.store.get_user(applicant_id).await?;
        self.gate.authorize(applicant.as_ref(), Privilege::Apply)?;

        let mut tx = self
            .store
            .lock_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;

        let meeting = tx.meeting();
        if !meeting.is_open() {
            return Err(CoreError::Conflict(ConflictReason::MeetingNotOpen(meeting.status)));
        }
        let max_participants = meeting.max_participants;

        if tx.application_of(applicant_id).await?.is_some() {
            warn!(meeting_id = %meeting_id, applicant_id, "Duplicate application");
            return Err(CoreError::Conflict(ConflictReason::DuplicateApplication));
        }

        if tx.approved_count().await? >= max_participants {
            return Err(CoreError::Capacity {
                meeting_id,
                max_participants,
            });
        }

        let application = Application::new(meeting_id, applicant_id.to_string(), answers);
        match tx.insert_application(&application).await {
            Err(StoreError::UniqueViolation(_)) => {
                return Err(CoreError::Conflict(ConflictReason::DuplicateApplication));
            }
            other => other?,
        }
        tx.commit().await?;

        info!(
            meeting_id = %meeting_id,
            application_id = %application.id,
            applicant_id,
            "Application submitted"
        );
        Ok(application)
    }

    /// Approve a pending application, closing the meeting if it fills up
    pub async fn approve(&self, application_id: Uuid, host_id: &str) -> CoreResult<Application> {
        let mut tx = self.lock_for_review(application_id, host_id).await?;

        let meeting = tx.meeting();
        let meeting_id = meeting.id;
        let max_participants = meeting.max_participants;
        if meeting.status.is_terminal() {
            return Err(CoreError::Conflict(ConflictReason::MeetingNotOpen(meeting.status)));
        }

        let approved = tx.approved_count().await?;
        if approved >= max_participants {
            warn!(
                meeting_id = %meeting_id,
                application_id = %application_id,
                approved,
                "Approval refused; meeting full"
            );
            return Err(CoreError::Capacity {
                meeting_id,
                max_participants,
            });
        }

        let application = tx
            .set_application_status(application_id, ApplicationStatus::Approved, Some(Utc::now()))
            .await?;
        close_if_full_in(&mut tx).await?;
        tx.commit().await?;

        info!(
            meeting_id = %meeting_id,
            application_id = %application_id,
            approved = approved + 1,
            capacity = max_participants,
            "Application approved"
        );
        Ok(application)
    }

    pub async fn reject(&self, application_id: Uuid, host_id: &str) -> CoreResult<Application> {
        let mut tx = self.lock_for_review(application_id, host_id).await?;

        let application = tx
            .set_application_status(application_id, ApplicationStatus::Rejected, Some(Utc::now()))
            .await?;
        tx.commit().await?;

        info!(application_id = %application_id, "Application rejected");
        Ok(application)
    }

    /// The applicant pulls a pending application
    pub async fn withdraw(&self, application_id: Uuid, applicant_id: &str) -> CoreResult<Application> {
        let (mut tx, application) = self.lock_pending(application_id).await?;

        if application.user_id != applicant_id {
            return Err(CoreError::Forbidden(ForbiddenReason::NotApplicant));
        }

        let application = tx
            .set_application_status(application_id, ApplicationStatus::Cancelled, None)
            .await?;
        tx.commit().await?;

        info!(application_id = %application_id, applicant_id, "Application withdrawn");
        Ok(application)
    }

    /// Host-only listing, newest first, joined with each applicant's profile
    pub async fn list_applications(
        &self,
        meeting_id: Uuid,
        host_id: &str,
    ) -> CoreResult<Vec<ApplicationWithApplicant>> {
        let meeting = self
            .store
            .get_meeting(meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(meeting_id)))?;
        if !meeting.is_hosted_by(host_id) {
            return Err(CoreError::Forbidden(ForbiddenReason::NotHost));
        }

        let applications = self.store.list_applications(meeting_id).await?;
        let user_ids: Vec<String> = applications.iter().map(|app| app.user_id.clone()).collect();
        let applicants: HashMap<String, User> = self
            .store
            .get_users(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        Ok(applications
            .into_iter()
            .map(|application| {
                let applicant = applicants.get(&application.user_id);
                ApplicationWithApplicant {
                    applicant_nickname: applicant.map(|u| u.nickname.clone()),
                    applicant_trust_score: applicant.map(|u| u.trust_score),
                    application,
                }
            })
            .collect())
    }

    /// Lock the application's meeting and re-read the application under it
    async fn lock_pending(&self, application_id: Uuid) -> CoreResult<(S::MeetingTx, Application)> {
        let found = self
            .store
            .get_application(application_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Application(application_id)))?;

        let mut tx = self
            .store
            .lock_meeting(found.meeting_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Meeting(found.meeting_id)))?;

        let application = tx
            .application(application_id)
            .await?
            .ok_or(CoreError::NotFound(Resource::Application(application_id)))?;
        if application.status != ApplicationStatus::Pending {
            return Err(CoreError::Conflict(ConflictReason::ApplicationNotPending(
                application.status,
            )));
        }

        Ok((tx, application))
    }

    async fn lock_for_review(&self, application_id: Uuid, host_id: &str) -> CoreResult<S::MeetingTx> {
        let (tx, _) = self.lock_pending(application_id).await?;
        if !tx.meeting().is_hosted_by(host_id) {
            warn!(application_id = %application_id, host_id, "Review by non-host");
            return Err(CoreError::Forbidden(ForbiddenReason::NotHost));
        }
        Ok(tx)
    }
}
