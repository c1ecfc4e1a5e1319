//! Integration tests for the meetup core
//!
//! These tests drive the services end to end over the in-memory store:
//! meeting capacity, application races, trust gating and the score ledger.

use chrono::{Duration, Utc};
use futures::future::join_all;
use letsmeet_core::meetings::build_meeting;
use letsmeet_core::reputation::{fold_ledger, host_experience_score};
use letsmeet_core::{
    ApplicationStatus, AttendanceOutcome, ConflictReason, CoreError, ErrorKind, MeetingParams,
    MeetingStatus, MeetupCore, MeetupStore, MemoryStore, ScoreEntry, ScoreReason,
    TrustThresholds, User,
};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

type Core = MeetupCore<MemoryStore>;

fn core() -> Arc<Core> {
    Arc::new(MeetupCore::new(
        Arc::new(MemoryStore::new()),
        TrustThresholds::default(),
    ))
}

/// Create a profile with an explicit starting score
async fn user_with_score(core: &Core, id: &str, score: i32) {
    let user = User::new(id.to_string(), format!("{}-nick", id));
    core.store()
        .create_user(&user, ScoreEntry::new(id.to_string(), score, ScoreReason::Initial))
        .await
        .unwrap();
}

fn meeting_params(capacity: i32) -> MeetingParams {
    MeetingParams {
        title: Some("Friday dinner".to_string()),
        description: Some("Trying the new place near the station.".to_string()),
        meeting_date: Some(Utc::now() + Duration::days(3)),
        location: Some("Gangnam".to_string()),
        category: Some("food".to_string()),
        max_participants: Some(capacity),
        interests: Some(vec!["food".to_string()]),
        ..Default::default()
    }
}

async fn hosted_meeting(core: &Core, capacity: i32) -> Uuid {
    core.profiles.get_or_create("host", Some("Hana")).await.unwrap();
    core.meetings
        .create_meeting("host", meeting_params(capacity))
        .await
        .unwrap()
        .meeting
        .id
}

/// Open meeting whose start time passed yesterday
async fn held_meeting(core: &Core, capacity: i32) -> Uuid {
    core.profiles.get_or_create("host", Some("Hana")).await.unwrap();
    let created = Utc::now() - Duration::days(4);
    let mut params = meeting_params(capacity);
    params.meeting_date = Some(created + Duration::days(3));
    let meeting = build_meeting("host", params, created).unwrap();
    core.store().insert_meeting(&meeting).await.unwrap();
    meeting.id
}

async fn assert_ledger_matches_cache(core: &Core, user_id: &str) {
    let history = core.scores.history(user_id).await.unwrap();
    let folded = fold_ledger(history.iter().rev().map(|entry| entry.delta));
    let cached = core.profiles.get(user_id).await.unwrap().trust_score;
    assert_eq!(folded, cached, "ledger and cached score diverged for {}", user_id);
}

// ============================================================================
// Capacity and Status
// ============================================================================

mod capacity {
    use super::*;

    #[tokio::test]
    async fn test_full_meeting_closes_and_refuses_applicants() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 2).await;
        for id in ["amy", "ben", "cho"] {
            core.profiles.get_or_create(id, None).await.unwrap();
        }

        let amy = core.applications.apply(meeting_id, "amy", Vec::new()).await.unwrap();
        let ben = core.applications.apply(meeting_id, "ben", Vec::new()).await.unwrap();
        core.applications.approve(amy.id, "host").await.unwrap();
        core.applications.approve(ben.id, "host").await.unwrap();

        let view = core.meetings.get_meeting(meeting_id, Some("amy")).await.unwrap();
        assert_eq!(view.meeting.status, MeetingStatus::Closed);
        assert_eq!(view.approved_count, 2);
        assert_eq!(
            view.user_application.map(|a| a.status),
            Some(ApplicationStatus::Approved)
        );

        let err = core
            .applications
            .apply(meeting_id, "cho", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictReason::MeetingNotOpen(MeetingStatus::Closed))
        ));

        // Closed meetings drop out of the listing
        let open = core.meetings.list_open_meetings(&[]).await.unwrap();
        assert!(open.iter().all(|m| m.id != meeting_id));
    }

    #[tokio::test]
    async fn test_closed_meeting_can_still_complete() {
        let core = core();
        let meeting_id = held_meeting(&core, 2).await;
        for id in ["amy", "ben"] {
            core.profiles.get_or_create(id, None).await.unwrap();
            let app = core.applications.apply(meeting_id, id, Vec::new()).await.unwrap();
            core.applications.approve(app.id, "host").await.unwrap();
        }

        let err = core.meetings.cancel_meeting(meeting_id, "host").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let completed = core.meetings.complete_meeting(meeting_id, "host").await.unwrap();
        assert_eq!(completed.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_meeting_refuses_approvals() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 3).await;
        core.profiles.get_or_create("amy", None).await.unwrap();
        let app = core.applications.apply(meeting_id, "amy", Vec::new()).await.unwrap();

        core.meetings.cancel_meeting(meeting_id, "host").await.unwrap();
        let err = core.applications.approve(app.id, "host").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictReason::MeetingNotOpen(MeetingStatus::Cancelled))
        ));
    }
}

// ============================================================================
// Concurrent Requests
// ============================================================================

mod races {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_applies_admit_one() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 5).await;
        core.profiles.get_or_create("amy", None).await.unwrap();

        let handles = (0..16).map(|_| {
            let core = Arc::clone(&core);
            tokio::spawn(async move { core.applications.apply(meeting_id, "amy", Vec::new()).await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::Conflict(ConflictReason::DuplicateApplication))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(core.store().list_applications(meeting_id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_approvals_fill_last_slot_once() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 2).await;

        core.profiles.get_or_create("first", None).await.unwrap();
        let first = core.applications.apply(meeting_id, "first", Vec::new()).await.unwrap();
        core.applications.approve(first.id, "host").await.unwrap();

        let mut pending = Vec::new();
        for i in 0..8 {
            let id = format!("applicant-{}", i);
            core.profiles.get_or_create(&id, None).await.unwrap();
            pending.push(core.applications.apply(meeting_id, &id, Vec::new()).await.unwrap().id);
        }

        let handles = pending.into_iter().map(|application_id| {
            let core = Arc::clone(&core);
            tokio::spawn(async move { core.applications.approve(application_id, "host").await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::Capacity))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(full, 7);
        assert_eq!(core.store().count_approved(meeting_id).await.unwrap(), 2);

        let meeting = core.store().get_meeting(meeting_id).await.unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_approved_count_never_exceeds_capacity() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 3).await;

        let mut applications = Vec::new();
        for i in 0..10 {
            let id = format!("member-{}", i);
            core.profiles.get_or_create(&id, None).await.unwrap();
            applications.push(core.applications.apply(meeting_id, &id, Vec::new()).await.unwrap().id);
        }

        let handles = applications.into_iter().map(|application_id| {
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                let result = core.applications.approve(application_id, "host").await;
                let approved = core.store().count_approved(meeting_id).await.unwrap();
                (result.is_ok(), approved)
            })
        });

        let mut successes = 0;
        for joined in join_all(handles).await {
            let (ok, observed) = joined.unwrap();
            assert!(observed <= 3, "observed {} approvals", observed);
            successes += usize::from(ok);
        }
        assert_eq!(successes, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_profile() {
        let core = core();
        let handles = (0..8).map(|_| {
            let core = Arc::clone(&core);
            tokio::spawn(async move { core.profiles.get_or_create("newcomer", None).await })
        });
        for joined in join_all(handles).await {
            assert_eq!(joined.unwrap().unwrap().trust_score, 70);
        }
        assert_eq!(core.scores.history("newcomer").await.unwrap().len(), 1);
    }
}

// ============================================================================
// Trust Gating
// ============================================================================

mod trust_gate {
    use super::*;

    #[tokio::test]
    async fn test_low_score_applies_after_credit() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 4).await;
        user_with_score(&core, "newbie", 5).await;

        let err = core
            .applications
            .apply(meeting_id, "newbie", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let entry = core
            .scores
            .credit("newbie", 10, ScoreReason::PositiveAction, None, Some("verified phone".into()))
            .await
            .unwrap();
        assert_eq!(entry.score_after, 15);

        let app = core
            .applications
            .apply(meeting_id, "newbie", Vec::new())
            .await
            .unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_hosting_threshold() {
        let core = core();
        user_with_score(&core, "quiet", 29).await;
        let err = core
            .meetings
            .create_meeting("quiet", meeting_params(4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        core.scores
            .credit("quiet", 1, ScoreReason::TimeRecovery, None, None)
            .await
            .unwrap();
        assert!(core.meetings.create_meeting("quiet", meeting_params(4)).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_thresholds() {
        let core = MeetupCore::new(
            Arc::new(MemoryStore::new()),
            TrustThresholds {
                host_min_score: 80,
                apply_min_score: 10,
                initial_score: 70,
            },
        );
        core.profiles.get_or_create("host", None).await.unwrap();
        let err = core
            .meetings
            .create_meeting("host", meeting_params(4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}

// ============================================================================
// Score Ledger
// ============================================================================

mod ledger {
    use super::*;

    #[tokio::test]
    async fn test_ledger_fold_equals_cached_score() {
        let core = core();
        let mut meetings = Vec::new();
        for _ in 0..4 {
            meetings.push(held_meeting(&core, 5).await);
        }
        core.profiles.get_or_create("regular", None).await.unwrap();

        for meeting_id in &meetings {
            let app = core
                .applications
                .apply(*meeting_id, "regular", Vec::new())
                .await
                .unwrap();
            core.applications.approve(app.id, "host").await.unwrap();
        }

        let outcomes = [
            AttendanceOutcome::Attended,
            AttendanceOutcome::Attended,
            AttendanceOutcome::Attended,
            AttendanceOutcome::NoShow,
        ];
        let mut deltas = Vec::new();
        for (meeting_id, outcome) in meetings.iter().zip(outcomes) {
            let resolution = core
                .scores
                .record_attendance("host", *meeting_id, "regular", outcome, None)
                .await
                .unwrap();
            deltas.push(resolution.entry.delta);
        }
        // Third attendance reaches the sample minimum; the no-show drops the
        // rate to 3/4 and adds the first penalty
        assert_eq!(deltas, vec![0, 0, 40, -20]);

        core.scores
            .credit("regular", -200, ScoreReason::TimeRecovery, None, None)
            .await
            .unwrap();
        core.scores
            .credit("regular", 12, ScoreReason::PositiveAction, None, None)
            .await
            .unwrap();

        assert_ledger_matches_cache(&core, "regular").await;
        assert_eq!(core.profiles.get("regular").await.unwrap().trust_score, 12);
    }

    #[tokio::test]
    async fn test_late_cancellation_penalty() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 3).await;
        core.profiles.get_or_create("busy", None).await.unwrap();
        let app = core.applications.apply(meeting_id, "busy", Vec::new()).await.unwrap();
        core.applications.approve(app.id, "host").await.unwrap();

        let meeting = core.store().get_meeting(meeting_id).await.unwrap().unwrap();
        let resolution = core
            .scores
            .record_attendance(
                "busy",
                meeting_id,
                "busy",
                AttendanceOutcome::Cancelled,
                Some(meeting.meeting_date - Duration::minutes(30)),
            )
            .await
            .unwrap();
        assert_eq!(resolution.entry.delta, -20);
        assert_eq!(resolution.entry.reason, ScoreReason::LateCancel);
        assert_eq!(core.profiles.get("busy").await.unwrap().trust_score, 50);
        assert_ledger_matches_cache(&core, "busy").await;
    }

    #[tokio::test]
    async fn test_host_experience_gap_is_reproduced() {
        let core = core();
        let mut scores = Vec::new();
        for _ in 0..5 {
            let meeting_id = held_meeting(&core, 2).await;
            core.meetings.complete_meeting(meeting_id, "host").await.unwrap();
            scores.push(core.profiles.get("host").await.unwrap().trust_score);
        }

        // Two completed meetings score below one: 70+2, then back to 70
        assert_eq!(host_experience_score(2), 0);
        assert_eq!(scores, vec![72, 70, 75, 75, 80]);
        assert_ledger_matches_cache(&core, "host").await;
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let core = core();
        core.profiles.get_or_create("amy", None).await.unwrap();
        core.scores
            .credit("amy", 3, ScoreReason::PositiveAction, None, None)
            .await
            .unwrap();

        let history = core.scores.history("amy").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, ScoreReason::PositiveAction);
        assert_eq!(history[1].reason, ScoreReason::Initial);
        assert_eq!(history[0].score_after, 73);
    }
}

// ============================================================================
// Meetings That Never Happened
// ============================================================================

mod not_held {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_meeting_leaves_scores_alone() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 3).await;
        core.profiles.get_or_create("amy", None).await.unwrap();
        let app = core.applications.apply(meeting_id, "amy", Vec::new()).await.unwrap();
        core.applications.approve(app.id, "host").await.unwrap();
        core.meetings.cancel_meeting(meeting_id, "host").await.unwrap();

        let err = core
            .scores
            .record_attendance("host", meeting_id, "amy", AttendanceOutcome::NoShow, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictReason::MeetingCancelled)));
        assert_eq!(core.profiles.get("amy").await.unwrap().trust_score, 70);
        assert_eq!(core.scores.history("amy").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upcoming_meeting_cannot_be_scored() {
        let core = core();
        let meeting_id = hosted_meeting(&core, 3).await;
        core.profiles.get_or_create("amy", None).await.unwrap();
        let app = core.applications.apply(meeting_id, "amy", Vec::new()).await.unwrap();
        core.applications.approve(app.id, "host").await.unwrap();

        let err = core
            .scores
            .record_attendance("host", meeting_id, "amy", AttendanceOutcome::Attended, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictReason::MeetingNotYetHeld(_))));
    }

    #[tokio::test]
    async fn test_early_completion_earns_nothing() {
        let core = core();
        for _ in 0..5 {
            let meeting_id = hosted_meeting(&core, 2).await;
            let err = core
                .meetings
                .complete_meeting(meeting_id, "host")
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Conflict(ConflictReason::MeetingNotYetHeld(_))));
        }

        assert_eq!(core.profiles.get("host").await.unwrap().trust_score, 70);
        assert_eq!(core.scores.history("host").await.unwrap().len(), 1);
        assert_eq!(core.meetings.list_open_meetings(&[]).await.unwrap().len(), 5);
    }
}
