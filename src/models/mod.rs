//! Domain models
//!
//! Contains the persisted entities of the meetup service:
//! - Users and their cached trust score
//! - Meetings and their status machine
//! - Applications and their review state
//! - Attendance outcomes and the score ledger

pub mod application;
pub mod attendance;
pub mod ledger;
pub mod meeting;
pub mod user;

pub use application::{Application, ApplicationStatus, ApplicationSummary, ApplicationWithApplicant};
pub use attendance::{Attendance, AttendanceOutcome, AttendanceRecord};
pub use ledger::{ScoreEntry, ScoreReason};
pub use meeting::{GenderRestriction, Meeting, MeetingParams, MeetingStatus, MeetingView};
pub use user::{ProfileUpdate, User};

use thiserror::Error;

/// Returned when a stored or submitted tag does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseTagError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
