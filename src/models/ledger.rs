//! Append-only score ledger entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseTagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    /// Starting balance written when a profile is created
    Initial,
    Attendance,
    NoShow,
    /// Cancellation with enough notice to carry no penalty
    Cancellation,
    LateCancel,
    HostExperience,
    TimeRecovery,
    PositiveAction,
}

impl ScoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreReason::Initial => "initial",
            ScoreReason::Attendance => "attendance",
            ScoreReason::NoShow => "no_show",
            ScoreReason::Cancellation => "cancellation",
            ScoreReason::LateCancel => "late_cancel",
            ScoreReason::HostExperience => "host_experience",
            ScoreReason::TimeRecovery => "time_recovery",
            ScoreReason::PositiveAction => "positive_action",
        }
    }

    /// Reasons an operator may credit by hand
    pub fn is_manual(&self) -> bool {
        matches!(self, ScoreReason::TimeRecovery | ScoreReason::PositiveAction)
    }
}

impl fmt::Display for ScoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreReason {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(ScoreReason::Initial),
            "attendance" => Ok(ScoreReason::Attendance),
            "no_show" => Ok(ScoreReason::NoShow),
            "cancellation" => Ok(ScoreReason::Cancellation),
            "late_cancel" => Ok(ScoreReason::LateCancel),
            "host_experience" => Ok(ScoreReason::HostExperience),
            "time_recovery" => Ok(ScoreReason::TimeRecovery),
            "positive_action" => Ok(ScoreReason::PositiveAction),
            other => Err(ParseTagError::new("score reason", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: Uuid,
    pub user_id: String,
    pub delta: i32,
    pub reason: ScoreReason,
    pub related_meeting_id: Option<Uuid>,
    pub description: Option<String>,

    /// Cached score right after this entry was folded in
    pub score_after: i32,
    pub created_at: DateTime<Utc>,
}

impl ScoreEntry {
    /// Entry awaiting append; `score_after` is filled in by the store
    pub fn new(user_id: String, delta: i32, reason: ScoreReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            delta,
            reason,
            related_meeting_id: None,
            description: None,
            score_after: 0,
            created_at: Utc::now(),
        }
    }

    pub fn for_meeting(mut self, meeting_id: Uuid) -> Self {
        self.related_meeting_id = Some(meeting_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
