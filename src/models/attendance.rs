//! Attendance outcomes recorded after a meeting or on withdrawal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseTagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    Attended,
    NoShow,
    Cancelled,
}

impl AttendanceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceOutcome::Attended => "attended",
            AttendanceOutcome::NoShow => "no_show",
            AttendanceOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AttendanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceOutcome {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attended" => Ok(AttendanceOutcome::Attended),
            "no_show" => Ok(AttendanceOutcome::NoShow),
            "cancelled" => Ok(AttendanceOutcome::Cancelled),
            other => Err(ParseTagError::new("attendance outcome", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub user_id: String,
    pub outcome: AttendanceOutcome,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl Attendance {
    pub fn new(
        meeting_id: Uuid,
        user_id: String,
        outcome: AttendanceOutcome,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            meeting_id,
            user_id,
            outcome,
            cancelled_at,
            recorded_at: Utc::now(),
        }
    }
}

/// Per-user attendance tallies the score engine works from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub attended: u32,
    pub no_shows: u32,
    pub cancellations: u32,
}

impl AttendanceRecord {
    /// Meetings the user was expected to show up at
    pub fn expected(&self) -> u32 {
        self.attended + self.no_shows
    }

    pub fn with(mut self, outcome: AttendanceOutcome) -> Self {
        match outcome {
            AttendanceOutcome::Attended => self.attended += 1,
            AttendanceOutcome::NoShow => self.no_shows += 1,
            AttendanceOutcome::Cancelled => self.cancellations += 1,
        }
        self
    }
}
