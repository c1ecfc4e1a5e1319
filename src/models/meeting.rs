//! Meeting entity and its status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{ApplicationSummary, ParseTagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Open,
    Closed,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Open => "open",
            MeetingStatus::Closed => "closed",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table. Completed and cancelled are terminal.
    pub fn can_transition_to(&self, next: MeetingStatus) -> bool {
        matches!(
            (self, next),
            (MeetingStatus::Open, MeetingStatus::Closed)
                | (MeetingStatus::Open, MeetingStatus::Cancelled)
                | (MeetingStatus::Open, MeetingStatus::Completed)
                | (MeetingStatus::Closed, MeetingStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Completed | MeetingStatus::Cancelled)
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(MeetingStatus::Open),
            "closed" => Ok(MeetingStatus::Closed),
            "completed" => Ok(MeetingStatus::Completed),
            "cancelled" => Ok(MeetingStatus::Cancelled),
            other => Err(ParseTagError::new("meeting status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderRestriction {
    #[default]
    All,
    Male,
    Female,
}

impl GenderRestriction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderRestriction::All => "all",
            GenderRestriction::Male => "male",
            GenderRestriction::Female => "female",
        }
    }
}

impl FromStr for GenderRestriction {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(GenderRestriction::All),
            "male" => Ok(GenderRestriction::Male),
            "female" => Ok(GenderRestriction::Female),
            other => Err(ParseTagError::new("gender restriction", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    /// Non-owning reference; the host may leave independently
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: DateTime<Utc>,
    pub location: String,
    pub location_detail: Option<String>,
    pub category: String,
    pub max_participants: u32,
    pub interests: Vec<String>,
    pub participation_fee: i64,
    pub gender_restriction: GenderRestriction,
    pub age_range_min: Option<u32>,
    pub age_range_max: Option<u32>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn is_open(&self) -> bool {
        self.status == MeetingStatus::Open
    }

    pub fn is_hosted_by(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    /// Completed, or its start time has passed
    pub fn has_taken_place(&self, now: DateTime<Utc>) -> bool {
        self.status == MeetingStatus::Completed || self.meeting_date <= now
    }

    /// True when every requested interest tag is carried by this meeting
    pub fn has_interests(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.interests.contains(tag))
    }
}

/// Meeting creation request as submitted by a host.
///
/// Required fields are optional here so that a missing field is reported
/// as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meeting_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub location_detail: Option<String>,
    pub category: Option<String>,
    pub max_participants: Option<i32>,
    pub interests: Option<Vec<String>>,
    pub participation_fee: Option<i64>,
    pub gender_restriction: Option<GenderRestriction>,
    pub age_range_min: Option<u32>,
    pub age_range_max: Option<u32>,
}

/// A meeting as seen by one viewer
#[derive(Debug, Clone, Serialize)]
pub struct MeetingView {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub host_nickname: String,
    pub approved_count: u32,
    pub user_application: Option<ApplicationSummary>,
}
