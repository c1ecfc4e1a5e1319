//! Error kinds surfaced by the core operations
//!
//! Validation and conflict errors carry enough detail for a caller to correct
//! the request. Storage failures collapse into `Internal` and are logged by the
//! caller before being surfaced generically.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::database::StoreError;
use crate::models::{ApplicationStatus, MeetingStatus};

/// Per-field input validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("title must be {max} characters or less")]
    TitleTooLong { max: usize },

    #[error("description must be between {min} and {max} characters")]
    DescriptionLength { min: usize, max: usize },

    #[error("meeting date must be in the future")]
    MeetingDateNotFuture,

    #[error("max participants must be between {min} and {max}")]
    CapacityOutOfRange { min: u32, max: u32 },

    #[error("maximum {max} interests allowed")]
    TooManyInterests { max: usize },

    #[error("participation fee must be 0 or greater")]
    NegativeFee,

    #[error("age range min must be less than or equal to max")]
    AgeRangeInverted,

    #[error("nickname cannot be blank")]
    BlankNickname,

    #[error("score adjustment cannot be zero")]
    ZeroScoreDelta,

    #[error("reason '{0}' cannot be credited manually")]
    ReasonNotManual(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Why a request clashes with current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("already applied to this meeting")]
    DuplicateApplication,

    #[error("meeting is not open for applications (status: {0})")]
    MeetingNotOpen(MeetingStatus),

    #[error("application was already reviewed (status: {0})")]
    ApplicationNotPending(ApplicationStatus),

    #[error("meeting cannot move from {from} to {to}")]
    InvalidMeetingTransition { from: MeetingStatus, to: MeetingStatus },

    #[error("attendance already recorded for this meeting")]
    DuplicateAttendance,

    #[error("user holds no approved application for this meeting")]
    NotAParticipant,

    #[error("meeting was cancelled")]
    MeetingCancelled,

    #[error("meeting has not taken place yet (scheduled for {0})")]
    MeetingNotYetHeld(DateTime<Utc>),
}

/// Why an authenticated principal is not allowed to act
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForbiddenReason {
    #[error("only the meeting host may do this")]
    NotHost,

    #[error("only the applicant may do this")]
    NotApplicant,

    #[error("insufficient trust score (required {required}, have {actual})")]
    InsufficientTrust { required: i32, actual: i32 },

    #[error("a completed, active profile is required")]
    ProfileRequired,
}

/// The entity a lookup failed to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Meeting(Uuid),
    Application(Uuid),
    User(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Meeting(id) => write!(f, "meeting {}", id),
            Resource::Application(id) => write!(f, "application {}", id),
            Resource::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Coarse error classification shared with the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    Capacity,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    #[error("meeting {meeting_id} is full ({max_participants} participants)")]
    Capacity {
        meeting_id: Uuid,
        max_participants: u32,
    },

    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Unauthorized => ErrorKind::Unauthorized,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Capacity { .. } => ErrorKind::Capacity,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
