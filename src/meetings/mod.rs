//! Meetings and their applications
//!
//! - [`MeetingLifecycle`]: creation, lookup, listing and host-driven status
//!   changes
//! - [`ApplicationWorkflow`]: apply, review and withdraw, serialized per
//!   meeting through the store's lock token

mod lifecycle;
mod workflow;

pub use lifecycle::{build_meeting, MeetingLifecycle};
pub use workflow::ApplicationWorkflow;

/// Longest meeting title, in characters
pub const TITLE_MAX_CHARS: usize = 40;
/// Shortest non-empty description, in characters
pub const DESCRIPTION_MIN_CHARS: usize = 20;
/// Longest description, in characters
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const MIN_PARTICIPANTS: u32 = 2;
pub const MAX_PARTICIPANTS: u32 = 20;
/// Most interest tags a meeting may carry
pub const MAX_MEETING_INTERESTS: usize = 2;
