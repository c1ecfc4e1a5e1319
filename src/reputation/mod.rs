//! Trust Score System
//!
//! Every change to a user's trust score is an entry in an append-only ledger;
//! the score on the profile is a cache of the ledger's bounded running sum.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │ score (engine)  │────►│ ScoreKeeper      │────►│ score ledger    │
//! │ pure functions  │     │ (ledger appends) │     │ + cached score  │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                                                          │
//!                                                          ▼
//!                                                  ┌─────────────────┐
//!                                                  │ TrustGate       │
//!                                                  │ (host / apply)  │
//!                                                  └─────────────────┘
//! ```
//!
//! ## Score Model
//!
//! - A new profile is credited the initial score (70 by default)
//! - Attendance and no-shows move the score by the change they cause in the
//!   attendance-rate and no-show components
//! - Cancellations cost points by how little notice was given
//! - Completing a hosted meeting credits the host-experience step
//! - The cached score is clamped to [0, 100] after every entry

mod gate;
mod keeper;
mod score;

pub use gate::{Privilege, TrustGate, TrustThresholds};
pub use keeper::{AttendanceResolution, ScoreKeeper};
pub use score::{
    attendance_rate_score, cancellation_penalty, clamp_score, fold_ledger, host_experience_delta,
    host_experience_score, hours_of_notice, no_show_penalty, reliability_delta, reliability_score,
    trust_level, TrustLevel, MAX_ATTENDANCE_POINTS, MIN_ATTENDANCE_SAMPLE, SCORE_MAX, SCORE_MIN,
};
