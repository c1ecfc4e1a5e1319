//! Trust Score Engine
//!
//! Pure functions mapping attendance history and timings to point values and a
//! display tier. Nothing here touches storage; the keeper folds the results into
//! the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::AttendanceRecord;

/// Lowest cached score
pub const SCORE_MIN: i32 = 0;
/// Highest cached score
pub const SCORE_MAX: i32 = 100;

/// Approvals needed before the attendance rate earns anything
pub const MIN_ATTENDANCE_SAMPLE: u32 = 3;
/// Ceiling of the attendance-rate component
pub const MAX_ATTENDANCE_POINTS: i32 = 40;

/// Display tier derived from the trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Restricted,
    Caution,
    Stable,
    Trust,
}

impl TrustLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Restricted => "restricted",
            TrustLevel::Caution => "caution",
            TrustLevel::Stable => "stable",
            TrustLevel::Trust => "trust",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for any score: >=90 trust, >=70 stable, >=50 caution, otherwise restricted
pub fn trust_level(score: i32) -> TrustLevel {
    if score >= 90 {
        TrustLevel::Trust
    } else if score >= 70 {
        TrustLevel::Stable
    } else if score >= 50 {
        TrustLevel::Caution
    } else {
        TrustLevel::Restricted
    }
}

/// Attendance rate component in [0, 40].
///
/// Users with fewer than three approvals get nothing either way, so a single
/// attendance cannot be used to farm the full rate.
pub fn attendance_rate_score(attended: u32, approved: u32) -> i32 {
    if approved < MIN_ATTENDANCE_SAMPLE {
        return 0;
    }
    let rate = attended.min(approved) as f64 / approved as f64;
    (rate * MAX_ATTENDANCE_POINTS as f64).round() as i32
}

/// Stepped no-show penalty, capped at -30
pub fn no_show_penalty(no_show_count: u32) -> i32 {
    match no_show_count {
        0 => 0,
        1 => -10,
        2 => -20,
        _ => -30,
    }
}

/// Hours between the cancellation and the meeting start; negative when late
pub fn hours_of_notice(cancelled_at: DateTime<Utc>, meeting_date: DateTime<Utc>) -> f64 {
    (meeting_date - cancelled_at).num_milliseconds() as f64 / 3_600_000.0
}

/// Penalty tiered by notice. A value on a boundary gets the better tier.
pub fn cancellation_penalty(cancelled_at: DateTime<Utc>, meeting_date: DateTime<Utc>) -> i32 {
    let hours = hours_of_notice(cancelled_at, meeting_date);

    if hours >= 24.0 {
        0
    } else if hours >= 12.0 {
        -5
    } else if hours >= 6.0 {
        -10
    } else if hours >= 1.0 {
        -15
    } else {
        -20
    }
}

/// Host experience component.
///
/// Exactly two hosted meetings maps to 0, below the value for one. This gap is
/// kept as-is until the intended curve is confirmed.
pub fn host_experience_score(hosted_count: u32) -> i32 {
    match hosted_count {
        0 => 0,
        1 => 2,
        3..=4 => 5,
        n if n >= 5 => 10,
        _ => 0,
    }
}

pub fn clamp_score(score: i32) -> i32 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

/// Bounded running sum: each delta is added and the result clamped
pub fn fold_ledger<I>(deltas: I) -> i32
where
    I: IntoIterator<Item = i32>,
{
    deltas
        .into_iter()
        .fold(SCORE_MIN, |score, delta| clamp_score(score.saturating_add(delta)))
}

/// Combined attendance-rate and no-show standing for a record
pub fn reliability_score(record: &AttendanceRecord) -> i32 {
    attendance_rate_score(record.attended, record.expected()) + no_show_penalty(record.no_shows)
}

/// Change in reliability standing caused by moving from `before` to `after`
pub fn reliability_delta(before: &AttendanceRecord, after: &AttendanceRecord) -> i32 {
    reliability_score(after) - reliability_score(before)
}

/// Change in host experience caused by completing hosted meeting number `hosted_count`
pub fn host_experience_delta(hosted_count: u32) -> i32 {
    if hosted_count == 0 {
        return 0;
    }
    host_experience_score(hosted_count) - host_experience_score(hosted_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_trust_level_boundaries() {
        assert_eq!(trust_level(100), TrustLevel::Trust);
        assert_eq!(trust_level(90), TrustLevel::Trust);
        assert_eq!(trust_level(89), TrustLevel::Stable);
        assert_eq!(trust_level(70), TrustLevel::Stable);
        assert_eq!(trust_level(69), TrustLevel::Caution);
        assert_eq!(trust_level(50), TrustLevel::Caution);
        assert_eq!(trust_level(49), TrustLevel::Restricted);
        assert_eq!(trust_level(0), TrustLevel::Restricted);
        assert_eq!(trust_level(-40), TrustLevel::Restricted);
        assert_eq!(trust_level(i32::MAX), TrustLevel::Trust);
        assert_eq!(trust_level(i32::MIN), TrustLevel::Restricted);
    }

    #[test]
    fn test_attendance_rate_minimum_sample() {
        assert_eq!(attendance_rate_score(0, 0), 0);
        assert_eq!(attendance_rate_score(2, 2), 0);
        assert_eq!(attendance_rate_score(3, 3), 40);
        assert_eq!(attendance_rate_score(1, 3), 13);
        assert_eq!(attendance_rate_score(2, 3), 27);
        assert_eq!(attendance_rate_score(0, 5), 0);
    }

    #[test]
    fn test_attendance_rate_never_exceeds_cap() {
        assert_eq!(attendance_rate_score(9, 3), 40);
    }

    #[test]
    fn test_no_show_penalty_caps() {
        assert_eq!(no_show_penalty(0), 0);
        assert_eq!(no_show_penalty(1), -10);
        assert_eq!(no_show_penalty(2), -20);
        assert_eq!(no_show_penalty(3), -30);
        assert_eq!(no_show_penalty(50), -30);
    }

    #[test]
    fn test_cancellation_penalty_tiers() {
        let meeting = Utc::now() + Duration::days(10);

        assert_eq!(cancellation_penalty(meeting - Duration::hours(48), meeting), 0);
        assert_eq!(cancellation_penalty(meeting - Duration::hours(24), meeting), 0);
        // 23.99 hours of notice
        let just_short = meeting - Duration::milliseconds(23 * 3_600_000 + 3_564_000);
        assert_eq!(cancellation_penalty(just_short, meeting), -5);
        assert_eq!(cancellation_penalty(meeting - Duration::hours(12), meeting), -5);
        assert_eq!(cancellation_penalty(meeting - Duration::hours(6), meeting), -10);
        assert_eq!(cancellation_penalty(meeting - Duration::hours(5), meeting), -15);
        assert_eq!(cancellation_penalty(meeting - Duration::hours(1), meeting), -15);
        assert_eq!(cancellation_penalty(meeting - Duration::minutes(59), meeting), -20);
        assert_eq!(cancellation_penalty(meeting + Duration::hours(2), meeting), -20);
    }

    #[test]
    fn test_host_experience_steps() {
        assert_eq!(host_experience_score(0), 0);
        assert_eq!(host_experience_score(1), 2);
        assert_eq!(host_experience_score(3), 5);
        assert_eq!(host_experience_score(4), 5);
        assert_eq!(host_experience_score(5), 10);
        assert_eq!(host_experience_score(40), 10);
    }

    #[test]
    fn test_host_experience_gap_at_two_is_literal() {
        // Known discontinuity: two hosted meetings score below one.
        assert_eq!(host_experience_score(2), 0);
        assert!(host_experience_score(2) < host_experience_score(1));
        assert_eq!(host_experience_delta(2), -2);
        assert_eq!(host_experience_delta(3), 5);
    }

    #[test]
    fn test_host_experience_deltas_sum_to_score() {
        let total: i32 = (1..=7).map(host_experience_delta).sum();
        assert_eq!(total, host_experience_score(7));
        assert_eq!(host_experience_delta(0), 0);
    }

    #[test]
    fn test_fold_ledger_clamps_each_step() {
        assert_eq!(fold_ledger([70, 40]), 100);
        assert_eq!(fold_ledger([70, 40, -10]), 90);
        assert_eq!(fold_ledger([5, -30, 10]), 10);
        assert_eq!(fold_ledger(Vec::<i32>::new()), 0);
    }

    #[test]
    fn test_reliability_delta_for_no_show() {
        let before = AttendanceRecord {
            attended: 3,
            no_shows: 0,
            cancellations: 0,
        };
        let after = AttendanceRecord {
            no_shows: 1,
            ..before
        };
        // 40 -> 30 from the rate, and -10 from the first no-show
        assert_eq!(reliability_delta(&before, &after), -20);
    }

    proptest! {
        #[test]
        fn prop_trust_level_is_monotonic(a in -1000i32..1000, b in -1000i32..1000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(trust_level(lo) <= trust_level(hi));
        }

        #[test]
        fn prop_attendance_rate_in_range(attended in 0u32..500, approved in 0u32..500) {
            let score = attendance_rate_score(attended, approved);
            prop_assert!((0..=MAX_ATTENDANCE_POINTS).contains(&score));
        }

        #[test]
        fn prop_fold_stays_bounded(deltas in proptest::collection::vec(-200i32..200, 0..40)) {
            let score = fold_ledger(deltas);
            prop_assert!((SCORE_MIN..=SCORE_MAX).contains(&score));
        }

        #[test]
        fn prop_cancellation_penalty_monotonic_in_notice(a in 0i64..200_000, b in 0i64..200_000) {
            let meeting = Utc::now();
            let (less, more) = if a <= b { (a, b) } else { (b, a) };
            let with_less = cancellation_penalty(meeting - Duration::seconds(less), meeting);
            let with_more = cancellation_penalty(meeting - Duration::seconds(more), meeting);
            prop_assert!(with_less <= with_more);
        }
    }
}
