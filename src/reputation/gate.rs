//! Trust Gate
//!
//! Threshold checks against the persisted score that decide who may host a
//! meeting and who may apply to one. Reads only; never mutates.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult, ForbiddenReason};
use crate::models::User;

/// Governance-configurable thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustThresholds {
    /// Score needed to create a meeting
    pub host_min_score: i32,

    /// Score needed to apply to a meeting
    pub apply_min_score: i32,

    /// Balance credited when a profile is first created
    pub initial_score: i32,
}

impl Default for TrustThresholds {
    fn default() -> Self {
        Self {
            host_min_score: 30,
            apply_min_score: 10,
            initial_score: 70,
        }
    }
}

/// Action guarded by a score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Host,
    Apply,
}

#[derive(Debug, Clone, Default)]
pub struct TrustGate {
    thresholds: TrustThresholds,
}

impl TrustGate {
    pub fn new(thresholds: TrustThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &TrustThresholds {
        &self.thresholds
    }

    pub fn required_score(&self, privilege: Privilege) -> i32 {
        match privilege {
            Privilege::Host => self.thresholds.host_min_score,
            Privilege::Apply => self.thresholds.apply_min_score,
        }
    }

    pub fn can_host(&self, user: &User) -> bool {
        self.allows(Some(user), Privilege::Host)
    }

    pub fn can_apply(&self, user: &User) -> bool {
        self.allows(Some(user), Privilege::Apply)
    }

    /// Missing or deactivated profiles hold no privileges
    pub fn allows(&self, user: Option<&User>, privilege: Privilege) -> bool {
        match user {
            Some(user) if user.is_active => user.trust_score >= self.required_score(privilege),
            _ => false,
        }
    }

    /// Like `allows`, but explains a refusal
    pub fn authorize(&self, user: Option<&User>, privilege: Privilege) -> CoreResult<()> {
        let user = match user {
            Some(user) if user.is_active => user,
            _ => return Err(CoreError::Forbidden(ForbiddenReason::ProfileRequired)),
        };

        let required = self.required_score(privilege);
        if user.trust_score < required {
            debug!(
                user_id = %user.id,
                privilege = ?privilege,
                score = user.trust_score,
                required,
                "Trust gate refused"
            );
            return Err(CoreError::Forbidden(ForbiddenReason::InsufficientTrust {
                required,
                actual: user.trust_score,
            }));
        }

        Ok(())
    }
}
