//! User profile with its cached trust score

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::{TrustLevel, trust_level};

/// Most interests a profile may carry
pub const MAX_PROFILE_INTERESTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Verified principal id from the identity provider
    pub id: String,
    pub nickname: String,
    pub profile_image_url: Option<String>,

    /// Cached bounded sum of the score ledger. Only the ledger writes this.
    pub trust_score: i32,

    pub interests: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh profile with a zero score; the initial score is credited through the ledger.
    pub fn new(id: String, nickname: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            nickname,
            profile_image_url: None,
            trust_score: 0,
            interests: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn trust_level(&self) -> TrustLevel {
        trust_level(self.trust_score)
    }
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub profile_image_url: Option<String>,
    pub interests: Option<Vec<String>>,
}
