//! Profile Service
//!
//! Profiles are created lazily on first access. Creation and the initial
//! ledger credit are a single store write.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{MeetupStore, StoreError};
use crate::error::{CoreError, CoreResult, Resource, ValidationError};
use crate::models::user::MAX_PROFILE_INTERESTS;
use crate::models::{ProfileUpdate, ScoreEntry, ScoreReason, User};
use crate::reputation::TrustThresholds;

/// Nickname given to profiles created without a usable hint
pub const DEFAULT_NICKNAME: &str = "member";

pub struct ProfileService<S: MeetupStore> {
    store: Arc<S>,
    initial_score: i32,
}

impl<S: MeetupStore> ProfileService<S> {
    pub fn new(store: Arc<S>, thresholds: &TrustThresholds) -> Self {
        Self {
            store,
            initial_score: thresholds.initial_score,
        }
    }

    /// Fetch a profile, creating it with the initial score on first access
    pub async fn get_or_create(&self, user_id: &str, nickname_hint: Option<&str>) -> CoreResult<User> {
        if let Some(user) = self.store.get_user(user_id).await? {
            return Ok(user);
        }

        let nickname = nickname_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .unwrap_or(DEFAULT_NICKNAME);
        let user = User::new(user_id.to_string(), nickname.to_string());
        let initial = ScoreEntry::new(user_id.to_string(), self.initial_score, ScoreReason::Initial)
            .with_description("initial score");

        match self.store.create_user(&user, initial).await {
            Ok(created) => {
                info!(user_id, score = created.trust_score, "Profile created");
                Ok(created)
            }
            // Lost a creation race; the winner's row is the profile
            Err(StoreError::UniqueViolation(_)) => self.get(user_id).await,
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, user_id: &str) -> CoreResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(Resource::User(user_id.to_string())))
    }

    /// Apply a partial update; the trust score is never written here
    pub async fn update(&self, user_id: &str, patch: ProfileUpdate) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;

        if let Some(nickname) = patch.nickname {
            let nickname = nickname.trim();
            if nickname.is_empty() {
                return Err(ValidationError::BlankNickname.into());
            }
            user.nickname = nickname.to_string();
        }

        if let Some(url) = patch.profile_image_url {
            let url = url.trim();
            user.profile_image_url = (!url.is_empty()).then(|| url.to_string());
        }

        if let Some(interests) = patch.interests {
            let mut unique: Vec<String> = Vec::with_capacity(interests.len());
            for tag in interests {
                let tag = tag.trim();
                if !tag.is_empty() && !unique.iter().any(|t| t == tag) {
                    unique.push(tag.to_string());
                }
            }
            if unique.len() > MAX_PROFILE_INTERESTS {
                return Err(ValidationError::TooManyInterests {
                    max: MAX_PROFILE_INTERESTS,
                }
                .into());
            }
            user.interests = unique;
        }

        user.updated_at = Utc::now();
        self.store.update_profile(&user).await?;

        debug!(user_id, "Profile updated");
        Ok(user)
    }
}
