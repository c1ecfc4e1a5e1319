//! Profile routes for the calling user

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde::Serialize;

use super::middleware::Principal;
use super::ApiState;
use crate::database::MeetupStore;
use crate::error::CoreResult;
use crate::models::{ProfileUpdate, ScoreEntry, User};
use crate::reputation::TrustLevel;

/// Profile with its derived display tier
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub trust_level: TrustLevel,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            trust_level: user.trust_level(),
            user,
        }
    }
}

/// Email-style principals lend their local part as a first nickname
fn nickname_hint(user_id: &str) -> Option<&str> {
    user_id
        .split_once('@')
        .map(|(local, _)| local)
        .filter(|local| !local.is_empty())
}

pub fn create_router<S: MeetupStore>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/me", get(get_me::<S>).put(update_me::<S>))
        .route("/me/score-history", get(score_history::<S>))
        .with_state(state)
}

async fn get_me<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
) -> CoreResult<Json<UserView>> {
    let user_id = principal.require()?;
    let user = state
        .core
        .profiles
        .get_or_create(user_id, nickname_hint(user_id))
        .await?;
    Ok(Json(user.into()))
}

async fn update_me<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> CoreResult<Json<UserView>> {
    let user_id = principal.require()?;
    let Json(patch) = payload?;
    let user = state.core.profiles.update(user_id, patch).await?;
    Ok(Json(user.into()))
}

async fn score_history<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
) -> CoreResult<Json<Vec<ScoreEntry>>> {
    let user_id = principal.require()?;
    Ok(Json(state.core.scores.history(user_id).await?))
}
