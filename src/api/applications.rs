//! Application review routes

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use uuid::Uuid;

use super::middleware::Principal;
use super::ApiState;
use crate::database::MeetupStore;
use crate::error::CoreResult;
use crate::models::Application;

pub fn create_router<S: MeetupStore>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/{id}/approve", put(approve::<S>))
        .route("/{id}/reject", put(reject::<S>))
        .route("/{id}/withdraw", put(withdraw::<S>))
        .with_state(state)
}

async fn approve<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Application>> {
    let host_id = principal.require()?;
    Ok(Json(state.core.applications.approve(id, host_id).await?))
}

async fn reject<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Application>> {
    let host_id = principal.require()?;
    Ok(Json(state.core.applications.reject(id, host_id).await?))
}

async fn withdraw<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Application>> {
    let applicant_id = principal.require()?;
    Ok(Json(state.core.applications.withdraw(id, applicant_id).await?))
}
