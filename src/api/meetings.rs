//! Meeting routes

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::middleware::Principal;
use super::ApiState;
use crate::database::MeetupStore;
use crate::error::CoreResult;
use crate::models::{
    Application, ApplicationWithApplicant, AttendanceOutcome, Meeting, MeetingParams, MeetingView,
};
use crate::reputation::AttendanceResolution;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated interest tags; all must match
    pub interests: Option<String>,
}

impl ListQuery {
    fn interests(&self) -> Vec<String> {
        self.interests
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub user_id: String,
    pub outcome: AttendanceOutcome,
    pub cancelled_at: Option<DateTime<Utc>>,
}

pub fn create_router<S: MeetupStore>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/", get(list_meetings::<S>).post(create_meeting::<S>))
        .route("/{id}", get(get_meeting::<S>))
        .route("/{id}/cancel", post(cancel_meeting::<S>))
        .route("/{id}/complete", post(complete_meeting::<S>))
        .route(
            "/{id}/applications",
            get(list_applications::<S>).post(apply::<S>),
        )
        .route("/{id}/attendance", post(record_attendance::<S>))
        .with_state(state)
}

async fn list_meetings<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> CoreResult<Json<Vec<Meeting>>> {
    principal.require()?;
    let Query(query) = query?;
    let meetings = state.core.meetings.list_open_meetings(&query.interests()).await?;
    Ok(Json(meetings))
}

async fn create_meeting<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    payload: Result<Json<MeetingParams>, JsonRejection>,
) -> CoreResult<(StatusCode, Json<MeetingView>)> {
    let host_id = principal.require()?;
    let Json(params) = payload?;
    let view = state.core.meetings.create_meeting(host_id, params).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Anonymous viewers see the meeting without an application summary
async fn get_meeting<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<MeetingView>> {
    let view = state.core.meetings.get_meeting(id, principal.user_id()).await?;
    Ok(Json(view))
}

async fn cancel_meeting<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Meeting>> {
    let host_id = principal.require()?;
    Ok(Json(state.core.meetings.cancel_meeting(id, host_id).await?))
}

async fn complete_meeting<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Meeting>> {
    let host_id = principal.require()?;
    Ok(Json(state.core.meetings.complete_meeting(id, host_id).await?))
}

async fn list_applications<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<Vec<ApplicationWithApplicant>>> {
    let host_id = principal.require()?;
    Ok(Json(state.core.applications.list_applications(id, host_id).await?))
}

async fn apply<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    body: Result<Option<Json<ApplyRequest>>, JsonRejection>,
) -> CoreResult<(StatusCode, Json<Application>)> {
    let applicant_id = principal.require()?;
    let answers = body?.map(|Json(req)| req.answers).unwrap_or_default();
    let application = state.core.applications.apply(id, applicant_id, answers).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn record_attendance<S: MeetupStore>(
    State(state): State<ApiState<S>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    payload: Result<Json<AttendanceRequest>, JsonRejection>,
) -> CoreResult<(StatusCode, Json<AttendanceResolution>)> {
    let actor_id = principal.require()?;
    let Json(req) = payload?;
    let resolution = state
        .core
        .scores
        .record_attendance(actor_id, id, &req.user_id, req.outcome, req.cancelled_at)
        .await?;
    Ok((StatusCode::CREATED, Json(resolution)))
}
