//! HTTP API for the meetup service
//!
//! Provides REST routes for:
//! - Meetings (create, list, view, cancel, complete, attendance)
//! - Applications (apply, list, approve, reject, withdraw)
//! - The caller's profile and score history
//! - Security middleware (principal resolution, rate limiting, headers)

pub mod applications;
pub mod error;
pub mod meetings;
pub mod middleware;
pub mod users;

pub use error::ErrorResponse;
pub use middleware::{
    Principal, PrincipalResolver, RateLimiter, SecurityMiddlewareConfig, SecurityState,
    StaticTokenResolver, auth_middleware, body_size_middleware, logging_middleware,
    rate_limit_middleware, security_headers_middleware,
};

use axum::{Router, middleware as layers, routing::get};
use std::sync::Arc;

use crate::database::MeetupStore;
use crate::service::MeetupCore;

/// Shared handler state
pub struct ApiState<S: MeetupStore> {
    pub core: Arc<MeetupCore<S>>,
}

impl<S: MeetupStore> ApiState<S> {
    pub fn new(core: Arc<MeetupCore<S>>) -> Self {
        Self { core }
    }
}

// Manual impl: deriving would demand `S: Clone`
impl<S: MeetupStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

/// All routes, without middleware
pub fn create_router<S: MeetupStore>(state: ApiState<S>) -> Router {
    Router::new()
        .nest("/meetings", meetings::create_router(state.clone()))
        .nest("/applications", applications::create_router(state.clone()))
        .nest("/users", users::create_router(state))
        .route("/health", get(|| async { "OK" }))
}

/// Routes wrapped in the security middleware stack
pub fn create_app<S: MeetupStore>(state: ApiState<S>, security: SecurityState) -> Router {
    create_router(state)
        .layer(layers::from_fn_with_state(
            security.clone(),
            body_size_middleware,
        ))
        .layer(layers::from_fn_with_state(security.clone(), auth_middleware))
        .layer(layers::from_fn_with_state(
            security.clone(),
            rate_limit_middleware,
        ))
        .layer(layers::from_fn_with_state(security, logging_middleware))
        .layer(layers::from_fn(security_headers_middleware))
}
