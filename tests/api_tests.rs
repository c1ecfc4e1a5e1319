//! HTTP tests for the meetup API
//!
//! Requests are driven through the full middleware stack with `oneshot`
//! against the in-memory store.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use letsmeet_core::api::{
    ApiState, SecurityMiddlewareConfig, SecurityState, StaticTokenResolver, create_app,
};
use letsmeet_core::{MeetupCore, MemoryStore, TrustThresholds};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Test Helpers
// ============================================================================

const HOST_TOKEN: &str = "host-token-0123456789";
const GUEST_TOKEN: &str = "guest-token-0123456789";
const OTHER_TOKEN: &str = "other-token-0123456789";

fn app_with(config: SecurityMiddlewareConfig) -> Router {
    let core = Arc::new(MeetupCore::new(
        Arc::new(MemoryStore::new()),
        TrustThresholds::default(),
    ));
    let tokens = HashMap::from([
        (HOST_TOKEN.to_string(), "hana@example.com".to_string()),
        (GUEST_TOKEN.to_string(), "gil@example.com".to_string()),
        (OTHER_TOKEN.to_string(), "oh@example.com".to_string()),
    ]);
    let security = SecurityState::new(config, Arc::new(StaticTokenResolver::new(tokens)));
    create_app(ApiState::new(core), security)
}

fn app() -> Router {
    app_with(SecurityMiddlewareConfig::default())
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn meeting_body(capacity: i32) -> Value {
    json!({
        "title": "Board game night",
        "description": "Bring a game you love, we supply snacks.",
        "meeting_date": (Utc::now() + Duration::days(5)).to_rfc3339(),
        "location": "Mapo",
        "category": "games",
        "max_participants": capacity,
        "interests": ["boardgames"],
    })
}

/// Touch the profiles so they exist, then create one meeting as the host
async fn seeded_meeting(app: &Router, capacity: i32) -> String {
    for token in [HOST_TOKEN, GUEST_TOKEN, OTHER_TOKEN] {
        let (status, _) = send(app, request("GET", "/users/me", Some(token), None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(
        app,
        request("POST", "/meetings", Some(HOST_TOKEN), Some(meeting_body(capacity))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Middleware
// ============================================================================

mod middleware {
    use super::*;

    #[tokio::test]
    async fn test_health_check_with_security_headers() {
        let app = app();
        let response = app
            .clone()
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert!(response.headers().contains_key("x-ratelimit-limit"));
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/health", Some("not-a-real-token"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_anonymous_request_to_protected_route() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/users/me", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&app, request("GET", "/meetings", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let app = app_with(SecurityMiddlewareConfig {
            rate_limit_per_minute: 2,
            ..Default::default()
        });
        let from = |ip: &str| {
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(send(&app, from("10.0.0.1")).await.0, StatusCode::OK);
        assert_eq!(send(&app, from("10.0.0.1")).await.0, StatusCode::OK);
        assert_eq!(send(&app, from("10.0.0.1")).await.0, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(send(&app, from("10.0.0.2")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let app = app_with(SecurityMiddlewareConfig {
            max_request_size: 64,
            ..Default::default()
        });
        let req = Request::builder()
            .method("POST")
            .uri("/meetings")
            .header(header::AUTHORIZATION, format!("Bearer {}", HOST_TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "4096")
            .body(Body::from("x".repeat(4096)))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}

// ============================================================================
// Profiles
// ============================================================================

mod profiles {
    use super::*;

    #[tokio::test]
    async fn test_first_access_creates_profile() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/users/me", Some(HOST_TOKEN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "hana@example.com");
        assert_eq!(body["nickname"], "hana");
        assert_eq!(body["trust_score"], 70);
        assert_eq!(body["trust_level"], "stable");

        let (status, history) = send(
            &app,
            request("GET", "/users/me/score-history", Some(HOST_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["reason"], "initial");
    }

    #[tokio::test]
    async fn test_profile_update() {
        let app = app();
        send(&app, request("GET", "/users/me", Some(GUEST_TOKEN), None)).await;

        let (status, body) = send(
            &app,
            request(
                "PUT",
                "/users/me",
                Some(GUEST_TOKEN),
                Some(json!({ "nickname": "Gil", "interests": ["tennis", "tennis", "jazz"] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nickname"], "Gil");
        assert_eq!(body["interests"], json!(["tennis", "jazz"]));
        assert_eq!(body["trust_score"], 70);

        let (status, body) = send(
            &app,
            request("PUT", "/users/me", Some(GUEST_TOKEN), Some(json!({ "nickname": "   " }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation");
    }
}

// ============================================================================
// Meetings and Applications
// ============================================================================

mod meetings {
    use super::*;

    #[tokio::test]
    async fn test_create_and_view_meeting() {
        let app = app();
        let id = seeded_meeting(&app, 4).await;

        let (status, body) = send(&app, request("GET", &format!("/meetings/{}", id), None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Board game night");
        assert_eq!(body["status"], "open");
        assert_eq!(body["host_nickname"], "hana");
        assert_eq!(body["approved_count"], 0);
        assert!(body["user_application"].is_null());

        let (status, list) = send(
            &app,
            request("GET", "/meetings?interests=boardgames", Some(GUEST_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (_, list) = send(
            &app,
            request("GET", "/meetings?interests=boardgames,hiking", Some(GUEST_TOKEN), None),
        )
        .await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_meeting_validation() {
        let app = app();
        send(&app, request("GET", "/users/me", Some(HOST_TOKEN), None)).await;

        let mut body = meeting_body(4);
        body.as_object_mut().unwrap().remove("title");
        let (status, error) = send(&app, request("POST", "/meetings", Some(HOST_TOKEN), Some(body))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["code"], "validation");
        assert!(error["error"].as_str().unwrap().contains("title"));

        let (status, _) = send(
            &app,
            request("POST", "/meetings", Some(HOST_TOKEN), Some(meeting_body(21))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_meeting() {
        let app = app();
        let uri = format!("/meetings/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_apply_and_review_flow() {
        let app = app();
        let id = seeded_meeting(&app, 2).await;
        let applications = format!("/meetings/{}/applications", id);

        let (status, application) = send(
            &app,
            request("POST", &applications, Some(GUEST_TOKEN), Some(json!({ "answers": ["I know Catan"] }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(application["status"], "pending");
        let application_id = application["id"].as_str().unwrap().to_string();

        // Second attempt by the same user
        let (status, body) = send(&app, request("POST", &applications, Some(GUEST_TOKEN), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");

        // Only the host reviews or lists
        let approve = format!("/applications/{}/approve", application_id);
        let (status, body) = send(&app, request("PUT", &approve, Some(OTHER_TOKEN), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
        let (status, _) = send(&app, request("GET", &applications, Some(GUEST_TOKEN), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, listed) = send(&app, request("GET", &applications, Some(HOST_TOKEN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["applicant_nickname"], "gil");
        assert_eq!(listed[0]["applicant_trust_score"], 70);

        let (status, approved) = send(&app, request("PUT", &approve, Some(HOST_TOKEN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "approved");

        let (_, view) = send(
            &app,
            request("GET", &format!("/meetings/{}", id), Some(GUEST_TOKEN), None),
        )
        .await;
        assert_eq!(view["approved_count"], 1);
        assert_eq!(view["user_application"]["status"], "approved");

        // Reviewed applications stay reviewed
        let (status, _) = send(
            &app,
            request("PUT", &format!("/applications/{}/reject", application_id), Some(HOST_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_full_meeting_reports_capacity() {
        let app = app();
        let id = seeded_meeting(&app, 2).await;
        let applications = format!("/meetings/{}/applications", id);

        let mut ids = Vec::new();
        for token in [GUEST_TOKEN, OTHER_TOKEN] {
            let (_, application) = send(&app, request("POST", &applications, Some(token), None)).await;
            ids.push(application["id"].as_str().unwrap().to_string());
        }
        for application_id in &ids {
            let (status, _) = send(
                &app,
                request("PUT", &format!("/applications/{}/approve", application_id), Some(HOST_TOKEN), None),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, view) = send(&app, request("GET", &format!("/meetings/{}", id), None, None)).await;
        assert_eq!(view["status"], "closed");
        assert_eq!(view["approved_count"], 2);
    }

    #[tokio::test]
    async fn test_upcoming_meeting_outcomes() {
        let app = app();
        let id = seeded_meeting(&app, 3).await;
        let (_, application) = send(
            &app,
            request("POST", &format!("/meetings/{}/applications", id), Some(GUEST_TOKEN), None),
        )
        .await;
        send(
            &app,
            request(
                "PUT",
                &format!("/applications/{}/approve", application["id"].as_str().unwrap()),
                Some(HOST_TOKEN),
                None,
            ),
        )
        .await;
        let attendance = format!("/meetings/{}/attendance", id);

        // Nothing to score before the meeting takes place
        let (status, body) = send(
            &app,
            request(
                "POST",
                &attendance,
                Some(HOST_TOKEN),
                Some(json!({ "user_id": "gil@example.com", "outcome": "no_show" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");

        let (status, _) = send(
            &app,
            request("POST", &format!("/meetings/{}/complete", id), Some(HOST_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Withdrawing five days out carries no penalty
        let (status, resolution) = send(
            &app,
            request(
                "POST",
                &attendance,
                Some(GUEST_TOKEN),
                Some(json!({ "user_id": "gil@example.com", "outcome": "cancelled" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(resolution["entry"]["delta"], 0);
        assert_eq!(resolution["entry"]["reason"], "cancellation");

        let (_, me) = send(&app, request("GET", "/users/me", Some(HOST_TOKEN), None)).await;
        assert_eq!(me["trust_score"], 70);
    }

    #[tokio::test]
    async fn test_malformed_bodies_use_error_shape() {
        let app = app();
        let id = seeded_meeting(&app, 3).await;

        let broken = Request::builder()
            .method("POST")
            .uri("/meetings")
            .header(header::AUTHORIZATION, format!("Bearer {}", HOST_TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"title\": "))
            .unwrap();
        let (status, body) = send(&app, broken).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation");
        assert!(body["error"].as_str().unwrap().starts_with("validation failed: malformed request"));

        let (status, body) = send(
            &app,
            request("PUT", "/users/me", Some(GUEST_TOKEN), Some(json!({ "nickname": 5 }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation");

        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/meetings/{}/attendance", id),
                Some(HOST_TOKEN),
                Some(json!({ "user_id": "gil@example.com", "outcome": "vanished" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation");

        // Anonymous callers are refused before the body is looked at
        let (status, body) = send(
            &app,
            request("PUT", "/users/me", None, Some(json!({ "nickname": 5 }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }
}
