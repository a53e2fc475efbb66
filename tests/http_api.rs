//! HTTP surface tests
//!
//! Requests go through the full router (auth, body limits, routing) with
//! `tower::ServiceExt::oneshot`, backed by the in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use community_push_service::auth::Claims;
use community_push_service::config::Settings;
use community_push_service::gateway::LogGateway;
use community_push_service::server::{create_app, AppState};
use community_push_service::store::{DocumentStore, Fields, MemoryDocumentStore};
use community_push_service::triggers::Services;

const SECRET: &str = "http-test-secret";
const API_KEY: &str = "trigger-key";

fn settings() -> Settings {
    serde_json::from_value(json!({
        "jwt": { "secret": SECRET },
        "api": { "key": API_KEY },
        "scheduler": { "enabled": false }
    }))
    .unwrap()
}

async fn app() -> (Router, Arc<MemoryDocumentStore>) {
    let settings = settings();
    let store = Arc::new(MemoryDocumentStore::new());
    for (id, value) in [
        ("admin", json!({ "fcmTokens": ["T1", "T2"], "roles": ["Admin"] })),
        ("member", json!({ "fcmTokens": ["T3"], "roles": "Member" })),
    ] {
        let fields: Fields = value.as_object().cloned().unwrap();
        store.set("users", id, fields).await.unwrap();
    }

    let services = Arc::new(Services::from_settings(
        store.clone(),
        Arc::new(LogGateway::new()),
        &settings,
    ));
    let state = AppState::new(settings, services, None);
    (create_app(state), store)
}

fn bearer_for(uid: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        exp: now + 3600,
        iat: now,
        extra: Default::default(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn manual_request(auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post("/api/v1/notifications/manual")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health_reports_store_and_gateway() {
    let (app, _) = app().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["gateway"]["name"], "log");
}

#[tokio::test]
async fn test_manual_broadcast_wrapped_payload() {
    let (app, _) = app().await;
    let auth = bearer_for("admin");

    let response = app
        .oneshot(manual_request(
            Some(&auth),
            json!({ "data": { "title": "Msza", "body": "Niedziela 10:00" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["targetedTokensCount"], 3);
    assert_eq!(body["details"]["successCount"], 3);
    assert_eq!(body["details"]["requestedRole"], "all");
}

#[tokio::test]
async fn test_manual_without_token_is_unauthenticated() {
    let (app, store) = app().await;

    let response = app
        .oneshot(manual_request(None, json!({ "title": "t", "body": "b" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["status"], "unauthenticated");
    assert_eq!(store.read_count(), 0);
}

#[tokio::test]
async fn test_manual_with_bad_token_is_unauthenticated() {
    let (app, store) = app().await;

    let response = app
        .oneshot(manual_request(
            Some("Bearer not-a-jwt"),
            json!({ "title": "t", "body": "b" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.read_count(), 0);

    let body = json_body(response).await;
    assert_eq!(body["error"]["status"], "unauthenticated");
    assert_eq!(body["error"]["message"], "Musisz być zalogowany.");
}

#[tokio::test]
async fn test_expired_token_gets_the_same_message_as_no_token() {
    let (app, _) = app().await;
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: "admin".to_string(),
        exp: now - 3600,
        iat: now - 7200,
        extra: Default::default(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let expired = app
        .clone()
        .oneshot(manual_request(
            Some(&format!("Bearer {}", token)),
            json!({ "title": "t", "body": "b" }),
        ))
        .await
        .unwrap();
    let anonymous = app
        .oneshot(manual_request(None, json!({ "title": "t", "body": "b" })))
        .await
        .unwrap();

    let expired = json_body(expired).await;
    let anonymous = json_body(anonymous).await;
    assert_eq!(expired["error"], anonymous["error"]);
    assert!(!expired["error"]["message"]
        .as_str()
        .unwrap()
        .contains("ExpiredSignature"));
}

#[tokio::test]
async fn test_manual_member_is_denied() {
    let (app, _) = app().await;
    let auth = bearer_for("member");

    let response = app
        .oneshot(manual_request(Some(&auth), json!({ "title": "t", "body": "b" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await;
    assert_eq!(body["error"]["status"], "permission-denied");
}

#[tokio::test]
async fn test_manual_missing_body_is_invalid_argument() {
    let (app, _) = app().await;
    let auth = bearer_for("admin");

    let response = app
        .oneshot(manual_request(Some(&auth), json!({ "title": "t" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["status"], "invalid-argument");
}

#[tokio::test]
async fn test_trigger_routes_require_api_key() {
    let (app, _) = app().await;

    let event = json!({ "path": "events", "documentId": "e1", "data": { "title": "Piknik" } });
    let response = app
        .clone()
        .oneshot(
            Request::post("/triggers/documents")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::post("/triggers/documents")
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-API-Key", API_KEY)
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["outcome"], "notified");
    assert_eq!(body["successCount"], 3);
}

#[tokio::test]
async fn test_run_schedule_by_name() {
    let (app, store) = app().await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/triggers/schedules/cleanup")
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["job"], "cleanup");
    assert_eq!(body["wallsFound"], 0);
    assert_eq!(store.collection_len("users"), 2);

    let response = app
        .oneshot(
            Request::post("/triggers/schedules/reports")
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
