//! End-to-end tests of the trigger handlers
//!
//! These tests drive the public handlers against the in-memory store and a
//! recording gateway, without starting the HTTP server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use community_push_service::auth::CallerIdentity;
use community_push_service::config::{NotificationsConfig, SchedulerConfig};
use community_push_service::error::CallableError;
use community_push_service::gateway::{
    BatchResponse, GatewayError, MulticastMessage, PushGateway, SendResponse,
};
use community_push_service::notification::{
    DataPayload, Notification, PushDispatcher, RecipientResolver, RoleFilter, TokenSet,
};
use community_push_service::store::{
    format_timestamp, DocumentStore, Fields, MemoryDocumentStore,
};
use community_push_service::triggers::{
    cleanup_old_wishes, on_document_created, send_birthday_notifications,
    send_manual_notification, wishes_path, CreationOutcome, DocumentCreatedEvent, Services,
    LAST_UPDATED_FIELD, WALLS_COLLECTION,
};

/// Gateway that records multicasts and replays queued responses
#[derive(Default)]
struct RecordingGateway {
    calls: Mutex<Vec<MulticastMessage>>,
    replies: Mutex<VecDeque<Vec<SendResponse>>>,
}

impl RecordingGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn reply_with(&self, responses: Vec<SendResponse>) {
        self.replies.lock().unwrap().push_back(responses);
    }

    fn calls(&self) -> Vec<MulticastMessage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse, GatewayError> {
        self.calls.lock().unwrap().push(message.clone());
        let responses = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            (0..message.tokens.len())
                .map(|i| SendResponse::delivered(format!("projects/p/messages/{}", i)))
                .collect()
        });
        Ok(BatchResponse::from_responses(responses))
    }
}

struct Env {
    store: Arc<MemoryDocumentStore>,
    gateway: Arc<RecordingGateway>,
    services: Services,
}

fn env() -> Env {
    let store = Arc::new(MemoryDocumentStore::new());
    let gateway = RecordingGateway::new();
    let services = Services::new(
        store.clone(),
        gateway.clone(),
        "users",
        NotificationsConfig::default(),
        SchedulerConfig::default(),
    );
    Env {
        store,
        gateway,
        services,
    }
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

async fn user(store: &MemoryDocumentStore, id: &str, value: Value) {
    store.set("users", id, fields(value)).await.unwrap();
}

/// u1 is an admin with T1, T2; u2 a member with T1, T3
async fn two_users(store: &MemoryDocumentStore) {
    user(store, "u1", json!({ "fcmTokens": ["T1", "T2"], "roles": ["Admin"] })).await;
    user(store, "u2", json!({ "fcmTokens": ["T1", "T3"], "roles": "Member" })).await;
}

fn tokens(set: &TokenSet) -> Vec<&str> {
    set.iter().collect()
}

#[tokio::test]
async fn test_resolution_dedupes_shared_tokens() {
    let env = env();
    two_users(&env.store).await;
    let resolver = RecipientResolver::new(env.store.clone(), "users");

    let all = resolver.resolve(&RoleFilter::All, "test").await.unwrap();
    assert_eq!(tokens(&all), vec!["T1", "T2", "T3"]);

    let admins = resolver
        .resolve(&RoleFilter::from_option(Some("Admin")), "test")
        .await
        .unwrap();
    assert_eq!(tokens(&admins), vec!["T1", "T2"]);

    let nobody = resolver
        .resolve(&RoleFilter::from_option(Some("Guest")), "test")
        .await
        .unwrap();
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn test_legacy_role_field_is_honoured() {
    let env = env();
    user(&env.store, "old", json!({ "fcmTokens": ["L1"], "role": "Admin" })).await;
    user(&env.store, "new", json!({ "fcmTokens": ["N1"], "roles": ["Member"] })).await;
    let resolver = RecipientResolver::new(env.store.clone(), "users");

    let admins = resolver
        .resolve(&RoleFilter::from_option(Some("Admin")), "test")
        .await
        .unwrap();
    assert_eq!(tokens(&admins), vec!["L1"]);
}

#[tokio::test]
async fn test_empty_dispatch_makes_no_gateway_call() {
    let gateway = RecordingGateway::new();
    let dispatcher = PushDispatcher::new(gateway.clone());

    let outcome = dispatcher
        .dispatch(&TokenSet::new(), &Notification::new("t", "b"), &DataPayload::new(), "test")
        .await
        .unwrap();

    assert_eq!(outcome.total(), 0);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_short_gateway_reply_is_padded() {
    let gateway = RecordingGateway::new();
    gateway.reply_with(vec![SendResponse::delivered("m0")]);
    let dispatcher = PushDispatcher::new(gateway.clone());

    let mut set = TokenSet::new();
    for token in ["A", "B", "C"] {
        set.insert(token);
    }
    let outcome = dispatcher
        .dispatch(&set, &Notification::new("t", "b"), &DataPayload::new(), "test")
        .await
        .unwrap();

    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.failure_count, 2);
    assert_eq!(outcome.responses.len(), 3);
    assert_eq!(outcome.responses[2].token, "C");
    assert_eq!(outcome.responses[2].error_code.as_deref(), Some("UNKNOWN_CODE"));
}

#[tokio::test]
async fn test_unregistered_token_is_reported_per_position() {
    let gateway = RecordingGateway::new();
    gateway.reply_with(vec![
        SendResponse::delivered("m0"),
        SendResponse::failed(
            Some("messaging/registration-token-not-registered".to_string()),
            Some("Requested entity was not found.".to_string()),
        ),
    ]);
    let dispatcher = PushDispatcher::new(gateway);

    let mut set = TokenSet::new();
    set.insert("A");
    set.insert("B");
    let outcome = dispatcher
        .dispatch(&set, &Notification::new("t", "b"), &DataPayload::new(), "test")
        .await
        .unwrap();

    assert_eq!((outcome.success_count, outcome.failure_count), (1, 1));
    let failed: Vec<_> = outcome.failures().map(|r| r.token.as_str()).collect();
    assert_eq!(failed, vec!["B"]);
}

#[tokio::test]
async fn test_manual_broadcast_to_members() {
    let env = env();
    two_users(&env.store).await;
    let admin = CallerIdentity::new("u1");

    let response = send_manual_notification(
        &env.services,
        Some(&admin),
        &json!({ "title": " Zebranie ", "body": "Jutro o 18", "targetRole": "Member" }),
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.details.targeted_tokens_count, 2);
    assert_eq!(response.details.success_count, 2);
    assert_eq!(response.details.requested_role, "Member");

    let calls = env.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tokens, vec!["T1", "T3"]);
    assert_eq!(calls[0].notification.title, "Zebranie");
    assert_eq!(calls[0].data.get("triggeredBy").map(String::as_str), Some("manual_admin"));
    assert_eq!(calls[0].data.get("adminUid").map(String::as_str), Some("u1"));
}

#[tokio::test]
async fn test_manual_without_caller_touches_nothing() {
    let env = env();
    two_users(&env.store).await;

    let err = send_manual_notification(&env.services, None, &json!({ "title": "t", "body": "b" }))
        .await
        .unwrap_err();

    assert_eq!(err.status(), "unauthenticated");
    assert_eq!(env.store.read_count(), 0);
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_manual_non_admin_denied_before_validation() {
    let env = env();
    two_users(&env.store).await;
    let member = CallerIdentity::new("u2");

    // Invalid input, but the role check comes first
    let err = send_manual_notification(&env.services, Some(&member), &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, CallableError::PermissionDenied(_)));
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_manual_blank_title_rejected_before_resolution() {
    let env = env();
    two_users(&env.store).await;
    let admin = CallerIdentity::new("u1");

    let err = send_manual_notification(
        &env.services,
        Some(&admin),
        &json!({ "title": "   ", "body": "b" }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), "invalid-argument");
    // Only the admin lookup
    assert_eq!(env.store.read_count(), 1);
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_announcement_targets_role_only_in_announcements() {
    let env = env();
    two_users(&env.store).await;

    let event = DocumentCreatedEvent::new(
        "ogloszenia",
        "o1",
        Some(fields(json!({ "title": "Dla adminów", "rolaDocelowa": "Admin" }))),
    );
    let CreationOutcome::Notified(outcome) = on_document_created(&env.services, &event).await else {
        panic!("announcement should be dispatched");
    };
    assert_eq!(outcome.success_count, 2);

    // The same field on another collection is ignored
    let event = DocumentCreatedEvent::new(
        "events",
        "e1",
        Some(fields(json!({ "title": "Piknik", "rolaDocelowa": "Admin" }))),
    );
    on_document_created(&env.services, &event).await;

    let calls = env.gateway.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tokens, vec!["T1", "T2"]);
    assert_eq!(calls[1].tokens, vec!["T1", "T2", "T3"]);
    assert_eq!(calls[1].data.get("sourceCollection").map(String::as_str), Some("events"));
    assert_eq!(calls[1].data.get("sourceDocId").map(String::as_str), Some("e1"));
}

#[tokio::test]
async fn test_unwatched_collection_does_no_store_access() {
    let env = env();
    two_users(&env.store).await;

    let event = DocumentCreatedEvent::new("comments", "c1", Some(fields(json!({ "title": "x" }))));
    assert_eq!(on_document_created(&env.services, &event).await, CreationOutcome::Ignored);
    assert_eq!(env.store.read_count(), 0);
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_new_wish_touches_wall() {
    let env = env();

    let event = DocumentCreatedEvent::new(wishes_path("u7"), "w1", Some(fields(json!({ "text": "100 lat" }))));
    assert_eq!(on_document_created(&env.services, &event).await, CreationOutcome::WallTouched);

    let wall = env.store.get(WALLS_COLLECTION, "u7").await.unwrap().unwrap();
    assert!(wall.str_field(LAST_UPDATED_FIELD).is_some());
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_no_birthdays_means_one_query_and_no_sends() {
    let env = env();
    user(&env.store, "u1", json!({ "fcmTokens": ["T1"], "birthMonth": 1, "birthDay": 2 })).await;

    let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
    let summary = send_birthday_notifications(&env.services, today).await;

    assert_eq!(summary.birthday_users, 0);
    assert_eq!(env.store.read_count(), 1);
    assert!(env.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_birthday_broadcast_per_celebrant() {
    let env = env();
    user(&env.store, "u1", json!({ "fcmTokens": ["T1"], "birthMonth": 6, "birthDay": 15, "displayName": "Ania" })).await;
    user(&env.store, "u2", json!({ "fcmTokens": ["T2"], "birthMonth": 6, "birthDay": 15 })).await;
    user(&env.store, "u3", json!({ "fcmTokens": ["T3"], "birthMonth": 7, "birthDay": 15 })).await;

    let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
    let summary = send_birthday_notifications(&env.services, today).await;

    assert_eq!(summary.birthday_users, 2);
    assert_eq!(summary.dispatches, 2);
    assert_eq!(summary.success_count, 6);

    let calls = env.gateway.calls();
    assert_eq!(calls[0].tokens, vec!["T1", "T2", "T3"]);
    assert!(calls[0].notification.body.contains("Ania"));
    assert!(calls[1].notification.body.contains("Ktoś z naszej wspólnoty"));
    assert_eq!(calls[1].data.get("type").map(String::as_str), Some("BIRTHDAY"));
}

#[test]
fn test_cleanup_keeps_fresh_walls() {
    tokio_test::block_on(async {
        let env = env();
        let now = Utc::now();

        let mut stale = Fields::new();
        stale.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(format_timestamp(now - Duration::days(30))),
        );
        let mut fresh = Fields::new();
        fresh.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(format_timestamp(now - Duration::days(1))),
        );
        env.store.set(WALLS_COLLECTION, "old", stale).await.unwrap();
        env.store.set(WALLS_COLLECTION, "recent", fresh).await.unwrap();

        // More wishes than one page holds
        for i in 0..250 {
            env.store
                .set(&wishes_path("old"), &format!("w{:03}", i), Fields::new())
                .await
                .unwrap();
        }
        env.store.set(&wishes_path("recent"), "w0", Fields::new()).await.unwrap();

        let summary = cleanup_old_wishes(&env.services, now).await;

        assert_eq!(summary.walls_found, 1);
        assert_eq!(summary.walls_deleted, 1);
        assert_eq!(summary.wishes_deleted, 250);
        assert!(summary.error.is_none());
        assert_eq!(env.store.collection_len(&wishes_path("old")), 0);
        assert_eq!(env.store.collection_len(&wishes_path("recent")), 1);
        assert!(env.store.get(WALLS_COLLECTION, "recent").await.unwrap().is_some());
    });
}
