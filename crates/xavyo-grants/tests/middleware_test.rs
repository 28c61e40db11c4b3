//! End-to-end: refresh layer, cache and evaluator behind an axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, routing::get, Extension, Router};
use http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_grants::{
    CacheKey, CachedGrantEvaluator, GrantEvaluator, GrantsConfig, GrantsLayer, HttpGrantsClient,
    PacketCache, Principal, RefreshOutcome, UserId, Userspace, UserspaceId, WorkGroupId,
};

const ROLES_READ: &str = "base-system.work-group.roles-read";

struct Harness {
    app: Router,
    cache: Arc<PacketCache>,
}

fn harness(server: &MockServer, use_cache: bool) -> Harness {
    let config = GrantsConfig::builder()
        .base_uri(server.uri())
        .use_cache(use_cache)
        .cache_ttl(Duration::from_secs(60))
        .request_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let client = Arc::new(HttpGrantsClient::new(&config).unwrap());
    let layer = GrantsLayer::from_config(client, config);
    let cache = Arc::clone(layer.gate().cache());
    let evaluator: Arc<dyn GrantEvaluator> = Arc::new(CachedGrantEvaluator::new(cache.clone()));

    let app = Router::new()
        .route("/work-groups/:id/roles", get(read_roles))
        .layer(Extension(evaluator))
        .layer(layer);

    Harness { app, cache }
}

async fn read_roles(
    axum::extract::Path(work_group_id): axum::extract::Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(grants): Extension<Arc<dyn GrantEvaluator>>,
    Extension(outcome): Extension<RefreshOutcome>,
    Userspace(userspace_id): Userspace,
) -> (StatusCode, String) {
    let allowed = grants.has_grant(
        Some(&principal),
        userspace_id,
        WorkGroupId::new(work_group_id),
        ROLES_READ,
    );
    let status = if allowed {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    (status, format!("{outcome:?}"))
}

fn request(uri: &str, principal: Principal, userspace: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(userspace) = userspace {
        builder = builder.header("x-smon-userspace-id", userspace);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(principal);
    request
}

fn user(id: i64) -> Principal {
    Principal::new().with_claim("sub", id.to_string())
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn mount_packets(server: &MockServer, user_id: i64, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/pl/user-grants/users/{user_id}/packets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "type": "Regular",
                "grants": [ROLES_READ],
                "owners": [
                    { "packetId": 1, "userspaceId": 9, "workGroupId": 5, "users": [user_id] }
                ]
            }
        ])))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_grant_allowed_in_owned_work_group() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 1).await;
    let harness = harness(&server, true);

    let response = harness
        .app
        .oneshot(request("/work-groups/5/roles", user(42), Some("9")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Refreshed { packets: 1 }");
}

#[tokio::test]
async fn test_grant_denied_in_other_work_group() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 1).await;
    let harness = harness(&server, true);

    let response = harness
        .app
        .oneshot(request("/work-groups/6/roles", user(42), Some("9")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_fresh_entry_is_not_refetched() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 1).await;
    let harness = harness(&server, true);

    for expected in ["Refreshed { packets: 1 }", "Fresh"] {
        let response = harness
            .app
            .clone()
            .oneshot(request("/work-groups/5/roles", user(42), Some("9")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, expected);
    }

    let key = CacheKey::new(UserId::new(42)).with_userspace(UserspaceId::new(9));
    assert_eq!(harness.cache.get(&key).len(), 1);
}

#[tokio::test]
async fn test_cache_disabled_refetches_every_request() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 2).await;
    let harness = harness(&server, false);

    for _ in 0..2 {
        let response = harness
            .app
            .clone()
            .oneshot(request("/work-groups/5/roles", user(42), Some("9")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_server_error_fails_open_and_denies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pl/user-grants/users/42/packets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let harness = harness(&server, true);

    let response = harness
        .app
        .oneshot(request("/work-groups/5/roles", user(42), Some("9")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "FetchFailed");
}

#[tokio::test]
async fn test_system_user_skips_server_and_is_allowed() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 0).await;
    let harness = harness(&server, true);
    let system = Principal::new().with_claim("client_id", "smon-res-owner");

    let response = harness
        .app
        .oneshot(request("/work-groups/77/roles", system, Some("9")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_missing_userspace_header_rejected() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 1).await;
    let harness = harness(&server, true);

    let response = harness
        .app
        .oneshot(request("/work-groups/5/roles", user(42), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "userspace_not_found");
    assert_eq!(body["message"], "Header x-smon-userspace-id not defined.");
}

#[tokio::test]
async fn test_invalid_userspace_header_rejected() {
    let server = MockServer::start().await;
    mount_packets(&server, 42, 1).await;
    let harness = harness(&server, true);

    let response = harness
        .app
        .oneshot(request("/work-groups/5/roles", user(42), Some("abc")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        body["message"],
        "Unable to convert userspace ID from header x-smon-userspace-id to valid value."
    );
}
