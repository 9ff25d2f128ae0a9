/// HTTP API tests
/// Exercises the axum router over the in-memory resolver backend
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use identity_engine::{config::EngineConfig, server::build_router, AppContext};
use serde_json::{json, Value};
use tower::ServiceExt;

const RESOLVER: &str = "http://localhost:5000";
const SEED: &str = "EcnwYkUvCwZUrX4QbChrLXBuEc5qsVxMr5upX3VSsmgo";

fn app() -> Router {
    let config = EngineConfig::from_vars(|key| match key {
        "IDENTITY_RESOLVER_BACKEND" => Some("memory".to_string()),
        "IDENTITY_RESOLVER_URL" => Some(RESOLVER.to_string()),
        _ => None,
    })
    .unwrap();
    build_router(AppContext::new(config).unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

fn identity(key: &str, name: &str) -> Value {
    json!({ "seed": SEED, "key": key, "name": name })
}

async fn create(app: &Router, kind: &str, key: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/identities/{}", kind),
        Some(json!({ "resolverAddress": RESOLVER, "identity": identity(key, name) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["did"].as_str().unwrap().to_string()
}

fn get_opts(key: &str, name: &str, did: &str) -> Value {
    json!({ "seed": SEED, "key": key, "name": name, "did": did })
}

#[tokio::test]
async fn test_health_and_ping() {
    let app = app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/api/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "pong");
}

#[tokio::test]
async fn test_create_seed() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/seed", None).await;

    assert_eq!(status, StatusCode::OK);
    let seed = body["seed"].as_str().unwrap();
    assert_eq!(bs58::decode(seed).into_vec().unwrap().len(), 32);
    assert_eq!(body["mnemonics"].as_str().unwrap().split_whitespace().count(), 24);
    assert!(body.get("mnemonic").is_none());
}

#[tokio::test]
async fn test_create_identity_and_fetch_document() {
    let app = app();
    let did = create(&app, "agent", "#agent-key-0", "#agent-0").await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/documents/{}?resolverAddress={}", did, RESOLVER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doc"]["id"], did);
    assert_eq!(body["doc"]["subjectType"], "agent");
}

#[tokio::test]
async fn test_error_shapes() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/identities/agent",
        Some(json!({
            "resolverAddress": RESOLVER,
            "identity": { "seed": "not-base58-0OIl", "key": "#k", "name": "#n" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidSeed");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/api/identities/robot",
        Some(json!({ "resolverAddress": RESOLVER, "identity": identity("#k", "#n") })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/documents/did:iotics:iotMissing?resolverAddress={}", RESOLVER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    let (status, body) = send(&app, "GET", "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_malformed_json_body_uses_error_shape() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/identities/agent")
        .header("content-type", "application/json")
        .body(Body::from("{\"resolverAddress\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "InvalidArgument");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/api/tokens",
        Some(json!({ "userDid": "did:iotics:iotUser" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");

    let (status, body) = send(&app, "POST", "/api/cache/config", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");
}

#[tokio::test]
async fn test_delegation_and_token_endpoints() {
    let app = app();
    let user = create(&app, "user", "#user-key-0", "#user-0").await;
    let agent = create(&app, "agent", "#agent-key-0", "#agent-0").await;
    let agent_opts = get_opts("#agent-key-0", "#agent-0", &agent);

    let token_request = json!({
        "agent": agent_opts,
        "userDid": user,
        "durationMs": 60_000,
        "audience": "https://host.example.com"
    });

    let (status, body) = send(&app, "POST", "/api/tokens", Some(token_request.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = send(
        &app,
        "POST",
        "/api/delegations/authentication",
        Some(json!({
            "resolverAddress": RESOLVER,
            "subject": get_opts("#user-key-0", "#user-0", &user),
            "agent": agent_opts,
            "delegationName": "#a-deleg-0"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["did"], user);
    assert_eq!(body["subjectType"], "user");
    assert_eq!(body["agentDid"], agent);
    assert_eq!(body["delegationName"], "#a-deleg-0");

    let (status, body) = send(&app, "POST", "/api/tokens", Some(token_request)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/tokens/validate",
        Some(json!({ "token": token, "audience": "https://host.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["sub"], user);
}

#[tokio::test]
async fn test_control_delegation_type_mismatch() {
    let app = app();
    let user = create(&app, "user", "#user-key-0", "#user-0").await;
    let agent = create(&app, "agent", "#agent-key-0", "#agent-0").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/delegations/control",
        Some(json!({
            "resolverAddress": RESOLVER,
            "subject": get_opts("#user-key-0", "#user-0", &user),
            "agent": get_opts("#agent-key-0", "#agent-0", &agent),
            "delegationName": "#c-deleg-0"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "TypeMismatch");
}

#[tokio::test]
async fn test_token_duration_must_be_positive() {
    let app = app();
    let agent = create(&app, "agent", "#agent-key-0", "#agent-0").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/tokens",
        Some(json!({
            "agent": get_opts("#agent-key-0", "#agent-0", &agent),
            "userDid": "did:iotics:iotUser",
            "durationMs": 0,
            "audience": "aud"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidDuration");
}

#[tokio::test]
async fn test_cache_config() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/cache/config",
        Some(json!({ "ttlSec": 30, "size": 64 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = send(&app, "GET", "/api/cache/config", None).await;
    assert_eq!(body["ttlSec"], 30);
    assert_eq!(body["size"], 64);

    let (status, body) = send(
        &app,
        "POST",
        "/api/cache/config",
        Some(json!({ "ttlSec": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");
}
