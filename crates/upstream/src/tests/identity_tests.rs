use super::*;
use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone)]
struct GraphServerState {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<(Option<String>, String)>>>,
}

async fn handle_graph(
    State(state): State<GraphServerState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query = request["query"].as_str().unwrap_or_default().to_string();
    state.requests.lock().await.push((auth, query));
    (state.status, Json(state.body.clone()))
}

async fn spawn_graph_server(status: StatusCode, body: Value) -> (Url, GraphServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = GraphServerState {
        status,
        body,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/gql", post(handle_graph))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("http://{addr}/gql")).expect("url");
    (url, state)
}

async fn spawn_stalled_graph_server(delay: Duration) -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route(
        "/gql",
        post(move || async move {
            tokio::time::sleep(delay).await;
            Json(socials(json!([])))
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/gql")).expect("url")
}

async fn closed_port_url() -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    Url::parse(&format!("http://{addr}/gql")).expect("url")
}

fn resolver(url: Url) -> HttpIdentityResolver {
    HttpIdentityResolver::new(url, "test-key", Duration::from_secs(5)).expect("client")
}

fn socials(records: Value) -> Value {
    json!({ "data": { "Socials": { "Social": records } } })
}

#[test]
fn query_interpolates_id_into_single_filter() {
    let query = build_identity_query(UserId(3621));
    assert!(query.contains(r#"userId: {_eq: "3621"}"#));
    assert!(query.contains("profileImage"));
}

#[test]
fn first_record_wins() {
    let body = socials(json!([
        { "dappName": "farcaster", "profileName": "alice", "profileImage": "https://img/a.png" },
        { "dappName": "lens", "profileName": "alice.lens", "profileImage": "" }
    ]));
    let identity = parse_identity(UserId(9), body.to_string().as_bytes())
        .expect("parse")
        .expect("found");
    assert_eq!(identity.id, UserId(9));
    assert_eq!(identity.display_name, "alice");
    assert_eq!(identity.dapp_name, "farcaster");
    assert_eq!(identity.avatar_ref.as_deref(), Some("https://img/a.png"));
}

#[test]
fn empty_or_null_social_list_is_not_found() {
    for body in [
        socials(json!([])),
        socials(Value::Null),
        json!({ "data": { "Socials": null } }),
    ] {
        let outcome = parse_identity(UserId(1), body.to_string().as_bytes()).expect("parse");
        assert!(outcome.is_none(), "body: {body}");
    }
}

#[test]
fn blank_avatar_is_dropped() {
    let body = socials(json!([
        { "dappName": "farcaster", "profileName": "bob", "profileImage": "  " }
    ]));
    let identity = parse_identity(UserId(2), body.to_string().as_bytes())
        .expect("parse")
        .expect("found");
    assert_eq!(identity.avatar_ref, None);
}

#[test]
fn graph_errors_without_data_are_malformed() {
    let body = json!({ "errors": [{ "message": "rate limited" }] });
    let err = parse_identity(UserId(1), body.to_string().as_bytes()).expect_err("must fail");
    assert!(matches!(err, UpstreamError::Malformed(ref m) if m.contains("rate limited")));

    let err = parse_identity(UserId(1), b"<html>").expect_err("must fail");
    assert!(matches!(err, UpstreamError::Malformed(_)));
}

#[tokio::test]
async fn sends_api_key_and_query_to_graph_endpoint() {
    let body = socials(json!([
        { "dappName": "farcaster", "profileName": "carol", "profileImage": "https://img/c.png" }
    ]));
    let (url, state) = spawn_graph_server(StatusCode::OK, body).await;

    let identity = resolver(url)
        .fetch_identity(UserId(77))
        .await
        .expect("fetch")
        .expect("found");
    assert_eq!(identity.display_name, "carol");

    let requests = state.requests.lock().await.clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("test-key"));
    assert!(requests[0].1.contains(r#"_eq: "77""#));
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let (url, _state) =
        spawn_graph_server(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "boom" })).await;
    let err = resolver(url)
        .fetch_identity(UserId(1))
        .await
        .expect_err("must fail");
    assert_eq!(err, UpstreamError::Status(500));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_graph_is_cut_off_by_client_timeout() {
    let url = spawn_stalled_graph_server(Duration::from_secs(3)).await;
    let resolver =
        HttpIdentityResolver::new(url, "test-key", Duration::from_millis(150)).expect("client");

    let started = std::time::Instant::now();
    let err = resolver
        .fetch_identity(UserId(1))
        .await
        .expect_err("must time out");
    assert!(matches!(err, UpstreamError::Timeout(_)), "got {err:?}");
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let err = resolver(closed_port_url().await)
        .fetch_identity(UserId(1))
        .await
        .expect_err("must fail");
    assert!(matches!(err, UpstreamError::Network(_)), "got {err:?}");
    assert!(err.is_retryable());
}
