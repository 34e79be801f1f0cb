use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use frame_api::{handle_frame, parse_payload, FrameDocument};
use shared::protocol::Route;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub mod app_state;
pub mod config;

pub use app_state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(Route::Landing.path(), get(landing).post(landing))
        .route(Route::CheckRequested.path(), get(check).post(check))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn landing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    frame_route(&state, Route::Landing, &headers, &body).await
}

async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    frame_route(&state, Route::CheckRequested, &headers, &body).await
}

async fn frame_route(state: &AppState, route: Route, headers: &HeaderMap, body: &[u8]) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("frame", %request_id, route = route.path());

    // Dropping the handler future (client went away) cancels upstream work.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let document = async {
        let payload = parse_payload(body);
        let document = handle_frame(&state.frame, route, &payload, &cancel).await;
        info!(screen = ?document.screen, "frame: rendered");
        document
    }
    .instrument(span)
    .await;

    respond(document, wants_json(headers))
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

fn respond(document: FrameDocument, json: bool) -> Response {
    if json {
        return Json(document).into_response();
    }
    let mut response = Html(document.to_html()).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
