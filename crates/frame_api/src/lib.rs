use std::sync::Arc;

use shared::protocol::{FrameActionPayload, Route};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use upstream::Aggregator;

pub mod machine;
pub mod package;
pub mod policy;
pub mod render;

pub use package::{FrameDocument, PackagerConfig};
pub use policy::{AssetPalette, FramePolicy, LabelTemplates, RequiredFields};

#[derive(Clone)]
pub struct FrameContext {
    pub aggregator: Aggregator,
    pub policy: Arc<FramePolicy>,
    pub packager: PackagerConfig,
}

/// Reads a host frame action body. Anything unreadable is treated as a
/// payload without a user id.
pub fn parse_payload(body: &[u8]) -> FrameActionPayload {
    if body.iter().all(u8::is_ascii_whitespace) {
        return FrameActionPayload::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|error| {
        debug!(%error, "frame: unreadable action payload");
        FrameActionPayload::default()
    })
}

/// Runs one interaction end to end. Every path produces a document.
pub async fn handle_frame(
    ctx: &FrameContext,
    route: Route,
    payload: &FrameActionPayload,
    cancel: &CancellationToken,
) -> FrameDocument {
    let outcome = machine::advance(
        route,
        payload,
        &ctx.aggregator,
        &ctx.policy.required,
        cancel,
    )
    .await;
    let response = render::render(
        outcome.screen,
        &outcome.aggregate,
        &ctx.policy,
        &mut rand::thread_rng(),
    );
    package::package(&response, &ctx.packager)
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
