//! Frame navigation: which screen an interaction lands on.
//!
//! ```text
//! Landing --check--> CheckRequested --+--> MissingIdentifier
//!    ^                                +--> UpstreamError
//!    |                                +--> Result
//!    |                                +--> PartialData
//!    +------------- back --------------------+
//! ```

use shared::{
    domain::{AggregateResult, UserId},
    protocol::{FrameActionPayload, Route, ScreenState},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use upstream::Aggregator;

use crate::policy::RequiredFields;

/// Where an interaction ended up, with the data gathered on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub screen: ScreenState,
    pub fid: Option<UserId>,
    pub aggregate: AggregateResult,
}

/// The single route a screen's action leads to.
pub fn next_route(screen: ScreenState) -> Route {
    match screen {
        ScreenState::Landing => Route::CheckRequested,
        ScreenState::MissingIdentifier
        | ScreenState::Result
        | ScreenState::PartialData
        | ScreenState::UpstreamError => Route::Landing,
    }
}

/// Terminal screen for a finished aggregation.
pub fn classify(required: &RequiredFields, aggregate: &AggregateResult) -> ScreenState {
    if required.iter().any(|field| aggregate.has_failure(field)) {
        ScreenState::UpstreamError
    } else if aggregate.is_complete() {
        ScreenState::Result
    } else {
        ScreenState::PartialData
    }
}

pub async fn advance(
    route: Route,
    payload: &FrameActionPayload,
    aggregator: &Aggregator,
    required: &RequiredFields,
    cancel: &CancellationToken,
) -> Outcome {
    if route == Route::Landing {
        return Outcome {
            screen: ScreenState::Landing,
            fid: None,
            aggregate: AggregateResult::default(),
        };
    }

    let Some(fid) = payload.user_id() else {
        info!("frame: check requested without a user id");
        return Outcome {
            screen: ScreenState::MissingIdentifier,
            fid: None,
            aggregate: AggregateResult::default(),
        };
    };

    let aggregate = aggregator.aggregate(fid, cancel).await;
    let screen = classify(required, &aggregate);
    if screen == ScreenState::UpstreamError {
        warn!(%fid, failures = aggregate.failures.len(), "frame: required upstream failed");
    } else {
        info!(%fid, ?screen, "frame: check resolved");
    }
    Outcome {
        screen,
        fid: Some(fid),
        aggregate,
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
