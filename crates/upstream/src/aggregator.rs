use std::{collections::BTreeSet, sync::Arc};

use shared::{
    domain::{AggregateResult, UserId},
    error::{Source, SourceFailure},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::UpstreamError,
    retry::{retry_with_backoff, RetryPolicy},
    AllowanceSource, IdentitySource,
};

/// Fans one id out to both upstream sources and folds the outcomes into a
/// single [`AggregateResult`].
#[derive(Clone)]
pub struct Aggregator {
    identity: Arc<dyn IdentitySource>,
    allowance: Arc<dyn AllowanceSource>,
    retry: RetryPolicy,
}

impl Aggregator {
    pub fn new(
        identity: Arc<dyn IdentitySource>,
        allowance: Arc<dyn AllowanceSource>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            allowance,
            retry,
        }
    }

    /// Always settles both branches and never fails; transport failures
    /// land in `failures`, "not found" just leaves the field empty.
    pub async fn aggregate(&self, id: UserId, cancel: &CancellationToken) -> AggregateResult {
        let identity = retry_with_backoff(&self.retry, cancel, Source::Identity, id, || {
            self.identity.fetch_identity(id)
        });
        let allowance = retry_with_backoff(&self.retry, cancel, Source::Allowance, id, || {
            self.allowance.fetch_current_allowance(id)
        });
        let (identity, allowance) = tokio::join!(identity, allowance);

        let mut failures = BTreeSet::new();
        let identity = settle(Source::Identity, id, identity, &mut failures);
        let allowance = settle(Source::Allowance, id, allowance, &mut failures);

        AggregateResult {
            identity,
            allowance,
            failures,
        }
    }
}

fn settle<T>(
    source: Source,
    fid: UserId,
    outcome: Result<Option<T>, UpstreamError>,
    failures: &mut BTreeSet<SourceFailure>,
) -> Option<T> {
    match outcome {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            info!(%source, %fid, "upstream: no record for id");
            None
        }
        Err(error) => {
            warn!(
                %source,
                %fid,
                status = error.status(),
                %error,
                "upstream: fetch failed"
            );
            failures.insert(SourceFailure::new(source, error.kind()));
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
