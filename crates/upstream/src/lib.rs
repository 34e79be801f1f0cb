use async_trait::async_trait;
use shared::domain::{AllowanceSnapshot, UserId, UserIdentity};

pub mod aggregator;
pub mod allowance;
pub mod error;
pub mod identity;
pub mod retry;

pub use aggregator::Aggregator;
pub use allowance::{AllowanceWindow, HttpAllowanceResolver};
pub use error::UpstreamError;
pub use identity::HttpIdentityResolver;
pub use retry::{Jitter, RetryPolicy};

/// Single-attempt lookup of a user's social profile.
///
/// `Ok(None)` means the graph has no record for the id.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn fetch_identity(&self, id: UserId) -> Result<Option<UserIdentity>, UpstreamError>;
}

/// Single-attempt lookup of a user's newest allowance snapshot.
///
/// `Ok(None)` means the ledger has no snapshot for the id.
#[async_trait]
pub trait AllowanceSource: Send + Sync {
    async fn fetch_current_allowance(
        &self,
        id: UserId,
    ) -> Result<Option<AllowanceSnapshot>, UpstreamError>;
}
