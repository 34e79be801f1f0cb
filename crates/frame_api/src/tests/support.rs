//! Fixtures shared by the frame tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::domain::{AllowanceSnapshot, Amount, UserId, UserIdentity};
use upstream::{
    Aggregator, AllowanceSource, IdentitySource, Jitter, RetryPolicy, UpstreamError,
};

/// Answers every call with the same outcome and counts calls.
pub struct Fixed<T> {
    outcome: Result<Option<T>, UpstreamError>,
    calls: AtomicUsize,
}

impl<T> Fixed<T> {
    pub fn new(outcome: Result<Option<T>, UpstreamError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone> Fixed<T> {
    fn answer(&self) -> Result<Option<T>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[async_trait]
impl IdentitySource for Fixed<UserIdentity> {
    async fn fetch_identity(&self, _id: UserId) -> Result<Option<UserIdentity>, UpstreamError> {
        self.answer()
    }
}

#[async_trait]
impl AllowanceSource for Fixed<AllowanceSnapshot> {
    async fn fetch_current_allowance(
        &self,
        _id: UserId,
    ) -> Result<Option<AllowanceSnapshot>, UpstreamError> {
        self.answer()
    }
}

pub fn aggregator(
    identity: &Arc<Fixed<UserIdentity>>,
    allowance: &Arc<Fixed<AllowanceSnapshot>>,
) -> Aggregator {
    Aggregator::new(
        identity.clone(),
        allowance.clone(),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: Jitter::None,
        },
    )
}

pub fn identity() -> UserIdentity {
    UserIdentity {
        id: UserId(3621),
        display_name: "alice".into(),
        avatar_ref: Some("https://img.example/alice.png".into()),
        dapp_name: "farcaster".into(),
    }
}

pub fn snapshot(daily: &str, remaining: &str) -> AllowanceSnapshot {
    AllowanceSnapshot {
        as_of: Utc.with_ymd_and_hms(2024, 4, 5, 3, 0, 0).unwrap(),
        daily_allowance: Amount::parse(daily).expect("amount"),
        remaining_allowance: Amount::parse(remaining).expect("amount"),
        rank: Some("1203".into()),
    }
}
