use super::*;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{AllowanceSnapshot, Amount, UserIdentity},
    error::FailureKind,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::sync::Barrier;

use crate::retry::Jitter;

/// Replays scripted outcomes; the last one repeats once the script runs out.
struct Scripted<T> {
    outcomes: Mutex<VecDeque<Result<Option<T>, UpstreamError>>>,
    calls: AtomicUsize,
    barrier: Option<Arc<Barrier>>,
    stall: bool,
}

impl<T: Clone> Scripted<T> {
    fn new(outcomes: Vec<Result<Option<T>, UpstreamError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            barrier: None,
            stall: false,
        }
    }

    fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<Option<T>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        let mut outcomes = self.outcomes.lock().expect("script lock");
        if outcomes.len() > 1 {
            outcomes.pop_front().expect("scripted outcome")
        } else {
            outcomes.front().cloned().expect("scripted outcome")
        }
    }
}

#[async_trait]
impl IdentitySource for Scripted<UserIdentity> {
    async fn fetch_identity(&self, _id: UserId) -> Result<Option<UserIdentity>, UpstreamError> {
        self.next().await
    }
}

#[async_trait]
impl AllowanceSource for Scripted<AllowanceSnapshot> {
    async fn fetch_current_allowance(
        &self,
        _id: UserId,
    ) -> Result<Option<AllowanceSnapshot>, UpstreamError> {
        self.next().await
    }
}

fn identity() -> UserIdentity {
    UserIdentity {
        id: UserId(3621),
        display_name: "alice".into(),
        avatar_ref: Some("https://img/a.png".into()),
        dapp_name: "farcaster".into(),
    }
}

fn snapshot() -> AllowanceSnapshot {
    AllowanceSnapshot {
        as_of: Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap(),
        daily_allowance: Amount::parse("120").expect("amount"),
        remaining_allowance: Amount::parse("40").expect("amount"),
        rank: None,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter: Jitter::None,
    }
}

#[tokio::test]
async fn both_sources_present() {
    let ids = Arc::new(Scripted::new(vec![Ok(Some(identity()))]));
    let ledger = Arc::new(Scripted::new(vec![Ok(Some(snapshot()))]));
    let aggregator = Aggregator::new(ids.clone(), ledger.clone(), fast_retry());

    let result = aggregator
        .aggregate(UserId(3621), &CancellationToken::new())
        .await;

    assert_eq!(result.identity, Some(identity()));
    assert_eq!(result.allowance, Some(snapshot()));
    assert!(result.failures.is_empty());
    assert_eq!((ids.calls(), ledger.calls()), (1, 1));
}

#[tokio::test]
async fn fetches_run_concurrently() {
    // Each source blocks until the other has started.
    let barrier = Arc::new(Barrier::new(2));
    let ids = Arc::new(Scripted::new(vec![Ok(Some(identity()))]).with_barrier(barrier.clone()));
    let ledger = Arc::new(Scripted::new(vec![Ok(Some(snapshot()))]).with_barrier(barrier));
    let aggregator = Aggregator::new(ids, ledger, fast_retry());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        aggregator.aggregate(UserId(1), &CancellationToken::new()),
    )
    .await
    .expect("both branches must be in flight together");
    assert!(result.is_complete());
}

#[tokio::test]
async fn transport_failure_is_captured_not_propagated() {
    let ids = Arc::new(Scripted::<UserIdentity>::new(vec![Err(UpstreamError::Status(500))]));
    let ledger = Arc::new(Scripted::new(vec![Ok(Some(snapshot()))]));
    let aggregator = Aggregator::new(ids.clone(), ledger, fast_retry());

    let result = aggregator.aggregate(UserId(1), &CancellationToken::new()).await;

    assert_eq!(result.identity, None);
    assert_eq!(result.allowance, Some(snapshot()));
    assert_eq!(
        result.failures.into_iter().collect::<Vec<_>>(),
        vec![SourceFailure::new(Source::Identity, FailureKind::Status(500))]
    );
    assert_eq!(ids.calls(), 3, "5xx is retried up to the attempt limit");
}

#[tokio::test]
async fn not_found_is_absent_without_failure_or_retry() {
    let ids = Arc::new(Scripted::<UserIdentity>::new(vec![Ok(None)]));
    let ledger = Arc::new(Scripted::<AllowanceSnapshot>::new(vec![Ok(None)]));
    let aggregator = Aggregator::new(ids.clone(), ledger.clone(), fast_retry());

    let result = aggregator.aggregate(UserId(1), &CancellationToken::new()).await;

    assert_eq!(result, AggregateResult::default());
    assert_eq!((ids.calls(), ledger.calls()), (1, 1));
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let ids = Arc::new(Scripted::new(vec![Ok(Some(identity()))]));
    let ledger = Arc::new(Scripted::new(vec![
        Err(UpstreamError::Timeout("slow".into())),
        Ok(Some(snapshot())),
    ]));
    let aggregator = Aggregator::new(ids, ledger.clone(), fast_retry());

    let result = aggregator.aggregate(UserId(1), &CancellationToken::new()).await;

    assert!(result.is_complete());
    assert!(result.failures.is_empty());
    assert_eq!(ledger.calls(), 2);
}

#[tokio::test]
async fn cancellation_settles_both_branches() {
    let ids = Arc::new(Scripted::new(vec![Ok(Some(identity()))]).stalled());
    let ledger = Arc::new(Scripted::new(vec![Ok(Some(snapshot()))]).stalled());
    let aggregator = Aggregator::new(ids, ledger, fast_retry());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        aggregator.aggregate(UserId(1), &cancel),
    )
    .await
    .expect("cancellation must not wait for upstream");

    assert_eq!(result.identity, None);
    assert_eq!(result.allowance, None);
    assert!(result
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Cancelled));
    assert_eq!(result.failures.len(), 2);
}
