//! Ledger resolver: dated tip-allowance snapshots for a user id.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use shared::domain::{AllowanceSnapshot, Amount, UserId};
use url::Url;

use crate::{error::UpstreamError, AllowanceSource};

/// Season and paging parameters sent with every ledger query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceWindow {
    pub season: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for AllowanceWindow {
    fn default() -> Self {
        Self {
            season: None,
            limit: 10,
            offset: 0,
        }
    }
}

impl AllowanceWindow {
    fn query_pairs(&self, id: UserId) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("fid", id.to_string())];
        if let Some(season) = self.season.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("season", season.trim().to_string()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotDto {
    snapshot_day: String,
    tip_allowance: Value,
    remaining_tip_allowance: Value,
    #[serde(default)]
    user_rank: Option<Value>,
}

pub struct HttpAllowanceResolver {
    http: Client,
    endpoint: Url,
    window: AllowanceWindow,
}

impl HttpAllowanceResolver {
    /// Builds a resolver whose every request is bounded by `timeout`.
    pub fn new(
        endpoint: Url,
        window: AllowanceWindow,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            window,
        })
    }

    /// All snapshots for `id`, newest first. Empty when the ledger has
    /// nothing for the id.
    pub async fn fetch_snapshots(
        &self,
        id: UserId,
    ) -> Result<Vec<AllowanceSnapshot>, UpstreamError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&self.window.query_pairs(id))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let mut snapshots = parse_snapshots(&body)?;
        sort_snapshots(&mut snapshots);
        Ok(snapshots)
    }
}

#[async_trait]
impl AllowanceSource for HttpAllowanceResolver {
    async fn fetch_current_allowance(
        &self,
        id: UserId,
    ) -> Result<Option<AllowanceSnapshot>, UpstreamError> {
        Ok(self.fetch_snapshots(id).await?.into_iter().next())
    }
}

/// Newest `as_of` first; equal dates keep their fetch order.
pub fn sort_snapshots(snapshots: &mut [AllowanceSnapshot]) {
    snapshots.sort_by(|a, b| b.as_of.cmp(&a.as_of));
}

pub(crate) fn parse_snapshots(body: &[u8]) -> Result<Vec<AllowanceSnapshot>, UpstreamError> {
    let decoded: Value = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::malformed(format!("invalid allowance JSON: {e}")))?;
    let Value::Array(records) = decoded else {
        return Err(UpstreamError::malformed("allowance body is not an array"));
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let dto: SnapshotDto = serde_json::from_value(record).map_err(|e| {
                UpstreamError::malformed(format!("allowance record {index}: {e}"))
            })?;
            snapshot_from_dto(dto)
                .map_err(|m| UpstreamError::malformed(format!("allowance record {index}: {m}")))
        })
        .collect()
}

fn snapshot_from_dto(dto: SnapshotDto) -> Result<AllowanceSnapshot, String> {
    let as_of = parse_snapshot_day(&dto.snapshot_day)
        .ok_or_else(|| format!("unrecognised snapshot_day '{}'", dto.snapshot_day))?;
    let daily_allowance =
        amount(&dto.tip_allowance).ok_or_else(|| "tip_allowance is not numeric".to_string())?;
    let remaining_allowance = amount(&dto.remaining_tip_allowance)
        .ok_or_else(|| "remaining_tip_allowance is not numeric".to_string())?;
    let rank = match dto.user_rank {
        Some(Value::String(rank)) if !rank.trim().is_empty() => Some(rank.trim().to_string()),
        Some(Value::Number(rank)) => Some(rank.to_string()),
        _ => None,
    };

    Ok(AllowanceSnapshot {
        as_of,
        daily_allowance,
        remaining_allowance,
        rank,
    })
}

fn amount(value: &Value) -> Option<Amount> {
    match value {
        Value::Number(n) => Amount::parse(&n.to_string()),
        Value::String(s) => Amount::parse(s),
        _ => None,
    }
}

fn parse_snapshot_day(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

#[cfg(test)]
#[path = "tests/allowance_tests.rs"]
mod tests;
