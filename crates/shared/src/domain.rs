use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Source, SourceFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    /// Parses a user-supplied id. Zero, signs, whitespace-only and
    /// non-digit input are all rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse::<u64>().ok().filter(|id| *id > 0).map(UserId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    pub dapp_name: String,
}

/// A numeric ledger value kept in the exact textual form it arrived in.
///
/// `value` exists for comparisons only; anything shown to the user goes
/// through [`Amount::as_str`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    raw: String,
    value: f64,
}

impl Amount {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self {
            raw: raw.to_string(),
            value,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }

    pub fn is_positive(&self) -> bool {
        self.value > 0.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceSnapshot {
    pub as_of: DateTime<Utc>,
    pub daily_allowance: Amount,
    pub remaining_allowance: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
}

impl AllowanceSnapshot {
    /// The day's allowance was granted and has been spent down to nothing.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_allowance.is_zero() && self.daily_allowance.is_positive()
    }
}

/// Everything one check request learned from upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub identity: Option<UserIdentity>,
    pub allowance: Option<AllowanceSnapshot>,
    pub failures: BTreeSet<SourceFailure>,
}

impl AggregateResult {
    pub fn is_present(&self, field: Source) -> bool {
        match field {
            Source::Identity => self.identity.is_some(),
            Source::Allowance => self.allowance.is_some(),
        }
    }

    pub fn has_failure(&self, source: Source) -> bool {
        self.failures.iter().any(|f| f.upstream == source)
    }

    pub fn is_complete(&self) -> bool {
        Source::ALL.into_iter().all(|field| self.is_present(field))
    }
}
