use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the two upstream services a frame pulls data from.
///
/// Each source feeds exactly one field of the aggregate, so the same value
/// names both the service and the field it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Identity,
    Allowance,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Identity, Source::Allowance];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Identity => "identity",
            Source::Allowance => "allowance",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown upstream source '{0}', expected 'identity' or 'allowance'")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Source::Identity),
            "allowance" => Ok(Source::Allowance),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

/// Classification of a transport-level upstream failure.
///
/// "Not found" outcomes are not failures and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum FailureKind {
    Status(u16),
    Network,
    Timeout,
    Malformed,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Status(code) => write!(f, "status {code}"),
            FailureKind::Network => f.write_str("network error"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Malformed => f.write_str("malformed body"),
            FailureKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Error)]
#[error("{upstream} upstream failed: {kind}")]
pub struct SourceFailure {
    pub upstream: Source,
    pub kind: FailureKind,
}

impl SourceFailure {
    pub fn new(upstream: Source, kind: FailureKind) -> Self {
        Self { upstream, kind }
    }
}
