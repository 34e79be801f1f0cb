//! Knobs that distinguish one deployment of the frame from another.

use std::collections::BTreeSet;

use chrono_tz::Tz;
use shared::error::{Source, UnknownSource};

pub const DEFAULT_BACKGROUND: &str = concat!(
    "https://bafybeig776f35t7q6fybqfe4zup2kmiqychy4rcdncjjl5emahho6rqt6i.ipfs.w3s.link/",
    "Thumbnail%20(31).png"
);

/// Fields whose transport failure makes the whole check fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFields(BTreeSet<Source>);

impl Default for RequiredFields {
    fn default() -> Self {
        Self([Source::Allowance].into_iter().collect())
    }
}

impl RequiredFields {
    pub fn strict() -> Self {
        Self(Source::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a comma-separated list such as `"identity,allowance"`.
    /// Blank input means nothing is required.
    pub fn parse(raw: &str) -> Result<Self, UnknownSource> {
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<Source>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, field: Source) -> bool {
        self.0.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = Source> + '_ {
        self.0.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPalette {
    pub default_asset: String,
    /// Shown whenever the day's allowance has been fully spent.
    pub exhausted_asset: String,
    /// When non-empty, one of these replaces `default_asset` at random.
    pub decorative: Vec<String>,
}

impl AssetPalette {
    pub fn contains(&self, asset: &str) -> bool {
        self.default_asset == asset
            || self.exhausted_asset == asset
            || self.decorative.iter().any(|a| a == asset)
    }
}

/// Text templates with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplates {
    pub title: String,
    pub landing_headline: String,
    pub identity_line: String,
    pub daily: String,
    pub remaining: String,
    pub rank: String,
    pub as_of: String,
    pub unavailable: String,
    pub missing_identifier: String,
    pub upstream_error: String,
    pub check_button: String,
    pub again_button: String,
    pub retry_button: String,
}

impl Default for LabelTemplates {
    fn default() -> Self {
        Self {
            title: "DEGEN Allowance Checker".into(),
            landing_headline: "Check your $DEGEN allowance".into(),
            identity_line: "{name}".into(),
            daily: "$DEGEN allowance: {daily}".into(),
            remaining: "Remaining: {remaining}".into(),
            rank: "Rank: {rank}".into(),
            as_of: "As of {date}".into(),
            unavailable: "unavailable".into(),
            missing_identifier: "Unable to retrieve user information".into(),
            upstream_error: "Error fetching user information or allowance".into(),
            check_button: "Check My Allowance".into(),
            again_button: "Check Again".into(),
            retry_button: "Try Again".into(),
        }
    }
}

/// Substitutes each `{key}` in `template` with its value.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

#[derive(Debug, Clone)]
pub struct FramePolicy {
    pub required: RequiredFields,
    pub assets: AssetPalette,
    pub labels: LabelTemplates,
    /// Zone snapshot dates are shown in.
    pub timezone: Tz,
}

impl Default for FramePolicy {
    fn default() -> Self {
        Self {
            required: RequiredFields::default(),
            assets: AssetPalette {
                default_asset: DEFAULT_BACKGROUND.into(),
                exhausted_asset: "/allowance-exhausted.png".into(),
                decorative: Vec::new(),
            },
            labels: LabelTemplates::default(),
            timezone: Tz::UTC,
        }
    }
}
