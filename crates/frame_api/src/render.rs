//! Maps a screen and its data onto a layout tree and button list.
//!
//! Rendering is pure apart from the caller-supplied random source, which
//! is only consulted when decorative backgrounds are configured.

use rand::{seq::SliceRandom, Rng};
use shared::{
    domain::{AggregateResult, AllowanceSnapshot, UserIdentity},
    protocol::{ActionDescriptor, Direction, FontWeight, LayoutNode, ScreenResponse, ScreenState},
};

use crate::{
    machine::next_route,
    policy::{fill, AssetPalette, FramePolicy, LabelTemplates},
};

const HEADLINE_SIZE: u16 = 40;
const BODY_SIZE: u16 = 30;
const DETAIL_SIZE: u16 = 24;
const AVATAR_SIZE: u16 = 100;

pub fn render<R: Rng + ?Sized>(
    screen: ScreenState,
    aggregate: &AggregateResult,
    policy: &FramePolicy,
    rng: &mut R,
) -> ScreenResponse {
    let labels = &policy.labels;
    let background = select_background(&policy.assets, aggregate.allowance.as_ref(), rng);

    let (direction, children) = match screen {
        ScreenState::Landing => (Direction::Row, vec![headline(&labels.landing_headline)]),
        ScreenState::MissingIdentifier => {
            (Direction::Row, vec![headline(&labels.missing_identifier)])
        }
        ScreenState::UpstreamError => (Direction::Row, vec![headline(&labels.upstream_error)]),
        ScreenState::Result | ScreenState::PartialData => {
            (Direction::Column, data_lines(aggregate, policy))
        }
    };

    let label = match screen {
        ScreenState::Landing => &labels.check_button,
        ScreenState::Result | ScreenState::PartialData => &labels.again_button,
        ScreenState::MissingIdentifier | ScreenState::UpstreamError => &labels.retry_button,
    };

    ScreenResponse {
        screen,
        title: labels.title.clone(),
        layout: LayoutNode::Container {
            direction,
            background: Some(background),
            children,
        },
        actions: vec![ActionDescriptor {
            label: label.clone(),
            target: next_route(screen),
        }],
    }
}

/// The exhausted asset whenever the day's allowance is spent, otherwise a
/// random decorative asset, otherwise the default.
pub fn select_background<R: Rng + ?Sized>(
    assets: &AssetPalette,
    allowance: Option<&AllowanceSnapshot>,
    rng: &mut R,
) -> String {
    if allowance.is_some_and(AllowanceSnapshot::is_exhausted) {
        return assets.exhausted_asset.clone();
    }
    assets
        .decorative
        .choose(rng)
        .unwrap_or(&assets.default_asset)
        .clone()
}

fn headline(text: &str) -> LayoutNode {
    LayoutNode::text(text, HEADLINE_SIZE, FontWeight::Bold)
}

fn data_lines(aggregate: &AggregateResult, policy: &FramePolicy) -> Vec<LayoutNode> {
    let labels = &policy.labels;
    let mut lines = identity_lines(aggregate.identity.as_ref(), labels);

    match aggregate.allowance.as_ref() {
        Some(snapshot) => {
            let date = snapshot
                .as_of
                .with_timezone(&policy.timezone)
                .format("%B %-d, %Y")
                .to_string();
            lines.push(body(fill(
                &labels.daily,
                &[("daily", snapshot.daily_allowance.as_str())],
            )));
            lines.push(body(fill(
                &labels.remaining,
                &[("remaining", snapshot.remaining_allowance.as_str())],
            )));
            if let Some(rank) = snapshot.rank.as_deref() {
                lines.push(detail(fill(&labels.rank, &[("rank", rank)])));
            }
            lines.push(detail(fill(&labels.as_of, &[("date", date.as_str())])));
        }
        None => {
            let missing = labels.unavailable.as_str();
            lines.push(body(fill(&labels.daily, &[("daily", missing)])));
            lines.push(body(fill(&labels.remaining, &[("remaining", missing)])));
            lines.push(detail(fill(&labels.rank, &[("rank", missing)])));
            lines.push(detail(fill(&labels.as_of, &[("date", missing)])));
        }
    }
    lines
}

fn identity_lines(identity: Option<&UserIdentity>, labels: &LabelTemplates) -> Vec<LayoutNode> {
    let Some(identity) = identity else {
        return vec![body(fill(
            &labels.identity_line,
            &[("name", labels.unavailable.as_str())],
        ))];
    };

    let mut lines = Vec::with_capacity(2);
    if let Some(src) = identity.avatar_ref.as_deref() {
        lines.push(LayoutNode::Image {
            src: src.to_string(),
            size: AVATAR_SIZE,
            rounded: true,
        });
    }
    lines.push(body(fill(
        &labels.identity_line,
        &[("name", identity.display_name.as_str())],
    )));
    lines
}

fn body(text: String) -> LayoutNode {
    LayoutNode::text(text, BODY_SIZE, FontWeight::Bold)
}

fn detail(text: String) -> LayoutNode {
    LayoutNode::text(text, DETAIL_SIZE, FontWeight::Regular)
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
