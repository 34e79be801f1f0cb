//! Wire format for the host client: a JSON frame document and the
//! equivalent `fc:frame` meta-tag page.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};
use shared::protocol::{LayoutNode, Route, ScreenResponse, ScreenState};
use tracing::warn;
use url::Url;

pub const FRAME_VERSION: &str = "vNext";
pub const ASPECT_RATIO: &str = "1.91:1";
/// Hosts render at most this many buttons per frame.
pub const MAX_BUTTONS: usize = 4;

#[derive(Debug, Clone)]
pub struct PackagerConfig {
    /// Externally reachable origin the frame routes are served from.
    pub public_url: Url,
    /// Rasterizer endpoint that turns a layout into an image.
    pub image_endpoint: Url,
}

impl PackagerConfig {
    pub fn route_url(&self, route: Route) -> String {
        format!(
            "{}{}",
            self.public_url.as_str().trim_end_matches('/'),
            route.path()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameButton {
    pub index: usize,
    pub label: String,
    pub action: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDocument {
    pub version: String,
    pub title: String,
    pub screen: ScreenState,
    pub image: String,
    pub image_aspect_ratio: String,
    pub layout: LayoutNode,
    pub post_url: String,
    pub buttons: Vec<FrameButton>,
}

pub fn package(response: &ScreenResponse, config: &PackagerConfig) -> FrameDocument {
    let buttons: Vec<FrameButton> = response
        .actions
        .iter()
        .take(MAX_BUTTONS)
        .enumerate()
        .map(|(i, action)| FrameButton {
            index: i + 1,
            label: action.label.clone(),
            action: "post".into(),
            target: config.route_url(action.target),
        })
        .collect();
    let post_url = buttons
        .first()
        .map(|b| b.target.clone())
        .unwrap_or_else(|| config.route_url(Route::Landing));

    FrameDocument {
        version: FRAME_VERSION.into(),
        title: response.title.clone(),
        screen: response.screen,
        image: image_url(&response.layout, &config.image_endpoint),
        image_aspect_ratio: ASPECT_RATIO.into(),
        layout: response.layout.clone(),
        post_url,
        buttons,
    }
}

/// `endpoint?layout=<base64url(JSON layout)>`
pub fn image_url(layout: &LayoutNode, endpoint: &Url) -> String {
    let json = serde_json::to_vec(layout).unwrap_or_else(|error| {
        warn!(%error, "package: layout failed to serialize");
        b"{}".to_vec()
    });
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("layout", &URL_SAFE_NO_PAD.encode(json));
    url.to_string()
}

impl FrameDocument {
    pub fn to_html(&self) -> String {
        let mut meta = vec![
            ("og:title", self.title.clone()),
            ("og:image", self.image.clone()),
            ("fc:frame", self.version.clone()),
            ("fc:frame:image", self.image.clone()),
            ("fc:frame:image:aspect_ratio", self.image_aspect_ratio.clone()),
            ("fc:frame:post_url", self.post_url.clone()),
        ]
        .into_iter()
        .map(|(property, content)| (property.to_string(), content))
        .collect::<Vec<_>>();

        for button in &self.buttons {
            let prefix = format!("fc:frame:button:{}", button.index);
            meta.push((prefix.clone(), button.label.clone()));
            meta.push((format!("{prefix}:action"), button.action.clone()));
            meta.push((format!("{prefix}:target"), button.target.clone()));
        }

        let tags = meta
            .iter()
            .map(|(property, content)| {
                format!(
                    "    <meta property=\"{}\" content=\"{}\" />",
                    encode_double_quoted_attribute(property),
                    encode_double_quoted_attribute(content)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\" />\n    \
             <title>{}</title>\n{tags}\n  </head>\n  <body></body>\n</html>\n",
            encode_text(&self.title)
        )
    }
}

#[cfg(test)]
#[path = "tests/package_tests.rs"]
mod tests;
