use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    Landing,
    MissingIdentifier,
    Result,
    PartialData,
    UpstreamError,
}

impl ScreenState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScreenState::Landing)
    }
}

/// Frame routes an action can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Landing,
    CheckRequested,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Landing => "/api",
            Route::CheckRequested => "/api/check-allowance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub label: String,
    pub target: Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Presentation-agnostic layout handed to the external rasterizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutNode {
    Container {
        direction: Direction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background: Option<String>,
        children: Vec<LayoutNode>,
    },
    Text {
        content: String,
        size: u16,
        weight: FontWeight,
    },
    Image {
        src: String,
        size: u16,
        rounded: bool,
    },
}

impl LayoutNode {
    pub fn text(content: impl Into<String>, size: u16, weight: FontWeight) -> Self {
        LayoutNode::Text {
            content: content.into(),
            size,
            weight,
        }
    }

    /// Depth-first list of every text node's content.
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_texts(&mut out);
        out
    }

    fn collect_texts<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            LayoutNode::Container { children, .. } => {
                for child in children {
                    child.collect_texts(out);
                }
            }
            LayoutNode::Text { content, .. } => out.push(content),
            LayoutNode::Image { .. } => {}
        }
    }

    pub fn background(&self) -> Option<&str> {
        match self {
            LayoutNode::Container { background, .. } => background.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub screen: ScreenState,
    pub title: String,
    pub layout: LayoutNode,
    pub actions: Vec<ActionDescriptor>,
}

/// Frame action body posted by the host client.
///
/// Signature verification of `trusted_data` belongs to the host platform;
/// only the untrusted fields are read here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameActionPayload {
    #[serde(default)]
    pub untrusted_data: UntrustedData,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub trusted_data: Option<TrustedData>,
}

/// Host-supplied fields. A field of the wrong type reads as absent so one
/// odd value never hides the `fid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub button_index: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_hash: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedData {
    pub message_bytes: String,
}

impl FrameActionPayload {
    pub fn with_fid(fid: u64) -> Self {
        Self {
            untrusted_data: UntrustedData {
                fid: Some(Value::from(fid)),
                button_index: Some(1),
                ..UntrustedData::default()
            },
            trusted_data: None,
        }
    }

    /// The interacting user's id, if the payload carries a usable one.
    pub fn user_id(&self) -> Option<UserId> {
        match self.untrusted_data.fid.as_ref()? {
            Value::Number(n) => n.as_u64().filter(|id| *id > 0).map(UserId),
            Value::String(s) => UserId::parse(s),
            _ => None,
        }
    }
}
