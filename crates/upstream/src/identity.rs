//! Identity-graph resolver: maps a user id to its social profile.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use shared::domain::{UserId, UserIdentity};
use url::Url;

use crate::{error::UpstreamError, IdentitySource};

#[derive(Debug, Serialize)]
struct GraphRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphErrorDto>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(rename = "Socials")]
    socials: Option<SocialsDto>,
}

#[derive(Debug, Deserialize)]
struct SocialsDto {
    #[serde(rename = "Social")]
    social: Option<Vec<SocialDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialDto {
    #[serde(default)]
    dapp_name: Option<String>,
    #[serde(default)]
    profile_name: Option<String>,
    #[serde(default)]
    profile_image: Option<String>,
}

pub struct HttpIdentityResolver {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpIdentityResolver {
    /// Builds a resolver whose every request is bounded by `timeout`.
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl IdentitySource for HttpIdentityResolver {
    async fn fetch_identity(&self, id: UserId) -> Result<Option<UserIdentity>, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, self.api_key.as_str())
            .json(&GraphRequest {
                query: build_identity_query(id),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_identity(id, &body)
    }
}

pub fn build_identity_query(id: UserId) -> String {
    format!(
        r#"query GetUserFidInformation {{
  Socials(input: {{filter: {{userId: {{_eq: "{id}"}}}}, blockchain: ethereum}}) {{
    Social {{
      dappName
      profileName
      profileImage
    }}
  }}
}}"#
    )
}

/// First matching social record, or `None` when the graph knows nothing
/// about the id.
pub(crate) fn parse_identity(
    id: UserId,
    body: &[u8],
) -> Result<Option<UserIdentity>, UpstreamError> {
    let decoded: GraphResponse = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::malformed(format!("invalid identity JSON: {e}")))?;

    let Some(data) = decoded.data else {
        let messages = decoded
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(UpstreamError::malformed(format!(
            "identity response carried no data: {messages}"
        )));
    };

    let first = data
        .socials
        .and_then(|socials| socials.social)
        .and_then(|records| records.into_iter().next());

    Ok(first.map(|record| UserIdentity {
        id,
        display_name: record.profile_name.unwrap_or_default(),
        avatar_ref: record.profile_image.filter(|src| !src.trim().is_empty()),
        dapp_name: record.dapp_name.unwrap_or_default(),
    }))
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
