use std::{collections::HashMap, fs, path::Path, str::FromStr, sync::Arc, time::Duration};

use chrono_tz::Tz;
use frame_api::{
    policy::DEFAULT_BACKGROUND, AssetPalette, FrameContext, FramePolicy, LabelTemplates,
    PackagerConfig, RequiredFields,
};
use serde::Deserialize;
use shared::error::UnknownSource;
use thiserror::Error;
use upstream::{
    Aggregator, AllowanceWindow, HttpAllowanceResolver, HttpIdentityResolver, Jitter,
    RetryPolicy,
};
use url::Url;

pub const DEFAULT_SETTINGS_PATH: &str = "frame.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("{key} must be a number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} is not a valid URL '{value}': {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("IMAGE_ENDPOINT must name the layout rasterizer; this server does not render images")]
    MissingImageEndpoint,
    #[error("unknown display timezone '{0}'")]
    InvalidTimezone(String),
    #[error("invalid required_fields: {0}")]
    RequiredFields(#[from] UnknownSource),
    #[error("failed to build upstream HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub public_url: String,
    pub image_endpoint: Option<String>,
    pub identity_api_url: String,
    pub identity_api_key: String,
    pub allowance_api_url: String,
    pub allowance_season: Option<String>,
    pub allowance_limit: u32,
    pub allowance_offset: u32,
    pub upstream_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub required_fields: String,
    pub default_asset: String,
    pub exhausted_asset: Option<String>,
    pub decorative_assets: Vec<String>,
    pub display_timezone: String,
    pub title: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5173".into(),
            public_url: "http://127.0.0.1:5173".into(),
            image_endpoint: None,
            identity_api_url: "https://api.airstack.xyz/gql".into(),
            identity_api_key: String::new(),
            allowance_api_url: "https://www.degen.tips/api/airdrop2/tip-allowance".into(),
            allowance_season: None,
            allowance_limit: 10,
            allowance_offset: 0,
            upstream_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 2_000,
            required_fields: "allowance".into(),
            default_asset: DEFAULT_BACKGROUND.into(),
            exhausted_asset: None,
            decorative_assets: Vec::new(),
            display_timezone: "UTC".into(),
            title: None,
        }
    }
}

/// Shape of `frame.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    public_url: Option<String>,
    image_endpoint: Option<String>,
    identity_api_url: Option<String>,
    identity_api_key: Option<String>,
    allowance_api_url: Option<String>,
    allowance_season: Option<String>,
    allowance_limit: Option<u32>,
    allowance_offset: Option<u32>,
    upstream_timeout_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    required_fields: Option<String>,
    default_asset: Option<String>,
    exhausted_asset: Option<String>,
    decorative_assets: Option<Vec<String>>,
    display_timezone: Option<String>,
    title: Option<String>,
}

/// Defaults, then `FRAME_CONFIG` (or `frame.toml`), then the process
/// environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let path = std::env::var("FRAME_CONFIG").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.into());
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => Some(raw),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => return Err(SettingsError::Read { path, source }),
    };
    let env: HashMap<String, String> = std::env::vars().collect();
    load_settings_from(raw.as_deref(), Path::new(&path), |key| env.get(key).cloned())
}

pub fn load_settings_from(
    file: Option<&str>,
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings = toml::from_str(raw).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.apply_file(file_cfg);
    }

    settings.apply_env(&env)?;
    Ok(settings)
}

/// `APP__<KEY>` wins over the bare `<KEY>`.
fn env_value(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(&format!("APP__{key}"))
        .or_else(|| env(key))
        .map(|v| v.trim().to_string())
}

fn parse_number<T: FromStr>(key: &'static str, value: String) -> Result<T, SettingsError> {
    value
        .parse()
        .map_err(|_| SettingsError::InvalidNumber { key, value })
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, SettingsError> {
    Url::parse(value).map_err(|source| SettingsError::InvalidUrl {
        key,
        value: value.to_string(),
        source,
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Settings {
    fn apply_file(&mut self, file: FileSettings) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = file.$field {
                    self.$field = v;
                }
            };
            ($field:ident?) => {
                if let Some(v) = file.$field {
                    self.$field = non_empty(v);
                }
            };
        }

        take!(bind_addr);
        take!(public_url);
        take!(image_endpoint?);
        take!(identity_api_url);
        take!(identity_api_key);
        take!(allowance_api_url);
        take!(allowance_season?);
        take!(allowance_limit);
        take!(allowance_offset);
        take!(upstream_timeout_ms);
        take!(retry_attempts);
        take!(retry_base_delay_ms);
        take!(retry_max_delay_ms);
        take!(required_fields);
        take!(default_asset);
        take!(exhausted_asset?);
        take!(decorative_assets);
        take!(display_timezone);
        take!(title?);
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        if let Some(v) = env_value(env, "BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = env_value(env, "PUBLIC_URL") {
            self.public_url = v;
        }
        if let Some(v) = env_value(env, "IMAGE_ENDPOINT") {
            self.image_endpoint = non_empty(v);
        }
        if let Some(v) = env_value(env, "IDENTITY_API_URL") {
            self.identity_api_url = v;
        }
        if let Some(v) = env_value(env, "IDENTITY_API_KEY") {
            self.identity_api_key = v;
        }
        if let Some(v) = env_value(env, "ALLOWANCE_API_URL") {
            self.allowance_api_url = v;
        }
        if let Some(v) = env_value(env, "ALLOWANCE_SEASON") {
            self.allowance_season = non_empty(v);
        }
        if let Some(v) = env_value(env, "ALLOWANCE_LIMIT") {
            self.allowance_limit = parse_number("ALLOWANCE_LIMIT", v)?;
        }
        if let Some(v) = env_value(env, "ALLOWANCE_OFFSET") {
            self.allowance_offset = parse_number("ALLOWANCE_OFFSET", v)?;
        }
        if let Some(v) = env_value(env, "UPSTREAM_TIMEOUT_MS") {
            self.upstream_timeout_ms = parse_number("UPSTREAM_TIMEOUT_MS", v)?;
        }
        if let Some(v) = env_value(env, "RETRY_ATTEMPTS") {
            self.retry_attempts = parse_number("RETRY_ATTEMPTS", v)?;
        }
        if let Some(v) = env_value(env, "RETRY_BASE_DELAY_MS") {
            self.retry_base_delay_ms = parse_number("RETRY_BASE_DELAY_MS", v)?;
        }
        if let Some(v) = env_value(env, "RETRY_MAX_DELAY_MS") {
            self.retry_max_delay_ms = parse_number("RETRY_MAX_DELAY_MS", v)?;
        }
        if let Some(v) = env_value(env, "REQUIRED_FIELDS") {
            self.required_fields = v;
        }
        if let Some(v) = env_value(env, "DEFAULT_ASSET") {
            self.default_asset = v;
        }
        if let Some(v) = env_value(env, "EXHAUSTED_ASSET") {
            self.exhausted_asset = non_empty(v);
        }
        if let Some(v) = env_value(env, "DECORATIVE_ASSETS") {
            self.decorative_assets = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = env_value(env, "DISPLAY_TIMEZONE") {
            self.display_timezone = v;
        }
        if let Some(v) = env_value(env, "TITLE") {
            self.title = non_empty(v);
        }
        Ok(())
    }

    pub fn public_base(&self) -> String {
        self.public_url.trim_end_matches('/').to_string()
    }

    pub fn policy(&self) -> Result<FramePolicy, SettingsError> {
        let timezone = self
            .display_timezone
            .parse::<Tz>()
            .map_err(|_| SettingsError::InvalidTimezone(self.display_timezone.clone()))?;
        let mut labels = LabelTemplates::default();
        if let Some(title) = &self.title {
            labels.title = title.clone();
        }

        Ok(FramePolicy {
            required: RequiredFields::parse(&self.required_fields)?,
            assets: AssetPalette {
                default_asset: self.default_asset.clone(),
                exhausted_asset: self
                    .exhausted_asset
                    .clone()
                    .unwrap_or_else(|| format!("{}/allowance-exhausted.png", self.public_base())),
                decorative: self.decorative_assets.clone(),
            },
            labels,
            timezone,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter: Jitter::Full,
        }
    }

    pub fn packager(&self) -> Result<PackagerConfig, SettingsError> {
        let public_url = parse_url("PUBLIC_URL", &self.public_url)?;
        let endpoint = self
            .image_endpoint
            .as_deref()
            .ok_or(SettingsError::MissingImageEndpoint)?;
        let image_endpoint = parse_url("IMAGE_ENDPOINT", endpoint)?;
        Ok(PackagerConfig {
            public_url,
            image_endpoint,
        })
    }

    /// Wires resolvers, aggregator, policy and packager from these settings.
    pub fn frame_context(&self) -> Result<FrameContext, SettingsError> {
        let timeout = Duration::from_millis(self.upstream_timeout_ms.max(1));
        let identity = HttpIdentityResolver::new(
            parse_url("IDENTITY_API_URL", &self.identity_api_url)?,
            self.identity_api_key.clone(),
            timeout,
        )?;
        let allowance = HttpAllowanceResolver::new(
            parse_url("ALLOWANCE_API_URL", &self.allowance_api_url)?,
            AllowanceWindow {
                season: self.allowance_season.clone(),
                limit: self.allowance_limit,
                offset: self.allowance_offset,
            },
            timeout,
        )?;

        Ok(FrameContext {
            aggregator: Aggregator::new(
                Arc::new(identity),
                Arc::new(allowance),
                self.retry_policy(),
            ),
            policy: Arc::new(self.policy()?),
            packager: self.packager()?,
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
