use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::render::RenderOrder;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api/";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack_token: String,
    pub channel_id: String,
    pub data_dir: PathBuf,
    pub api_base_url: Url,
    pub http_timeout: Duration,
    pub history_page_limit: Option<u16>,
    pub render_order: RenderOrder,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns the name of the offending variable when a required value is
    /// missing or an optional one does not parse.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, so tests don't touch the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("{key}: environment variable not set"))
        };

        let api_base_url = match lookup("SLACK_API_BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => parse_base_url(DEFAULT_API_BASE_URL)?,
        };

        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|e| format!("HTTP_TIMEOUT_SECS: {e}"))?;
                if secs == 0 {
                    return Err("HTTP_TIMEOUT_SECS: must be greater than 0".to_string());
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let history_page_limit = match lookup("HISTORY_PAGE_LIMIT") {
            Some(raw) => {
                let limit: u16 = raw
                    .parse()
                    .map_err(|e| format!("HISTORY_PAGE_LIMIT: {e}"))?;
                if !(1..=1000).contains(&limit) {
                    return Err("HISTORY_PAGE_LIMIT: must be between 1 and 1000".to_string());
                }
                Some(limit)
            }
            None => None,
        };

        let render_order = match lookup("HISTORY_ORDER") {
            Some(raw) => raw
                .parse::<RenderOrder>()
                .map_err(|e| format!("HISTORY_ORDER: {e}"))?,
            None => RenderOrder::default(),
        };

        Ok(Self {
            slack_token: required("SLACK_TOKEN")?,
            channel_id: required("SLACK_CHANNEL_ID")?,
            data_dir: lookup("DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
            api_base_url,
            http_timeout,
            history_page_limit,
            render_order,
        })
    }
}

// `Url::join` drops the last path segment unless the base ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| format!("SLACK_API_BASE_URL: {e}"))
}
