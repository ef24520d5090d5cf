//! Client configuration, read from the environment with sensible defaults.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the translation service, without trailing slash.
    pub api_url: String,
    /// Quiet period after the last keystroke before a translate call goes out.
    pub debounce: Duration,
    pub history_page_size: u32,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Reads `VERBA_API_URL`, `VERBA_DEBOUNCE_MS`, `VERBA_HISTORY_PAGE_SIZE` and
    /// `VERBA_REQUEST_TIMEOUT_SECS`. Missing or unparseable values keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let api_url = lookup("VERBA_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let debounce_ms = parse_or("VERBA_DEBOUNCE_MS", &lookup, DEFAULT_DEBOUNCE_MS);
        let page_size = parse_or("VERBA_HISTORY_PAGE_SIZE", &lookup, DEFAULT_HISTORY_PAGE_SIZE);
        let timeout_secs = parse_or(
            "VERBA_REQUEST_TIMEOUT_SECS",
            &lookup,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        Self {
            api_url,
            debounce: Duration::from_millis(debounce_ms),
            history_page_size: page_size.max(1),
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        None => default,
    }
}
