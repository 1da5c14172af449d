//! Core runtime configuration.
//!
//! Front ends load this from their own settings files; every field is
//! optional and falls back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Base URL of the remote collection API
    #[serde(default)]
    pub remote_base_url: Option<String>,
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    /// Used only when the remote collection cannot push changes
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl CoreConfig {
    /// Parse a JSON config payload
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validated()
    }

    /// Normalise text fields and reject unusable values
    pub fn validated(mut self) -> Result<Self> {
        self.remote_base_url = normalize_text_option(self.remote_base_url)
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = &self.remote_base_url {
            if !is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "remote_base_url must include http:// or https:// (got '{url}')"
                )));
            }
        }
        if self.tick_interval_ms == Some(0) {
            return Err(Error::InvalidInput("tick_interval_ms must be positive".into()));
        }
        if self.poll_interval_secs == Some(0) {
            return Err(Error::InvalidInput("poll_interval_secs must be positive".into()));
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub const fn has_remote(&self) -> bool {
        self.remote_base_url.is_some()
    }
}
