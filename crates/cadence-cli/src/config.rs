//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use cadence_core::auth::AuthUser;
use cadence_core::config::CoreConfig;
use cadence_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DB_FILE_NAME: &str = "cadence.db";
const APP_DIR: &str = "cadence";

pub const ENV_DB_PATH: &str = "CADENCE_DB_PATH";
pub const ENV_API_URL: &str = "CADENCE_API_URL";
pub const ENV_API_TOKEN: &str = "CADENCE_API_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Signed-in user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join(DB_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

/// `--db-path`, then `CADENCE_DB_PATH`, then the platform data directory
pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    env_db_path: Option<String>,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path {
        return Ok(path);
    }
    if let Some(path) = normalize_text_option(env_db_path) {
        return Ok(PathBuf::from(path));
    }
    default_db_path()
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self {
                version: default_config_version(),
                ..Self::default()
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalized()
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                ))
            })?;
        }

        let normalized = self.clone().normalized()?;
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            CliError::Config(format!(
                "Failed to write config at {}: {}",
                path.display(),
                error
            ))
        })
    }

    /// Environment values win over the file
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.core.remote_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        self.normalized()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    fn normalized(mut self) -> Result<Self, CliError> {
        self.core = self
            .core
            .validated()
            .map_err(|error| CliError::Config(error.to_string()))?;
        self.api_token = normalize_text_option(self.api_token);
        Ok(self)
    }
}
