//! Account settings, read from a TOML file.
//!
//! ```toml
//! [accounts.work]
//! server = "https://cloud.example.com"
//! storage_folder = "Mail attachments"
//! username = "alice"
//! password = "secret"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use url::Url;
use crate::core::{ConfigError, DEFAULT_MAX_FILE_SIZE};

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Deserialize, Debug, Clone)]
pub struct AccountConfig {
    pub server: String,
    #[serde(default)]
    pub storage_folder: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AccountConfig {
    pub fn new(server: &str, storage_folder: &str, username: &str) -> Self {
        Self {
            server: server.to_string(),
            storage_folder: storage_folder.to_string(),
            username: username.to_string(),
            password: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            timeout_secs: default_timeout_secs(),
        }
        .normalized()
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the server url and trims separators from the server and the
    /// storage folder.
    pub fn validate(self) -> Result<Self, ConfigError> {
        Url::parse(&self.server).map_err(|source| ConfigError::InvalidUrl {
            url: self.server.clone(),
            source,
        })?;

        Ok(self.normalized())
    }

    fn normalized(mut self) -> Self {
        self.server = self.server.trim_end_matches('/').to_string();
        self.storage_folder = self.storage_folder.trim_matches('/').to_string();
        if self.password.as_deref() == Some("") {
            self.password = None;
        }
        self
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = toml::from_str(config_str)?;

        let accounts = settings
            .accounts
            .into_iter()
            .map(|(key, account)| account.validate().map(|account| (key, account)))
            .collect::<Result<_, _>>()?;

        Ok(Settings { accounts })
    }

    pub fn account(&self, key: &str) -> Result<&AccountConfig, ConfigError> {
        self.accounts
            .get(key)
            .ok_or_else(|| ConfigError::UnknownAccount(key.to_string()))
    }
}
