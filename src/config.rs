//! TOML configuration.
//!
//! Lives at `<config dir>/qtimer/config.toml`:
//!
//! ```toml
//! [account]
//! type = "activecollab"
//! url = "projects.example.com"
//! token = "1-abcdef"
//! cache_lifetime = 60   # minutes
//!
//! [timers]
//! rounding = 60         # seconds
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which external source backs the project/ticket cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    ActiveCollab,
    Offline,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::ActiveCollab => "activecollab",
            AccountType::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(rename = "type", default)]
    pub kind: Option<AccountType>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Minutes before the cached projects/tickets are considered stale.
    #[serde(default = "default_cache_lifetime")]
    pub cache_lifetime: u32,
    /// Seconds before a request to the source is abandoned.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimersConfig {
    /// Seconds that session boundaries and durations snap to.
    #[serde(default = "default_rounding")]
    pub rounding: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_cache_lifetime() -> u32 {
    60
}
fn default_timeout() -> u64 {
    30
}
fn default_rounding() -> u32 {
    60
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            kind: None,
            url: None,
            token: None,
            cache_lifetime: default_cache_lifetime(),
            timeout: default_timeout(),
        }
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            rounding: default_rounding(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|err| Error::Configuration(format!("{}: {err}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|err| Error::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timers.rounding == 0 {
            return Err(Error::Configuration(
                "timers.rounding must be at least 1 second".into(),
            ));
        }
        if self.account.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(Error::Configuration("account.url is empty".into()));
        }
        if self
            .account
            .token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(Error::Configuration("account.token is empty".into()));
        }
        Ok(())
    }

    pub fn cache_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.account.cache_lifetime))
    }

    /// Database location; a leading `DATA_DIR` expands to the app data dir.
    pub fn database_path(&self) -> PathBuf {
        match self.database.path.as_deref() {
            Some(path) => match path.strip_prefix("DATA_DIR") {
                Some(rest) => {
                    let rest = rest.trim_start_matches(['/', '\\']);
                    crate::db::data_dir().join(rest)
                }
                None => PathBuf::from(path),
            },
            None => crate::db::default_db_path(),
        }
    }
}

/// Returns the default config path inside the user's config directory.
/// Falls back to `./qtimer.toml` when no config dir is found.
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("qtimer").join("config.toml"),
        None => PathBuf::from("qtimer.toml"),
    }
}
