//! Storage settings.
//!
//! # Responsibility
//! - Load storage settings from the application's flat `storage_*` map or
//!   from JSON.
//! - Reject unusable values before any connection is opened.
//!
//! # Invariants
//! - `max_fetch_size` is always positive once validated.
//! - An absent `url` (or `:memory:`) selects an in-memory database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

const MAX_FETCH_SIZE_KEY: &str = "storage_max_fetch_size";
const URL_KEY: &str = "storage_url";
const BUSY_TIMEOUT_KEY: &str = "storage_busy_timeout_ms";
const SQLITE_SCHEME: &str = "sqlite://";
const IN_MEMORY_URL: &str = ":memory:";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required key absent from the settings map.
    Missing(&'static str),
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid setting `{key}`=`{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Hard cap on the records returned by one `get_all`.
    pub max_fetch_size: usize,
    /// Database file; `None` means in-memory.
    pub url: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_fetch_size: 10_000,
            url: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageSettings {
    /// Reads the `storage_*` keys of a flat settings map.
    ///
    /// `storage_max_fetch_size` is required. Unprefixed keys are ignored.
    pub fn from_settings(settings: &BTreeMap<String, String>) -> ConfigResult<Self> {
        let raw_fetch_size = settings
            .get(MAX_FETCH_SIZE_KEY)
            .ok_or(ConfigError::Missing(MAX_FETCH_SIZE_KEY))?;
        let max_fetch_size = parse_number(MAX_FETCH_SIZE_KEY, raw_fetch_size)?;

        let busy_timeout_ms = match settings.get(BUSY_TIMEOUT_KEY) {
            Some(raw) => parse_number(BUSY_TIMEOUT_KEY, raw)?,
            None => Self::default().busy_timeout_ms,
        };

        let url = settings.get(URL_KEY).and_then(|raw| parse_url(raw));

        let loaded = Self {
            max_fetch_size,
            url,
            busy_timeout_ms,
        };
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parses settings from a JSON document; absent fields take defaults.
    pub fn from_json(raw: &str) -> ConfigResult<Self> {
        let mut loaded: Self = serde_json::from_str(raw).map_err(|err| ConfigError::Invalid {
            key: "storage",
            value: raw.to_string(),
            reason: err.to_string(),
        })?;
        loaded.url = loaded
            .url
            .as_ref()
            .and_then(|path| parse_url(&path.to_string_lossy()));
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_fetch_size == 0 {
            return Err(ConfigError::Invalid {
                key: MAX_FETCH_SIZE_KEY,
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> ConfigResult<T>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// `sqlite:///var/db/kinto.sqlite` and bare paths name a file; empty values
/// and `:memory:` select an in-memory database.
fn parse_url(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    let path = trimmed.strip_prefix(SQLITE_SCHEME).unwrap_or(trimmed);
    if path.is_empty() || path == IN_MEMORY_URL {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StorageSettings};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn from_settings_reads_prefixed_keys() {
        let loaded = StorageSettings::from_settings(&settings(&[
            ("storage_max_fetch_size", "250"),
            ("storage_url", "sqlite:///tmp/kinto.sqlite"),
            ("storage_busy_timeout_ms", "1500"),
            ("cache_url", "ignored"),
        ]))
        .unwrap();

        assert_eq!(loaded.max_fetch_size, 250);
        assert_eq!(loaded.url, Some(PathBuf::from("/tmp/kinto.sqlite")));
        assert_eq!(loaded.busy_timeout_ms, 1500);
    }

    #[test]
    fn from_settings_requires_positive_fetch_size() {
        assert_eq!(
            StorageSettings::from_settings(&settings(&[])),
            Err(ConfigError::Missing("storage_max_fetch_size"))
        );
        assert!(matches!(
            StorageSettings::from_settings(&settings(&[("storage_max_fetch_size", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            StorageSettings::from_settings(&settings(&[("storage_max_fetch_size", "lots")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn memory_urls_select_in_memory_database() {
        let loaded = StorageSettings::from_settings(&settings(&[
            ("storage_max_fetch_size", "10"),
            ("storage_url", ":memory:"),
        ]))
        .unwrap();
        assert_eq!(loaded.url, None);
        assert_eq!(loaded.busy_timeout_ms, 5_000);
    }

    #[test]
    fn from_json_fills_defaults() {
        let loaded = StorageSettings::from_json(r#"{"max_fetch_size": 42}"#).unwrap();
        assert_eq!(loaded.max_fetch_size, 42);
        assert_eq!(loaded.url, None);
        assert_eq!(loaded.busy_timeout().as_millis(), 5_000);

        assert!(StorageSettings::from_json("not json").is_err());
    }
}
