//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transfer behavior configuration (retries, pools, HTTP client)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Retry ceiling for a single transfer (default: 3)
    ///
    /// A transfer gives up once its retry counter exceeds this value, so at
    /// most `max_retries + 1` attempts are made.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base unit of the randomized backoff (default: 1000 ms)
    #[serde(default = "default_backoff_unit", with = "millis_serde")]
    pub backoff_unit: Duration,

    /// Multiplier applied per retry to the backoff upper bound (default: 3)
    ///
    /// The delay before retry `n` is drawn uniformly from
    /// `[0, n * backoff_factor * backoff_unit)`.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// Timeout of one HTTP request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Worker pool size of a track set bundle (default: 5)
    #[serde(default = "default_bundle_pool_size")]
    pub bundle_pool_size: usize,

    /// Worker pool size of a discography bundle (default: 1)
    ///
    /// Every album bundle nested below owns its own pool, so the number of
    /// concurrent track transfers is the product of both sizes.
    #[serde(default = "default_discography_pool_size")]
    pub discography_pool_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit: default_backoff_unit(),
            backoff_factor: default_backoff_factor(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            bundle_pool_size: default_bundle_pool_size(),
            discography_pool_size: default_discography_pool_size(),
        }
    }
}

/// Save behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Write album cover art next to the tracks as `cover.<ext>` (default: false)
    #[serde(default)]
    pub save_cover_art_separately: bool,

    /// Fill missing ID3 frames of saved MPEG audio (default: true)
    #[serde(default = "default_write_tags")]
    pub write_tags: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_cover_art_separately: false,
            write_tags: default_write_tags(),
        }
    }
}

/// Main configuration
///
/// Sub-configs are nested:
/// - [`transfer`](TransferConfig) - retries, backoff, pools, HTTP client
/// - [`save`](SaveConfig) - what gets written next to the media files
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Save settings
    #[serde(default)]
    pub save: SaveConfig,
}

impl Config {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail later at construction time
    pub fn validate(&self) -> Result<()> {
        if self.transfer.bundle_pool_size < 1 {
            return Err(Error::config(
                "pool size must be at least one",
                "bundle_pool_size",
            ));
        }
        if self.transfer.discography_pool_size < 1 {
            return Err(Error::config(
                "pool size must be at least one",
                "discography_pool_size",
            ));
        }
        if self.transfer.user_agent.trim().is_empty() {
            return Err(Error::config("user agent must not be empty", "user_agent"));
        }
        Ok(())
    }
}

fn default_write_tags() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit() -> Duration {
    Duration::from_millis(1000)
}

fn default_backoff_factor() -> u32 {
    3
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    concat!("media-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_bundle_pool_size() -> usize {
    5
}

fn default_discography_pool_size() -> usize {
    1
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.transfer.max_retries, 3);
        assert_eq!(config.transfer.backoff_unit, Duration::from_millis(1000));
        assert_eq!(config.transfer.backoff_factor, 3);
        assert_eq!(config.transfer.bundle_pool_size, 5);
        assert_eq!(config.transfer.discography_pool_size, 1);
        assert!(!config.save.save_cover_art_separately);
        assert!(config.save.write_tags);
        config.validate().expect("default config must be valid");
    }

    #[test]
    fn empty_json_object_uses_defaults() {
        let config = Config::from_json_str("{}").expect("empty config must parse");
        assert_eq!(config.transfer.max_retries, 3);
        assert_eq!(config.transfer.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{
            "transfer": { "max_retries": 7, "backoff_unit": 250, "request_timeout": 5 },
            "save": { "save_cover_art_separately": true }
        }"#;

        let config = Config::from_json_str(json).expect("deserialize failed");

        assert_eq!(config.transfer.max_retries, 7);
        assert_eq!(config.transfer.backoff_unit, Duration::from_millis(250));
        assert_eq!(config.transfer.request_timeout, Duration::from_secs(5));
        assert_eq!(config.transfer.bundle_pool_size, 5, "untouched field keeps default");
        assert!(config.save.save_cover_art_separately);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let json = r#"{ "transfer": { "bundle_pool_size": 0 } }"#;

        let err = Config::from_json_str(json).unwrap_err();

        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("bundle_pool_size")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_discography_pool_size_is_rejected() {
        let mut config = Config::default();
        config.transfer.discography_pool_size = 0;

        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = Config::default();
        config.transfer.backoff_unit = Duration::from_millis(15);

        let json = serde_json::to_string(&config).expect("serialize failed");
        let back = Config::from_json_str(&json).expect("Config must deserialize from its own JSON");

        assert_eq!(back.transfer.backoff_unit, Duration::from_millis(15));
        assert_eq!(back.transfer.user_agent, config.transfer.user_agent);
    }
}
