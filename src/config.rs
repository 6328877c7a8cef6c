use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schedule::MeetingSchedule;

/// Directory name under the platform config/cache/documents roots
pub const APP_DIR_NAME: &str = "ChapelAudio";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Content feed endpoint; the feed key is appended as `?type=<key>`
    pub feed_base_url: String,

    /// Feed key for the music list
    pub music_feed_key: String,

    /// Feed key for the sermon list
    pub sermons_feed_key: String,

    /// Override for the audio cache directory
    pub cache_dir: Option<PathBuf>,

    /// Override for the directory user downloads are saved to
    pub download_dir: Option<PathBuf>,

    /// Tracks warmed when a list is first loaded
    pub prefetch_count: usize,

    /// Playback status polling interval
    pub status_interval_ms: u64,

    /// Meeting schedule polling interval
    pub schedule_poll_secs: u64,

    /// Connect/read timeout for HTTP requests
    pub http_timeout_secs: u64,

    /// Message passed along with a shared download
    pub share_message: String,

    pub schedule: MeetingSchedule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_base_url: String::new(),
            music_feed_key: "music".to_string(),
            sermons_feed_key: "sermons".to_string(),
            cache_dir: None,
            download_dir: None,
            prefetch_count: 3,
            status_interval_ms: 500,
            schedule_poll_secs: 30,
            http_timeout_secs: 30,
            share_message: "Sermon downloaded.".to_string(),
            schedule: MeetingSchedule::default(),
        }
    }
}

impl Config {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;
            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.music_feed_key.trim().is_empty() {
            return Err(ConfigError::Invalid("music_feed_key is empty".to_string()));
        }
        if self.sermons_feed_key.trim().is_empty() {
            return Err(ConfigError::Invalid("sermons_feed_key is empty".to_string()));
        }
        if self.status_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "status_interval_ms must be positive".to_string(),
            ));
        }
        if self.schedule_poll_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule_poll_secs must be positive".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be positive".to_string(),
            ));
        }
        self.schedule.validate()
    }

    /// `<config-dir>/ChapelAudio`
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    /// Directory for daily log files
    pub fn log_dir() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("logs"))
    }

    /// Content-addressed audio cache root
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
                .join("audio")
        })
    }

    /// Durable location for user downloads, separate from the cache
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.music_feed_key, "music");
        assert_eq!(config.sermons_feed_key, "sermons");
        assert_eq!(config.prefetch_count, 3);
        assert_eq!(config.status_interval_ms, 500);
        assert_eq!(config.schedule_poll_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            feed_base_url: "https://example.org/api".to_string(),
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "feed_base_url": "https://example.org/api" }"#).unwrap();
        assert_eq!(config.feed_base_url, "https://example.org/api");
        assert_eq!(config.prefetch_count, 3);
        assert_eq!(config.schedule, MeetingSchedule::default());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let config = Config {
            status_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_feed_keys() {
        let config = Config {
            sermons_feed_key: " ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_creates_default_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let edited = Config {
            prefetch_count: 5,
            ..created
        };
        edited.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().prefetch_count, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
