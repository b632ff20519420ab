use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::schedule::Recurrence;

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "RSSPOSTER_CONFIG";

const DEFAULT_REFRESH_HOURS: u32 = 4;
const MAX_ITEM_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PosterConfig {
    pub feed: FeedConfig,
    pub publishing: PublishingConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub refresh_interval_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishingConfig {
    pub author_id: u64,
    pub category_id: u64,
    pub item_limit: usize,
    pub post_status: PostStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Future,
    Pending,
    Private,
    Publish,
    Trash,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            refresh_interval_hours: DEFAULT_REFRESH_HOURS,
        }
    }
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            author_id: 1,
            category_id: 1,
            item_limit: 1,
            post_status: PostStatus::Draft,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 15,
            user_agent: concat!("rssposter/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    /// How long a fetched copy of the feed stays fresh. Zero means "unset".
    pub fn cache_ttl(&self) -> Duration {
        let hours = match self.refresh_interval_hours {
            0 => DEFAULT_REFRESH_HOURS,
            hours => hours,
        };
        Duration::from_secs(u64::from(hours) * 3600)
    }

    pub fn recurrence(&self) -> Recurrence {
        Recurrence::from_hours(self.refresh_interval_hours)
    }
}

impl PublishingConfig {
    /// `item_limit` forced into the supported range; zero means the default of one.
    pub fn effective_item_limit(&self) -> usize {
        self.item_limit.clamp(1, MAX_ITEM_LIMIT)
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Future => "future",
            PostStatus::Pending => "pending",
            PostStatus::Private => "private",
            PostStatus::Publish => "publish",
            PostStatus::Trash => "trash",
        }
    }
}

impl PosterConfig {
    /// Config directory shared with the cache and record files.
    pub fn config_dir() -> PathBuf {
        let mut dir = dirs::config_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        dir.push("rssposter");
        dir
    }

    /// `$RSSPOSTER_CONFIG` if set, otherwise `config.json` in [`Self::config_dir`].
    pub fn config_file_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("config.json"),
        }
    }

    /// Loads and validates the file. A missing file is reported as
    /// [`ConfigError::MissingSchedule`], the same as unsaved settings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path.as_ref()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingSchedule)
            }
            Err(err) => return Err(err.into()),
        };
        let config: PosterConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limit = self.publishing.item_limit;
        if limit == 0 || limit > MAX_ITEM_LIMIT {
            return Err(ConfigError::InvalidItemLimit(limit));
        }
        if !Recurrence::is_known_hours(self.feed.refresh_interval_hours) {
            warn!(
                hours = self.feed.refresh_interval_hours,
                fallback = Recurrence::FourHours.name(),
                "unrecognised refresh interval"
            );
        }
        Ok(())
    }
}
