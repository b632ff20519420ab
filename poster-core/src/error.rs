use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I need a feed URL before I can move forward")]
    MissingUrl,
    #[error("cannot locate a schedule, try saving the settings again")]
    MissingSchedule,
    #[error("item limit must be between 1 and 5, got {0}")]
    InvalidItemLimit(usize),
    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid feed url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed server answered {0}")]
    Status(reqwest::StatusCode),
    #[error("unable to save the feed: {0}")]
    Unsavable(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is not valid XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("feed document has no root element")]
    NoRoot,
    #[error("feed document ends inside <{0}>")]
    Unclosed(String),
}

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("record store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record store serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("a record titled {0:?} already exists")]
    DuplicateTitle(String),
    #[error("record file {} is corrupt and has no usable backup: {source}", .path.display())]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything that makes a scheduled run stop early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    /// Short message meant for whoever manages the feed settings.
    pub fn advisory(&self) -> &'static str {
        match self {
            PipelineError::Config(ConfigError::MissingUrl) => {
                "Hey there. I need a feed URL before I can move forward."
            }
            PipelineError::Config(ConfigError::MissingSchedule) => {
                "Sorry, I cannot locate a schedule. Try saving the settings again."
            }
            PipelineError::Config(_) => "The feed settings could not be read.",
            PipelineError::Fetch(FetchError::Unsavable(_)) => {
                "Bummer. I'm unable to save the feed. Please try again later."
            }
            PipelineError::Fetch(_) => "The feed could not be downloaded. Please try again later.",
            PipelineError::Parse(_) => "Yikes. The feed data does not look like XML.",
        }
    }
}
