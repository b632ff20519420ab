use reqwest::{redirect, Client};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{cache_key, FeedCache};
use crate::config::{FeedConfig, FetchConfig};
use crate::error::{ConfigError, FetchError, PipelineError};
use crate::parser;

/// Downloads raw feed documents.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(5))
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client })
    }

    /// GETs `url` and returns the body as text. The body is not checked for XML.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(response.text().await?)
    }
}

/// Returns the feed document, from the cache while it is fresh and from the
/// network otherwise. Only well-formed XML is ever cached.
pub async fn get_feed(
    feed: &FeedConfig,
    cache: &FeedCache,
    fetcher: &FeedFetcher,
) -> Result<String, PipelineError> {
    if feed.url.trim().is_empty() {
        return Err(ConfigError::MissingUrl.into());
    }

    let key = cache_key(&feed.name);
    if let Some(raw) = cache.get(&key).await {
        debug!(%key, "feed served from cache");
        return Ok(raw);
    }

    let raw = fetcher.fetch(feed.url.trim()).await?;
    if raw.trim().is_empty() {
        return Err(FetchError::Unsavable("empty response body".into()).into());
    }
    if let Err(err) = parser::validate(&raw) {
        warn!(feed = %feed.url, error = %err, "refusing to cache malformed feed");
        return Err(FetchError::Unsavable(err.to_string()).into());
    }

    let ttl = feed.cache_ttl();
    cache.put(&key, raw.clone(), ttl).await;
    info!(feed = %feed.url, %key, ttl_secs = ttl.as_secs(), "feed fetched and cached");
    Ok(raw)
}
