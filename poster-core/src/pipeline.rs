use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::cache::FeedCache;
use crate::config::{FeedConfig, PosterConfig, PublishingConfig};
use crate::error::{FetchError, PipelineError};
use crate::fetcher::{get_feed, FeedFetcher};
use crate::parser;
use crate::publisher::{create_posts, PublishReport};
use crate::records::RecordStore;
use crate::schedule::ScheduledJob;

/// One feed wired to one record store: fetch, parse, publish.
pub struct Pipeline {
    feed: FeedConfig,
    publishing: PublishingConfig,
    fetcher: FeedFetcher,
    cache: FeedCache,
    store: Arc<dyn RecordStore>,
}

impl Pipeline {
    pub fn new(
        feed: FeedConfig,
        publishing: PublishingConfig,
        fetcher: FeedFetcher,
        cache: FeedCache,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            feed,
            publishing,
            fetcher,
            cache,
            store,
        }
    }

    pub fn from_config(
        config: &PosterConfig,
        cache: FeedCache,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, FetchError> {
        let fetcher = FeedFetcher::new(&config.fetch)?;
        Ok(Self::new(
            config.feed.clone(),
            config.publishing.clone(),
            fetcher,
            cache,
            store,
        ))
    }

    /// Runs the whole import once. Nothing is cached unless it parsed.
    pub async fn run_once(&self) -> Result<PublishReport, PipelineError> {
        let raw = get_feed(&self.feed, &self.cache, &self.fetcher).await?;
        let items = parser::parse(&raw)?;
        let report = create_posts(self.store.as_ref(), items, &self.publishing).await;
        if let Some(advisory) = report.advisory() {
            warn!(feed = %self.feed.url, advisory, "feed has no items");
        }
        Ok(report)
    }
}

#[async_trait]
impl ScheduledJob for Pipeline {
    async fn run(&self) {
        match self.run_once().await {
            Ok(report) => info!(
                feed = %self.feed.url,
                considered = report.considered,
                created = report.created_count(),
                skipped = report.skipped,
                failed = report.failed,
                "feed import finished"
            ),
            Err(err) => warn!(
                feed = %self.feed.url,
                error = %err,
                advisory = err.advisory(),
                "feed import skipped this run"
            ),
        }
    }
}
