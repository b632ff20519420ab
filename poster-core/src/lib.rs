pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod publisher;
pub mod records;
pub mod schedule;

pub use cache::{cache_key, CacheEntry, FeedCache};
pub use config::{FeedConfig, FetchConfig, PostStatus, PosterConfig, PublishingConfig};
pub use error::{ConfigError, FetchError, ParseError, PipelineError, RecordStoreError};
pub use feed::FeedItem;
pub use fetcher::{get_feed, FeedFetcher};
pub use pipeline::Pipeline;
pub use publisher::{create_posts, strip_all_tags, PublishReport};
pub use records::{PostDraft, PostStore, Record, RecordStore};
pub use schedule::{
    set_fetch_interval, Recurrence, ScheduledJob, Scheduler, TokioScheduler, SCHEDULE_HOOK,
};
