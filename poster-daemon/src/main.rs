use std::path::{Path, PathBuf};
use std::sync::Arc;

use poster_core::{
    set_fetch_interval, ConfigError, FeedCache, Pipeline, PipelineError, PostStore, PosterConfig,
    Scheduler, TokioScheduler, SCHEDULE_HOOK,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let config_path = PosterConfig::config_file_path();
    let config = match PosterConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            report_config_error(&config_path, err);
            return;
        }
    };

    let data_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(PosterConfig::config_dir);
    let cache = FeedCache::load_from(data_dir.join("feed_cache.json")).await;
    let posts_path = data_dir.join("posts.json");
    let store = match PostStore::load_from(&posts_path).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(path = %posts_path.display(), error = %err, "refusing to start without the existing posts");
            return;
        }
    };

    let pipeline = match Pipeline::from_config(&config, cache, store) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            return;
        }
    };

    let scheduler = TokioScheduler::new();
    match set_fetch_interval(&scheduler, Some(&config.feed), pipeline).await {
        Ok(recurrence) => info!(
            recurrence = recurrence.name(),
            label = recurrence.display(),
            "rssposter running, press Ctrl-C to stop"
        ),
        Err(err) => {
            report_config_error(&config_path, err);
            return;
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
    scheduler.cancel_recurring(SCHEDULE_HOOK).await;
    scheduler.shutdown().await;
    info!("rssposter stopped");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Writes a default config when none exists so there is something to edit.
fn report_config_error(path: &Path, err: ConfigError) {
    let missing = matches!(err, ConfigError::MissingSchedule);
    let err = PipelineError::from(err);
    error!(path = %path.display(), error = %err, advisory = err.advisory(), "cannot start");
    if missing {
        match PosterConfig::default().save(path) {
            Ok(()) => info!(path = %path.display(), "wrote default settings"),
            Err(save_err) => warn!(error = %save_err, "failed to write default settings"),
        }
    }
}
