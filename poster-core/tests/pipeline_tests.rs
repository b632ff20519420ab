use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use poster_core::{
    cache_key, create_posts, FeedCache, FeedConfig, FeedFetcher, FeedItem, FetchConfig,
    ParseError, PipelineError, Pipeline, PostDraft, PostStatus, PostStore, PublishingConfig,
    Record, RecordStore, RecordStoreError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss_with_items(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                "<item><title>{title}</title><link>http://example.com/{i}</link>\
                 <description>Body {i}</description></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test Feed</title>{items}</channel></rss>"#
    )
}

fn item(title: &str) -> FeedItem {
    FeedItem {
        title: title.into(),
        description: format!("about {title}"),
        ..Default::default()
    }
}

fn publishing(limit: usize) -> PublishingConfig {
    PublishingConfig {
        item_limit: limit,
        ..Default::default()
    }
}

async fn pipeline_for(
    server: &MockServer,
    limit: usize,
    store: Arc<dyn RecordStore>,
) -> Pipeline {
    let feed = FeedConfig {
        name: "Top Stories".into(),
        url: format!("{}/feed", server.uri()),
        refresh_interval_hours: 1,
    };
    let fetcher = FeedFetcher::new(&FetchConfig::default()).unwrap();
    Pipeline::new(feed, publishing(limit), fetcher, FeedCache::in_memory(), store)
}

async fn serve(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn limit_takes_a_prefix_in_document_order() {
    let server = MockServer::start().await;
    serve(&server, rss_with_items(&["First", "Second", "Third"])).await;

    let store = Arc::new(PostStore::in_memory());
    let pipeline = pipeline_for(&server, 2, store.clone()).await;
    let report = pipeline.run_once().await.unwrap();

    assert_eq!(report.created_count(), 2);
    let titles: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.title)
        .collect();
    assert_eq!(titles, ["First", "Second"]);
}

#[tokio::test]
async fn trashed_record_with_same_stripped_title_blocks_creation() {
    let server = MockServer::start().await;
    serve(
        &server,
        rss_with_items(&["<![CDATA[<b>Rust 2.0</b> released]]>"]),
    )
    .await;

    let store = Arc::new(PostStore::in_memory());
    store
        .insert(PostDraft {
            title: "Rust 2.0 released".into(),
            content: String::new(),
            author_id: 1,
            category_id: 1,
            status: PostStatus::Trash,
        })
        .await
        .unwrap();

    let pipeline = pipeline_for(&server, 5, store.clone()).await;
    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.created_count(), 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn second_run_with_same_items_creates_nothing() {
    let store = PostStore::in_memory();
    let items = vec![item("One"), item("Two"), item("Three")];
    let config = publishing(5);

    let first = create_posts(&store, items.clone(), &config).await;
    assert_eq!(first.created_count(), 3);

    let second = create_posts(&store, items, &config).await;
    assert_eq!(second.created_count(), 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(store.list().await.unwrap().len(), 3);
}

#[tokio::test]
async fn items_past_the_limit_are_never_pulled() {
    let store = PostStore::in_memory();
    let items = vec![item("A"), item("B")]
        .into_iter()
        .chain(std::iter::from_fn(|| -> Option<FeedItem> {
            panic!("item beyond the limit was requested")
        }));

    let report = create_posts(&store, items, &publishing(2)).await;
    assert_eq!(report.considered, 2);
    assert_eq!(report.created_count(), 2);
}

#[tokio::test]
async fn oversized_limit_is_capped_at_five() {
    let store = PostStore::in_memory();
    let items: Vec<_> = (0..8).map(|i| item(&format!("Story {i}"))).collect();

    let report = create_posts(&store, items, &publishing(10)).await;
    assert_eq!(report.considered, 5);
    assert_eq!(report.created_count(), 5);
}

#[tokio::test]
async fn fewer_items_than_limit_processes_what_exists() {
    let store = PostStore::in_memory();
    let report = create_posts(&store, vec![item("Only")], &publishing(5)).await;
    assert_eq!(report.considered, 1);
    assert_eq!(report.created_count(), 1);
    assert_eq!(report.advisory(), None);
}

#[tokio::test]
async fn empty_feed_is_a_no_op_with_advisory() {
    let server = MockServer::start().await;
    serve(&server, rss_with_items(&[])).await;

    let store = Arc::new(PostStore::in_memory());
    let report = pipeline_for(&server, 3, store.clone())
        .await
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.created_count(), 0);
    assert!(report.advisory().is_some());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_titles_inside_one_feed_create_one_record() {
    let store = PostStore::in_memory();
    let items = vec![item("Same"), item("<i>Same</i>")];
    let report = create_posts(&store, items, &publishing(5)).await;
    assert_eq!(report.created_count(), 1);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn created_records_carry_publishing_settings() {
    let store = PostStore::in_memory();
    let config = PublishingConfig {
        author_id: 9,
        category_id: 4,
        item_limit: 1,
        post_status: PostStatus::Publish,
    };
    let report = create_posts(&store, vec![item("Hello")], &config).await;
    let record = &report.created[0];
    assert_eq!(record.author_id, 9);
    assert_eq!(record.category_id, 4);
    assert_eq!(record.status, PostStatus::Publish);
    assert_eq!(record.content, "about Hello");
}

/// Rejects inserts for one title, delegates everything else.
struct FlakyStore {
    inner: PostStore,
    broken_title: &'static str,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn find_by_title(&self, title: &str) -> Result<Vec<Record>, RecordStoreError> {
        self.inner.find_by_title(title).await
    }

    async fn insert(&self, draft: PostDraft) -> Result<Record, RecordStoreError> {
        if draft.title == self.broken_title {
            return Err(RecordStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.insert(draft).await
    }

    async fn list(&self) -> Result<Vec<Record>, RecordStoreError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn store_failure_on_one_item_does_not_stop_the_batch() {
    let store = FlakyStore {
        inner: PostStore::in_memory(),
        broken_title: "Two",
    };
    let items = vec![item("One"), item("Two"), item("Three")];
    let report = create_posts(&store, items, &publishing(3)).await;
    assert_eq!(report.created_count(), 2);
    assert_eq!(report.failed, 1);

    let titles: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, ["One", "Three"]);
}

#[tokio::test]
async fn unparsable_cached_data_aborts_the_run() {
    let server = MockServer::start().await;
    let cache = FeedCache::in_memory();
    cache
        .put(
            &cache_key("Top Stories"),
            "<rss><item></rss>".into(),
            Duration::from_secs(60),
        )
        .await;

    let feed = FeedConfig {
        name: "Top Stories".into(),
        url: format!("{}/feed", server.uri()),
        refresh_interval_hours: 4,
    };
    let store = Arc::new(PostStore::in_memory());
    let pipeline = Pipeline::new(
        feed,
        publishing(1),
        FeedFetcher::new(&FetchConfig::default()).unwrap(),
        cache,
        store.clone(),
    );
    let err = pipeline.run_once().await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(ParseError::Xml { .. })));
    assert!(store.list().await.unwrap().is_empty());
}
