use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::config::PublishingConfig;
use crate::error::RecordStoreError;
use crate::feed::FeedItem;
use crate::records::{PostDraft, Record, RecordStore};

/// What one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub considered: usize,
    pub created: Vec<Record>,
    pub skipped: usize,
    pub failed: usize,
}

impl PublishReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    /// Message for the settings screen when the feed had nothing to offer.
    pub fn advisory(&self) -> Option<&'static str> {
        (self.considered == 0).then_some("Ugh. There doesn't seem to be any data in the RSS feed.")
    }
}

/// Elements whose text never ends up in a title.
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Removes markup: `<script>`/`<style>` blocks go with their contents, every
/// other tag is dropped, surrounding whitespace is trimmed. A `<` that does
/// not open a tag is kept as text.
pub fn strip_all_tags(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    collect_text(fragment.root_element(), &mut out);
    out.trim().to_owned()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = child.value().as_element() {
            if SKIPPED_ELEMENTS.contains(&el.name()) {
                continue;
            }
            if let Some(child_ref) = ElementRef::wrap(child) {
                collect_text(child_ref, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

pub fn draft_from_item(item: &FeedItem, config: &PublishingConfig) -> PostDraft {
    PostDraft {
        title: strip_all_tags(&item.title),
        content: item.description.clone(),
        author_id: config.author_id,
        category_id: config.category_id,
        status: config.post_status,
    }
}

/// Turns the first `item_limit` items into records, skipping every title
/// that is already stored under any status.
///
/// The limit is clamped to 1..=5 and items past it are never pulled from
/// `items`. A store failure on one item is logged and the batch carries on.
pub async fn create_posts<S, I>(store: &S, items: I, config: &PublishingConfig) -> PublishReport
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = FeedItem>,
{
    let mut report = PublishReport::default();

    for item in items.into_iter().take(config.effective_item_limit()) {
        report.considered += 1;
        let draft = draft_from_item(&item, config);

        match store.find_by_title(&draft.title).await {
            Ok(existing) if !existing.is_empty() => {
                debug!(title = %draft.title, "duplicate title, skipping");
                report.skipped += 1;
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(title = %draft.title, error = %err, "duplicate lookup failed");
                report.failed += 1;
                continue;
            }
        }

        let title = draft.title.clone();
        match store.insert(draft).await {
            Ok(record) => {
                info!(id = record.id, title = %record.title, status = record.status.as_str(), "post created");
                report.created.push(record);
            }
            Err(RecordStoreError::DuplicateTitle(_)) => {
                debug!(%title, "title was taken concurrently, skipping");
                report.skipped += 1;
            }
            Err(err) => {
                warn!(%title, error = %err, "failed to create post");
                report.failed += 1;
            }
        }
    }

    report
}
