use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `<item>` pulled out of the feed. Absent fields are empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub author: String,
    pub publish_date: String,
    pub link: String,
}

impl FeedItem {
    /// `publish_date` as a timestamp, when it is valid RFC 2822.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(self.publish_date.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
