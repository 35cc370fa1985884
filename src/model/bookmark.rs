use crate::model::TagId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type BookmarkId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, rename = "tagIDs")]
    pub tag_ids: BTreeSet<TagId>,
    /// Seconds since the UNIX epoch, as reported by the server.
    #[serde(default, rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl Bookmark {
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.updated_at?).ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    pub fn is_tagged_with(&self, tag_id: TagId) -> bool {
        self.tag_ids.contains(&tag_id)
    }
}

/// Body of a bookmark create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkData {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, rename = "tagIDs")]
    pub tag_ids: BTreeSet<TagId>,
}

impl BookmarkData {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids.extend(tag_ids);
        self
    }
}

/// Server acknowledgement of `POST /bookmarks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkCreated {
    #[serde(rename = "bookmarkID")]
    pub bookmark_id: BookmarkId,
}
