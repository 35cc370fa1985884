use crate::model::TagNode;
use serde::{Deserialize, Serialize};

/// One entry of a pattern search over the user's tags.
///
/// When new tags are allowed, the server may answer with a suggested path
/// whose trailing segments do not exist yet; `new_tags_count` says how many
/// of them would be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMatch {
    #[serde(flatten)]
    pub tag: TagNode,
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "newTagsCnt")]
    pub new_tags_count: u32,
}

impl TagMatch {
    /// Whether accepting this match would create tags.
    pub fn is_new(&self) -> bool {
        self.new_tags_count > 0
    }
}
