mod bookmark;
mod tag_match;
mod tag_node;
mod tag_payloads;

pub use bookmark::{Bookmark, BookmarkCreated, BookmarkData, BookmarkId};
pub use tag_match::TagMatch;
pub use tag_node::{TagId, TagNode, TagTreeError};
pub use tag_payloads::{NewTag, TagCreated, TagUpdate};
