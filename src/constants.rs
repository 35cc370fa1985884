// Request ids
pub const FIRST_REQUEST_ID: u32 = 1;

/// The only status treated as success. Anything else is an application failure.
pub const RPC_SUCCESS_STATUS: u16 = 200;

/// Logical resource path roots.
pub const TAGS_PATH: &str = "/tags";
pub const BOOKMARKS_PATH: &str = "/bookmarks";

/// Query-value keys understood by the server.
pub const VALUE_SHAPE: &str = "shape";
pub const VALUE_PATTERN: &str = "pattern";
pub const VALUE_ALLOW_NEW: &str = "allow_new";
pub const VALUE_TAG_ID: &str = "tag_id";
pub const VALUE_URL: &str = "url";

/// Response shapes for tag queries.
pub const SHAPE_SINGLE: &str = "single";
pub const SHAPE_FLAT: &str = "flat";

/// Title shown for the synthetic root in the presentation tree.
pub const ROOT_TAG_TITLE: &str = "my tags";

/// Separator used when rendering a tag's aliases as one title.
pub const TAG_TITLE_SEPARATOR: &str = ", ";
