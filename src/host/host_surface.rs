use crate::model::{BookmarkId, TagId};
use crate::optimistic::{MirrorError, TagTreeMirror};
use thiserror::Error;

/// The tab or window the user is looking at, as the host reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContext {
    /// Host-specific handle, e.g. a browser tab id.
    pub surface_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// A page the host can open, or refocus when it is already open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EditView {
    Tag(TagId),
    Bookmark(BookmarkId),
    NewBookmark,
}

impl EditView {
    /// Identifies the page, so opening it twice refocuses the first one.
    pub fn page_key(&self) -> String {
        match self {
            EditView::Tag(id) => format!("editTag-{id}"),
            EditView::Bookmark(id) => format!("editBookmark-{id}"),
            EditView::NewBookmark => "addBookmark".to_string(),
        }
    }

    /// Query string selecting the page, e.g. `page=edit-tag&tag_id=42`.
    pub fn query(&self) -> String {
        match self {
            EditView::Tag(id) => format!("page=edit-tag&tag_id={id}"),
            EditView::Bookmark(id) => format!("page=edit-bookmark&bkm_id={id}"),
            EditView::NewBookmark => "page=edit-bookmark&bkm_id=0".to_string(),
        }
    }
}

/// Capabilities lent by the host UI. The client invokes them but never
/// implements them; rendering and page routing stay with the host.
pub trait HostSurface: Send + Sync {
    fn active_context(&self) -> ActiveContext;

    /// Opens `view` next to `from`, or focuses it if it is already open.
    fn open_view(&self, view: EditView, from: &ActiveContext);
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OpenViewError {
    #[error("the root tag has no edit view")]
    RootHasNoEditor,
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

fn open<H>(host: &H, view: EditView)
where
    H: HostSurface + ?Sized,
{
    let from = host.active_context();
    tracing::debug!("Opening {} from {:?}", view.page_key(), from.surface_id);
    host.open_view(view, &from);
}

/// The `[edit]` action of a tag tree row.
pub fn open_tag_editor<H>(
    host: &H,
    tree: &TagTreeMirror,
    key: &str,
) -> Result<TagId, OpenViewError>
where
    H: HostSurface + ?Sized,
{
    if tree.is_root(key) {
        return Err(OpenViewError::RootHasNoEditor);
    }

    let tag_id = tree
        .get(key)
        .map(|node| node.tag_id)
        .ok_or_else(|| MirrorError::UnknownNode(key.to_string()))?;

    open(host, EditView::Tag(tag_id));
    Ok(tag_id)
}

pub fn open_bookmark_editor<H>(host: &H, id: BookmarkId)
where
    H: HostSurface + ?Sized,
{
    open(host, EditView::Bookmark(id));
}

pub fn open_new_bookmark<H>(host: &H)
where
    H: HostSurface + ?Sized,
{
    open(host, EditView::NewBookmark);
}
