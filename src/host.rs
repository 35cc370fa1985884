mod host_surface;

pub use host_surface::{
    ActiveContext, EditView, HostSurface, OpenViewError, open_bookmark_editor,
    open_new_bookmark, open_tag_editor,
};
