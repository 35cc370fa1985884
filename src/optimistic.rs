mod optimistic_mutation;
mod tag_tree_mirror;
mod tag_update_caller;

pub use optimistic_mutation::{
    MutationError, MutationPhase, OptimisticMutation, TagEdit, parse_tag_names,
};
pub use tag_tree_mirror::{MirrorError, MirrorNode, TagTreeMirror};
pub use tag_update_caller::{TagUpdateCaller, commit_tag_edit};
