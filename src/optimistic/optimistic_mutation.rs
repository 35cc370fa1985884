use crate::model::{TagId, TagUpdate};
use crate::optimistic::{MirrorError, TagTreeMirror};
use crate::rpc::RpcClientError;
use serde_json::Value;
use thiserror::Error;

/// A user edit on the tag tree, expressed in presentation keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEdit {
    /// Drop `key` onto `new_parent`, making it the parent's last child.
    Move { key: String, new_parent: String },
    /// Inline rename. `input` is the raw edited text: comma-separated names.
    Rename { key: String, input: String },
}

impl TagEdit {
    pub fn key(&self) -> &str {
        match self {
            TagEdit::Move { key, .. } | TagEdit::Rename { key, .. } => key,
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("the root tag cannot be renamed or moved")]
    RootImmutable,
    #[error("cannot move {key:?} under its own descendant {target:?}")]
    MoveUnderDescendant { key: String, target: String },
    #[error("{key:?} is already a child of {parent:?}")]
    VoidMove { key: String, parent: String },
    #[error("a tag needs at least one non-empty name")]
    EmptyNames,
    /// Another change touching `key` still awaits the server.
    #[error("{key:?} has a change awaiting the server")]
    Pending { key: String },
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    /// The server refused the change; the local tree has been reverted.
    #[error("server rejected the change: {0}")]
    Rejected(#[source] RpcClientError),
    #[error("mutation already settled")]
    AlreadySettled,
}

impl MutationError {
    /// Whether the edit was refused locally, before any request was sent.
    pub fn is_local(&self) -> bool {
        !matches!(self, MutationError::Rejected(_))
    }

    /// The server error payload to show the user, if any.
    pub fn error_body(&self) -> Option<&Value> {
        match self {
            MutationError::Rejected(err) => err.application_body(),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MutationPhase {
    /// Applied locally, awaiting the server.
    Applied,
    Confirmed,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    Move { parent: String, index: usize },
    Rename { title: String },
}

/// One speculative change to a [`TagTreeMirror`].
///
/// Lifecycle: [`apply`](Self::apply) validates the edit, captures what is
/// needed to undo it, marks the node pending and changes the tree. The caller
/// then sends [`update`](Self::update) to the server and finishes with
/// [`confirm`](Self::confirm) or [`revert`](Self::revert). Both clear the
/// pending marker; only `revert` restores the captured state.
#[derive(Debug)]
pub struct OptimisticMutation {
    key: String,
    tag_id: TagId,
    update: TagUpdate,
    undo: Undo,
    phase: MutationPhase,
}

/// Splits rename input into trimmed, non-empty names.
pub fn parse_tag_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

impl OptimisticMutation {
    /// Validates `edit` against `tree` and applies it. A rejected edit leaves
    /// the tree untouched.
    pub fn apply(tree: &mut TagTreeMirror, edit: TagEdit) -> Result<Self, MutationError> {
        if tree.is_root(edit.key()) {
            return Err(MutationError::RootImmutable);
        }

        let tag_id = tree
            .get(edit.key())
            .map(|node| node.tag_id)
            .ok_or_else(|| MirrorError::UnknownNode(edit.key().to_string()))?;

        if tree.is_pending(edit.key()) {
            return Err(MutationError::Pending {
                key: edit.key().to_string(),
            });
        }

        match edit {
            TagEdit::Move { key, new_parent } => {
                let parent_tag_id = tree
                    .get(&new_parent)
                    .map(|node| node.tag_id)
                    .ok_or_else(|| MirrorError::UnknownNode(new_parent.clone()))?;

                // An earlier move's undo must still find its nodes where it
                // left them.
                if let Some(busy) = Self::pending_around_move(tree, &key, &new_parent) {
                    return Err(MutationError::Pending { key: busy });
                }

                if tree.is_descendant(&key, &new_parent) {
                    return Err(MutationError::MoveUnderDescendant {
                        key,
                        target: new_parent,
                    });
                }
                if tree.parent_of(&key) == Some(new_parent.as_str()) {
                    return Err(MutationError::VoidMove {
                        key,
                        parent: new_parent,
                    });
                }

                let (parent, index) = tree.move_node(&key, &new_parent)?;
                tree.set_pending(&key, true)?;

                Ok(Self {
                    key,
                    tag_id,
                    update: TagUpdate::move_to(parent_tag_id),
                    undo: Undo::Move { parent, index },
                    phase: MutationPhase::Applied,
                })
            }
            TagEdit::Rename { key, input } => {
                let names = parse_tag_names(&input);
                if names.is_empty() {
                    return Err(MutationError::EmptyNames);
                }

                // The edited text is shown as typed until the server answers.
                let title = tree.set_title(&key, input)?;
                tree.set_pending(&key, true)?;

                Ok(Self {
                    key,
                    tag_id,
                    update: TagUpdate::rename(names),
                    undo: Undo::Rename { title },
                    phase: MutationPhase::Applied,
                })
            }
        }
    }

    /// A pending node among the move's target, the old parent and the
    /// subtree being moved.
    fn pending_around_move(tree: &TagTreeMirror, key: &str, new_parent: &str) -> Option<String> {
        let old_parent = tree.parent_of(key);
        [Some(new_parent), old_parent]
            .into_iter()
            .flatten()
            .find(|k| tree.is_pending(k))
            .or_else(|| {
                tree.pending_keys()
                    .into_iter()
                    .find(|pending| tree.is_descendant(key, pending))
            })
            .map(String::from)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    /// The update to send to the server.
    pub fn update(&self) -> &TagUpdate {
        &self.update
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    /// The server accepted the change; the local tree is authoritative again.
    pub fn confirm(&mut self, tree: &mut TagTreeMirror) -> Result<(), MutationError> {
        self.ensure_applied()?;
        tree.set_pending(&self.key, false)?;
        self.phase = MutationPhase::Confirmed;
        Ok(())
    }

    /// The server refused the change; restore the captured state.
    pub fn revert(&mut self, tree: &mut TagTreeMirror) -> Result<(), MutationError> {
        self.ensure_applied()?;
        tree.set_pending(&self.key, false)?;

        match &self.undo {
            Undo::Move { parent, index } => {
                tree.move_node_to(&self.key, parent, *index)?;
            }
            Undo::Rename { title } => {
                tree.set_title(&self.key, title.clone())?;
            }
        }

        tracing::debug!("Reverted optimistic change to tag {}", self.key);
        self.phase = MutationPhase::Reverted;
        Ok(())
    }

    /// Confirms or reverts according to the server's answer.
    pub fn settle<T>(
        &mut self,
        tree: &mut TagTreeMirror,
        result: Result<T, RpcClientError>,
    ) -> Result<T, MutationError> {
        match result {
            Ok(value) => {
                self.confirm(tree)?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Tag {} update failed: {}", self.key, err);
                self.revert(tree)?;
                Err(MutationError::Rejected(err))
            }
        }
    }

    fn ensure_applied(&self) -> Result<(), MutationError> {
        match self.phase {
            MutationPhase::Applied => Ok(()),
            _ => Err(MutationError::AlreadySettled),
        }
    }
}
