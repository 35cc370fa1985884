use crate::constants::ROOT_TAG_TITLE;
use crate::model::{TagId, TagNode, TagTreeError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MirrorError {
    #[error("no node with key {0:?}")]
    UnknownNode(String),
    #[error("moving {key:?} under {target:?} would create a cycle")]
    WouldCreateCycle { key: String, target: String },
    #[error("the root node cannot be moved")]
    RootNotMovable,
    #[error(transparent)]
    InvalidTree(#[from] TagTreeError),
}

/// One row of the presentation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorNode {
    pub key: String,
    pub tag_id: TagId,
    pub title: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// The server sent a subtag list for this tag.
    pub folder: bool,
    /// Set while an optimistic change to this node awaits server confirmation.
    pub pending: bool,
}

/// Presentation-layer copy of a tag tree, keyed by stringified tag id.
///
/// Built once per load from the server's tree. Mutations are expected to go
/// through [`OptimisticMutation`](crate::optimistic::OptimisticMutation) so the
/// mirror never drifts from the last confirmed server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTreeMirror {
    root_key: String,
    nodes: HashMap<String, MirrorNode>,
}

impl TagTreeMirror {
    pub fn from_tag_tree(root: &TagNode) -> Result<Self, MirrorError> {
        root.validate()?;

        let mut nodes = HashMap::new();
        Self::insert_subtree(&mut nodes, root, None);

        let root_key = root.id.to_string();
        if let Some(node) = nodes.get_mut(&root_key) {
            node.title = ROOT_TAG_TITLE.to_string();
        }

        Ok(Self { root_key, nodes })
    }

    fn insert_subtree(
        nodes: &mut HashMap<String, MirrorNode>,
        tag: &TagNode,
        parent: Option<String>,
    ) {
        let key = tag.id.to_string();
        let children: Vec<String> = tag.subtags().iter().map(|t| t.id.to_string()).collect();

        nodes.insert(
            key.clone(),
            MirrorNode {
                key: key.clone(),
                tag_id: tag.id,
                title: tag.title(),
                parent,
                children,
                folder: tag.subtags.is_some(),
                pending: false,
            },
        );

        for subtag in tag.subtags() {
            Self::insert_subtree(nodes, subtag, Some(key.clone()));
        }
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    pub fn is_root(&self, key: &str) -> bool {
        self.root_key == key
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MirrorNode> {
        self.nodes.get(key)
    }

    fn node(&self, key: &str) -> Result<&MirrorNode, MirrorError> {
        self.nodes
            .get(key)
            .ok_or_else(|| MirrorError::UnknownNode(key.to_string()))
    }

    fn node_mut(&mut self, key: &str) -> Result<&mut MirrorNode, MirrorError> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| MirrorError::UnknownNode(key.to_string()))
    }

    pub fn parent_of(&self, key: &str) -> Option<&str> {
        self.nodes.get(key)?.parent.as_deref()
    }

    pub fn children(&self, key: &str) -> &[String] {
        self.nodes
            .get(key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the node renders as a folder: the server sent a subtag list
    /// for it, or it currently has children.
    pub fn is_folder(&self, key: &str) -> bool {
        self.nodes
            .get(key)
            .is_some_and(|node| node.folder || !node.children.is_empty())
    }

    pub fn title(&self, key: &str) -> Option<&str> {
        self.nodes.get(key).map(|node| node.title.as_str())
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.nodes.get(key).is_some_and(|node| node.pending)
    }

    /// Keys of all nodes carrying the pending marker, sorted.
    pub fn pending_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .nodes
            .values()
            .filter(|node| node.pending)
            .map(|node| node.key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn set_pending(&mut self, key: &str, pending: bool) -> Result<(), MirrorError> {
        self.node_mut(key)?.pending = pending;
        Ok(())
    }

    /// Whether `key` is `ancestor` itself or lies anywhere below it.
    pub fn is_descendant(&self, ancestor: &str, key: &str) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent_of(k);
        }
        false
    }

    /// Replaces the title and returns the previous one.
    pub fn set_title(&mut self, key: &str, title: impl Into<String>) -> Result<String, MirrorError> {
        let node = self.node_mut(key)?;
        Ok(std::mem::replace(&mut node.title, title.into()))
    }

    /// Moves `key` to be the last child of `new_parent`. Returns the previous
    /// parent and position so the move can be undone exactly.
    pub fn move_node(
        &mut self,
        key: &str,
        new_parent: &str,
    ) -> Result<(String, usize), MirrorError> {
        let index = self.node(new_parent)?.children.len();
        self.move_node_to(key, new_parent, index)
    }

    /// Moves `key` under `new_parent` at `index` (clamped to the child count).
    pub fn move_node_to(
        &mut self,
        key: &str,
        new_parent: &str,
        index: usize,
    ) -> Result<(String, usize), MirrorError> {
        let old_parent = self
            .node(key)?
            .parent
            .clone()
            .ok_or(MirrorError::RootNotMovable)?;
        self.node(new_parent)?;

        if self.is_descendant(key, new_parent) {
            return Err(MirrorError::WouldCreateCycle {
                key: key.to_string(),
                target: new_parent.to_string(),
            });
        }

        let siblings = &mut self.node_mut(&old_parent)?.children;
        let old_index = siblings
            .iter()
            .position(|child| child == key)
            .ok_or_else(|| MirrorError::UnknownNode(key.to_string()))?;
        siblings.remove(old_index);

        let parent = self.node_mut(new_parent)?;
        let index = index.min(parent.children.len());
        parent.children.insert(index, key.to_string());

        self.node_mut(key)?.parent = Some(new_parent.to_string());

        Ok((old_parent, old_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TagTreeMirror {
        let root = TagNode::new(1, vec![String::new()]).with_subtags(vec![
            TagNode::new(2, vec!["work".into(), "job".into()])
                .with_subtags(vec![TagNode::new(4, vec!["projects".into()])]),
            TagNode::new(3, vec!["home".into()]),
        ]);
        TagTreeMirror::from_tag_tree(&root).unwrap()
    }

    #[test]
    fn builds_titles_and_links() {
        let mirror = tree();
        assert_eq!(mirror.len(), 4);
        assert_eq!(mirror.title("1"), Some(ROOT_TAG_TITLE));
        assert_eq!(mirror.title("2"), Some("work, job"));
        assert_eq!(mirror.parent_of("4"), Some("2"));
        assert_eq!(mirror.children("1"), &["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn move_and_restore_position() {
        let mut mirror = tree();
        let before = mirror.clone();

        let (old_parent, old_index) = mirror.move_node("2", "3").unwrap();
        assert_eq!((old_parent.as_str(), old_index), ("1", 0));
        assert_eq!(mirror.parent_of("2"), Some("3"));
        assert!(mirror.is_folder("3"));
        assert!(!before.is_folder("3"));

        mirror.move_node_to("2", &old_parent, old_index).unwrap();
        assert_eq!(mirror.children("1"), before.children("1"));
        assert_eq!(mirror.parent_of("2"), Some("1"));
    }

    #[test]
    fn refuses_cycles_and_root_moves() {
        let mut mirror = tree();
        assert!(matches!(
            mirror.move_node("2", "4"),
            Err(MirrorError::WouldCreateCycle { .. })
        ));
        assert_eq!(mirror.move_node("1", "3"), Err(MirrorError::RootNotMovable));
        assert_eq!(
            mirror.move_node("9", "3"),
            Err(MirrorError::UnknownNode("9".into()))
        );
    }
}
