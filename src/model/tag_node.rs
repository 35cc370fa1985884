use crate::constants::TAG_TITLE_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub type TagId = u64;

/// A tag and, when requested in tree shape, its subtags.
///
/// The first entry of `names` is the canonical name; the rest are aliases.
/// The synthetic root owning all of a user's tags has a single empty name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagNode {
    pub id: TagId,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "parentTagID",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_tag_id: Option<TagId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtags: Option<Vec<TagNode>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TagTreeError {
    #[error("tag id {0} appears more than once in the tree")]
    DuplicateId(TagId),
}

impl TagNode {
    pub fn new(id: TagId, names: Vec<String>) -> Self {
        Self {
            id,
            names,
            description: None,
            parent_tag_id: None,
            subtags: None,
        }
    }

    pub fn with_subtags(mut self, subtags: Vec<TagNode>) -> Self {
        self.subtags = Some(subtags);
        self
    }

    pub fn canonical_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// All names joined for display, e.g. `"work, job"`.
    pub fn title(&self) -> String {
        self.names.join(TAG_TITLE_SEPARATOR)
    }

    pub fn subtags(&self) -> &[TagNode] {
        self.subtags.as_deref().unwrap_or(&[])
    }

    /// Depth-first, pre-order search for `id`.
    pub fn find(&self, id: TagId) -> Option<&TagNode> {
        if self.id == id {
            return Some(self);
        }
        self.subtags().iter().find_map(|tag| tag.find(id))
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.find(id).is_some()
    }

    /// Ids from this node down to `id`, both ends included.
    pub fn path_to(&self, id: TagId) -> Option<Vec<TagId>> {
        if self.id == id {
            return Some(vec![self.id]);
        }
        self.subtags().iter().find_map(|tag| {
            tag.path_to(id).map(|mut path| {
                path.insert(0, self.id);
                path
            })
        })
    }

    /// Id of the node directly above `id`, if `id` is below this node.
    pub fn parent_of(&self, id: TagId) -> Option<TagId> {
        let path = self.path_to(id)?;
        path.len().checked_sub(2).map(|index| path[index])
    }

    /// Looks a tag up by its slash-separated name path, matching any alias at
    /// each level, e.g. `"work/projects"`.
    pub fn find_by_path(&self, path: &str) -> Option<&TagNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.subtags()
                    .iter()
                    .find(|tag| tag.names.iter().any(|name| name == segment))
            })
    }

    /// Pre-order traversal of this node and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &TagNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.subtags().iter().rev());
            Some(node)
        })
    }

    /// Checks that every id occurs once, so every non-root node has exactly
    /// one parent.
    pub fn validate(&self) -> Result<(), TagTreeError> {
        let mut seen = HashSet::new();
        for node in self.iter() {
            if !seen.insert(node.id) {
                return Err(TagTreeError::DuplicateId(node.id));
            }
        }
        Ok(())
    }
}
