use crate::model::TagId;
use serde::{Deserialize, Serialize};

/// Body of `POST /tags/{parentPath}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ask the server to create missing ancestors of the parent path.
    #[serde(default, rename = "createIntermediary")]
    pub create_intermediary: bool,
}

impl NewTag {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn create_intermediary(mut self, create_intermediary: bool) -> Self {
        self.create_intermediary = create_intermediary;
        self
    }
}

/// Body of `PUT /tags/{idOrPath}`. Only the fields that are set are sent;
/// setting `parent_tag_id` moves the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "parentTagID",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_tag_id: Option<TagId>,
}

impl TagUpdate {
    pub fn rename<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn move_to(parent_tag_id: TagId) -> Self {
        Self {
            parent_tag_id: Some(parent_tag_id),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_none() && self.description.is_none() && self.parent_tag_id.is_none()
    }
}

/// Server acknowledgement of `POST /tags/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCreated {
    #[serde(rename = "tagID")]
    pub tag_id: TagId,
}
