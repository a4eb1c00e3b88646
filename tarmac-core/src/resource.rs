//! Resource - Desired and observed shape of a managed resource

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tags::KeyValueTags;

/// Unique identifier for a resource within the host's configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource type (e.g., "amplify_branch", "ec2_route_table")
    pub resource_type: String,
    /// Resource name as declared by the user
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Desired state declared by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: Map<String, Value>,
    /// Tags declared on the resource itself, before provider defaults
    #[serde(default)]
    pub tags: KeyValueTags,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: Map::new(),
            tags: KeyValueTags::default(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }
}

/// Current state fetched from the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: ResourceId,
    /// Identifier persisted by the host, possibly composite
    pub identifier: Option<String>,
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub tags: KeyValueTags,
    /// Whether the resource exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: Map::new(),
            tags: KeyValueTags::default(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: Map<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            tags: KeyValueTags::default(),
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_tags(mut self, tags: KeyValueTags) -> Self {
        self.tags = tags;
        self
    }
}
