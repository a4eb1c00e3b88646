//! Resource type configurations for AWS Cloud Control API
//!
//! This module defines:
//! - Resource type definitions backed by Cloud Control
//! - Mapping between host attribute names and CloudFormation property names
//! - Mapping between persisted identifiers and Cloud Control identifiers

use std::any::Any;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tarmac_core::id::{IdError, IdScheme};
use tarmac_core::provider::{ResourceTimeouts, ResourceType};
use tarmac_core::tags::KeyValueTags;

/// Separator Cloud Control uses between the parts of a compound primary identifier
pub const CLOUDCONTROL_ID_SEPARATOR: &str = "|";

/// Attribute mapping: (host_name, aws_name, is_required_for_create)
pub type AttrMapping = (&'static str, &'static str, bool);

/// Conversion between a persisted identifier and a Cloud Control identifier
pub type IdentifierFn = fn(&str) -> Result<String, IdError>;

fn same_identifier(id: &str) -> Result<String, IdError> {
    Ok(id.to_string())
}

/// Resource type configuration
#[derive(Clone, Copy)]
pub struct CloudControlResource {
    /// Host resource type name (e.g., "eks_addon")
    pub name: &'static str,
    /// AWS CloudFormation type name (e.g., "AWS::EKS::Addon")
    pub type_name: &'static str,
    pub attributes: &'static [AttrMapping],
    /// Whether this resource type uses tags
    pub has_tags: bool,
    pub timeouts: ResourceTimeouts,
    pub to_remote: IdentifierFn,
    pub from_remote: IdentifierFn,
}

impl CloudControlResource {
    pub const fn new(
        name: &'static str,
        type_name: &'static str,
        attributes: &'static [AttrMapping],
    ) -> Self {
        let twenty_minutes = Duration::from_secs(20 * 60);
        Self {
            name,
            type_name,
            attributes,
            has_tags: false,
            timeouts: ResourceTimeouts {
                create: twenty_minutes,
                update: twenty_minutes,
                delete: twenty_minutes,
            },
            to_remote: same_identifier,
            from_remote: same_identifier,
        }
    }

    pub const fn with_tags(mut self) -> Self {
        self.has_tags = true;
        self
    }

    pub const fn with_timeouts(
        mut self,
        create: Duration,
        update: Duration,
        delete: Duration,
    ) -> Self {
        self.timeouts = ResourceTimeouts {
            create,
            update,
            delete,
        };
        self
    }

    /// Persist a composite identifier instead of the Cloud Control one
    pub const fn with_identifier(
        mut self,
        to_remote: IdentifierFn,
        from_remote: IdentifierFn,
    ) -> Self {
        self.to_remote = to_remote;
        self.from_remote = from_remote;
        self
    }

    pub fn aws_name(&self, host_name: &str) -> Option<&'static str> {
        self.attributes
            .iter()
            .find(|(name, _, _)| *name == host_name)
            .map(|(_, aws_name, _)| *aws_name)
    }

    /// Attributes that must be present to create the resource but are not
    pub fn missing_required(&self, attributes: &Map<String, Value>) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|(name, _, required)| *required && !attributes.contains_key(*name))
            .map(|(name, _, _)| *name)
            .collect()
    }

    /// Desired state document sent to Cloud Control
    pub fn desired_state(&self, attributes: &Map<String, Value>, tags: &KeyValueTags) -> Value {
        let mut desired_state = Map::new();
        for (host_name, aws_name, _) in self.attributes {
            if let Some(value) = attributes.get(*host_name) {
                desired_state.insert(aws_name.to_string(), value.clone());
            }
        }
        if self.has_tags && !tags.is_empty() {
            desired_state.insert("Tags".to_string(), build_tags(tags));
        }
        Value::Object(desired_state)
    }

    /// Host attributes read back from Cloud Control properties
    pub fn attributes_from(&self, properties: &Value) -> Map<String, Value> {
        let mut attributes = Map::new();
        for (host_name, aws_name, _) in self.attributes {
            if let Some(value) = properties.get(*aws_name) {
                attributes.insert(host_name.to_string(), value.clone());
            }
        }
        attributes
    }

    /// JSON patch operations moving the remote resource to `attributes`
    pub fn patch_ops(
        &self,
        from: &Map<String, Value>,
        attributes: &Map<String, Value>,
        from_tags: &KeyValueTags,
        tags: &KeyValueTags,
    ) -> Vec<Value> {
        let mut patch_ops = Vec::new();
        for (host_name, aws_name, _) in self.attributes {
            let path = format!("/{}", aws_name);
            match (from.get(*host_name), attributes.get(*host_name)) {
                (old, Some(new)) if old != Some(new) => {
                    patch_ops.push(json!({"op": "replace", "path": path, "value": new}));
                }
                (Some(_), None) => patch_ops.push(json!({"op": "remove", "path": path})),
                _ => {}
            }
        }

        if self.has_tags && from_tags != tags {
            if tags.is_empty() {
                patch_ops.push(json!({"op": "remove", "path": "/Tags"}));
            } else {
                let value = build_tags(tags);
                patch_ops.push(json!({"op": "replace", "path": "/Tags", "value": value}));
            }
        }
        patch_ops
    }
}

impl ResourceType for CloudControlResource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn has_tags(&self) -> bool {
        self.has_tags
    }

    fn timeouts(&self) -> ResourceTimeouts {
        self.timeouts
    }

    fn remote_identifier(&self, state_id: &str) -> Result<String, IdError> {
        (self.to_remote)(state_id)
    }

    fn state_identifier(&self, remote_id: &str) -> Result<String, IdError> {
        (self.from_remote)(remote_id)
    }
}

// =============================================================================
// Identifier Helpers
// =============================================================================

/// Re-encode a persisted two-part identifier as a Cloud Control identifier
pub fn two_part_to_remote(scheme: &IdScheme<2>, state_id: &str) -> Result<String, IdError> {
    let [first, second] = scheme.parse(state_id)?;
    Ok(format!("{}{}{}", first, CLOUDCONTROL_ID_SEPARATOR, second))
}

/// Inverse of [`two_part_to_remote`]
pub fn two_part_from_remote(scheme: &IdScheme<2>, remote_id: &str) -> Result<String, IdError> {
    match remote_id.split_once(CLOUDCONTROL_ID_SEPARATOR) {
        Some((first, second)) => scheme.create([first, second]),
        None => Err(IdError::unexpected_format(
            remote_id,
            format!("FIRST{}SECOND", CLOUDCONTROL_ID_SEPARATOR),
        )),
    }
}

// =============================================================================
// Tag Helpers
// =============================================================================

/// A tag as CloudFormation properties carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnTag {
    pub key: String,
    pub value: String,
}

/// Build tags array for CloudFormation format
pub fn build_tags(tags: &KeyValueTags) -> Value {
    Value::Array(
        tags.iter()
            .map(|(key, value)| json!({"Key": key, "Value": value}))
            .collect(),
    )
}

/// Parse tags from CloudFormation format
pub fn parse_tags(tags_array: &[Value]) -> KeyValueTags {
    tags_array
        .iter()
        .filter_map(|tag| CfnTag::deserialize(tag).ok())
        .map(|tag| (tag.key, tag.value))
        .collect()
}
