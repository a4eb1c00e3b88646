//! Tags - Key/value tags and the provider-level tag configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix reserved for tags managed by AWS itself
pub const AWS_TAG_PREFIX: &str = "aws:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagsError {
    #[error(
        "tags are identical to those in the default_tags configuration of the provider: please de-duplicate and try again"
    )]
    DuplicateDefaultTags,
}

/// Ordered set of resource tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Tags of `self` overlaid with `other`; `other` wins on conflicts
    pub fn merge(&self, other: &KeyValueTags) -> KeyValueTags {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        KeyValueTags(merged)
    }

    /// Drop tags in the reserved `aws:` namespace
    pub fn ignore_aws(&self) -> KeyValueTags {
        self.filter(|key| !key.starts_with(AWS_TAG_PREFIX))
    }

    /// Drop tags the provider is configured to ignore
    pub fn ignore_config(&self, config: &IgnoreTagsConfig) -> KeyValueTags {
        self.filter(|key| !config.ignores(key))
    }

    fn filter(&self, keep: impl Fn(&str) -> bool) -> KeyValueTags {
        KeyValueTags(
            self.0
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        KeyValueTags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tags applied to every taggable resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultTagsConfig {
    pub tags: KeyValueTags,
}

impl DefaultTagsConfig {
    /// Provider defaults overlaid with the resource's own tags
    pub fn merge_tags(&self, tags: &KeyValueTags) -> KeyValueTags {
        self.tags.merge(tags)
    }

    /// Whether the resource's tags merely repeat the defaults.
    ///
    /// Such tags are indistinguishable from the defaults once read back, so
    /// the host would plan a change forever.
    pub fn tags_equal(&self, tags: &KeyValueTags) -> bool {
        !self.tags.is_empty() && self.tags == *tags
    }

    /// Complete tag set to send for a resource, after defaults and ignores
    pub fn resolve(
        &self,
        tags: &KeyValueTags,
        ignore: &IgnoreTagsConfig,
    ) -> Result<KeyValueTags, TagsError> {
        if self.tags_equal(tags) {
            return Err(TagsError::DuplicateDefaultTags);
        }
        Ok(self.merge_tags(tags).ignore_config(ignore))
    }
}

/// Tags the provider never manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreTagsConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreTagsConfig {
    pub fn ignores(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_merge_prefers_resource_tags() {
        let defaults = DefaultTagsConfig {
            tags: tags(&[("env", "dev"), ("team", "platform")]),
        };
        let merged = defaults.merge_tags(&tags(&[("env", "prod")]));
        assert_eq!(merged, tags(&[("env", "prod"), ("team", "platform")]));
    }

    #[test]
    fn test_tags_equal() {
        let defaults = DefaultTagsConfig {
            tags: tags(&[("env", "dev")]),
        };
        assert!(defaults.tags_equal(&tags(&[("env", "dev")])));
        assert!(!defaults.tags_equal(&tags(&[("env", "prod")])));
        assert!(!DefaultTagsConfig::default().tags_equal(&KeyValueTags::new()));
    }

    #[test]
    fn test_resolve_rejects_duplicated_defaults() {
        let defaults = DefaultTagsConfig {
            tags: tags(&[("env", "dev")]),
        };
        let err = defaults
            .resolve(&tags(&[("env", "dev")]), &IgnoreTagsConfig::default())
            .unwrap_err();
        assert_eq!(err, TagsError::DuplicateDefaultTags);
    }

    #[test]
    fn test_ignore_config() {
        let ignore = IgnoreTagsConfig {
            keys: vec!["CostCenter".to_string()],
            key_prefixes: vec!["kubernetes.io/".to_string()],
        };
        let all = tags(&[
            ("CostCenter", "42"),
            ("kubernetes.io/cluster/main", "owned"),
            ("Name", "web"),
        ]);
        assert_eq!(all.ignore_config(&ignore), tags(&[("Name", "web")]));
    }

    #[test]
    fn test_ignore_aws() {
        let all = tags(&[("aws:cloudformation:stack-name", "s"), ("Name", "web")]);
        assert_eq!(all.ignore_aws(), tags(&[("Name", "web")]));
    }

    #[test]
    fn test_deserialize_transparent() {
        let parsed: KeyValueTags = serde_json::from_str(r#"{"b":"2","a":"1"}"#).unwrap();
        let keys: Vec<_> = parsed.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
