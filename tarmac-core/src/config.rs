//! Provider configuration

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tags::{DefaultTagsConfig, IgnoreTagsConfig};

static REGION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").ok());

static ACCOUNT_ID_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{12}$").ok());

fn pattern_matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse provider configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("region must be set")]
    MissingRegion,

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid account ID: {0}")]
    InvalidAccountId(String),
}

/// Settings shared by every resource handled by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// AWS region; DSL forms such as `aws.Region.ap_northeast_1` are accepted
    pub region: String,
    pub profile: Option<String>,
    /// Expected account; resolved from credentials when unset
    pub account_id: Option<String>,
    pub default_tags: DefaultTagsConfig,
    pub ignore_tags: IgnoreTagsConfig,
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: normalize_region(&region.into()),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration block
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: ProviderConfig = serde_json::from_str(json)?;
        config.region = normalize_region(&config.region);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        if !pattern_matches(&REGION_PATTERN, &self.region) {
            return Err(ConfigError::InvalidRegion(self.region.clone()));
        }
        if let Some(account_id) = &self.account_id
            && !pattern_matches(&ACCOUNT_ID_PATTERN, account_id)
        {
            return Err(ConfigError::InvalidAccountId(account_id.clone()));
        }
        Ok(())
    }

    /// AWS partition the region belongs to
    pub fn partition(&self) -> &'static str {
        partition_for_region(&self.region)
    }

    pub fn dns_suffix(&self) -> &'static str {
        match self.partition() {
            "aws-cn" => "amazonaws.com.cn",
            "aws-iso" => "c2s.ic.gov",
            "aws-iso-b" => "sc2s.sgov.gov",
            _ => "amazonaws.com",
        }
    }
}

/// Normalize region value (e.g., "aws.Region.ap_northeast_1" -> "ap-northeast-1")
pub fn normalize_region(s: &str) -> String {
    let region_part = if s.contains('.') {
        s.split('.').next_back().unwrap_or(s)
    } else {
        s
    };
    region_part.replace('_', "-")
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}
