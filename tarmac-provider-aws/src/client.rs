//! Typed client context shared by every resource handler

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use tarmac_core::config::ProviderConfig;
use tarmac_core::tags::{DefaultTagsConfig, IgnoreTagsConfig, KeyValueTags, TagsError};

use crate::cloudcontrol::CloudControlApi;

/// Everything a handler needs to talk to AWS
#[derive(Clone)]
pub struct AwsClient {
    cloudcontrol: Arc<dyn CloudControlApi>,
    region: String,
    partition: &'static str,
    dns_suffix: &'static str,
    account_id: Option<String>,
    default_tags: DefaultTagsConfig,
    ignore_tags: IgnoreTagsConfig,
}

impl AwsClient {
    /// Load credentials from the environment and build the SDK clients
    pub async fn new(config: &ProviderConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        Self::with_cloudcontrol(Arc::new(CloudControlClient::new(&sdk_config)), config)
    }

    /// Build the context around an existing Cloud Control implementation
    pub fn with_cloudcontrol(
        cloudcontrol: Arc<dyn CloudControlApi>,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            cloudcontrol,
            region: config.region.clone(),
            partition: config.partition(),
            dns_suffix: config.dns_suffix(),
            account_id: config.account_id.clone(),
            default_tags: config.default_tags.clone(),
            ignore_tags: config.ignore_tags.clone(),
        }
    }

    pub fn cloudcontrol(&self) -> &dyn CloudControlApi {
        self.cloudcontrol.as_ref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn partition(&self) -> &'static str {
        self.partition
    }

    pub fn dns_suffix(&self) -> &'static str {
        self.dns_suffix
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn default_tags_config(&self) -> &DefaultTagsConfig {
        &self.default_tags
    }

    pub fn ignore_tags_config(&self) -> &IgnoreTagsConfig {
        &self.ignore_tags
    }

    /// Tags to send for a resource: provider defaults, then the resource's own
    pub fn resolve_tags(&self, tags: &KeyValueTags) -> Result<KeyValueTags, TagsError> {
        self.default_tags.resolve(tags, &self.ignore_tags)
    }

    /// Tags read back from AWS, without system and ignored tags
    pub fn filter_remote_tags(&self, tags: &KeyValueTags) -> KeyValueTags {
        tags.ignore_aws().ignore_config(&self.ignore_tags)
    }

    /// ARN of a resource in the configured region and account
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition,
            service,
            self.region,
            self.account_id.as_deref().unwrap_or_default(),
            resource
        )
    }

    /// Regional endpoint host name of a service
    pub fn regional_hostname(&self, prefix: &str) -> String {
        format!("{}.{}.{}", prefix, self.region, self.dns_suffix)
    }
}
