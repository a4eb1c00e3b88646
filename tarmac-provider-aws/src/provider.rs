//! AWS Provider implementation
//!
//! Generic CRUD over AWS Cloud Control for every resource type the service
//! packages register.

use std::time::Duration;

use tarmac_core::config::ProviderConfig;
use tarmac_core::provider::{ProviderError, ProviderResult, ResourceType};
use tarmac_core::registry::Registry;
use tarmac_core::resource::{Resource, ResourceId, State};
use tarmac_core::tags::KeyValueTags;

use crate::client::AwsClient;
use crate::cloudcontrol;
use crate::resources::{CloudControlResource, parse_tags};
use crate::services;

/// Budget for a single read, throttling retries included
const READ_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// AWS Provider backed by Cloud Control
pub struct AwsProvider {
    client: AwsClient,
    registry: Registry,
}

impl AwsProvider {
    /// Create a new AWS Provider from the host's provider configuration
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| {
                ProviderError::new(format!("Invalid provider configuration: {}", e)).with_cause(e)
            })?;
        let client = AwsClient::new(config).await;
        Self::with_client(client, config)
    }

    /// Create a provider around an existing client context
    pub fn with_client(client: AwsClient, config: &ProviderConfig) -> ProviderResult<Self> {
        let registry = services::new_registry(config)?;
        Ok(Self::with_registry(client, registry))
    }

    /// Create a provider serving the resource types of a closed `registry`
    pub fn with_registry(client: AwsClient, registry: Registry) -> Self {
        Self { client, registry }
    }

    pub fn client(&self) -> &AwsClient {
        &self.client
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Cloud Control definition registered under the resource's type
    fn resource_config(&self, id: &ResourceId) -> ProviderResult<&CloudControlResource> {
        self.registry
            .resource_type(&id.resource_type)
            .and_then(|r| r.as_any().downcast_ref::<CloudControlResource>())
            .ok_or_else(|| {
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    fn resolve_tags(
        &self,
        config: &CloudControlResource,
        resource: &Resource,
    ) -> ProviderResult<KeyValueTags> {
        if !config.has_tags {
            return Ok(KeyValueTags::new());
        }
        self.client.resolve_tags(&resource.tags).map_err(|e| {
            ProviderError::new(e.to_string())
                .with_cause(e)
                .for_resource(resource.id.clone())
        })
    }

    /// Read a resource by its persisted identifier
    pub async fn read_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let config = self.resource_config(id)?;
        let remote_id = config
            .remote_identifier(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        let props = cloudcontrol::get_resource(
            self.client.cloudcontrol(),
            config.type_name,
            &remote_id,
            READ_TIMEOUT,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        let Some(props) = props else {
            log::warn!("{} ({}) not found, removing from state", id, identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut state =
            State::existing(id.clone(), config.attributes_from(&props)).with_identifier(identifier);
        if config.has_tags
            && let Some(tags_array) = props.get("Tags").and_then(|v| v.as_array())
        {
            state = state.with_tags(self.client.filter_remote_tags(&parse_tags(tags_array)));
        }
        Ok(state)
    }

    /// Create a resource and read it back
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let config = self.resource_config(&resource.id)?;

        let missing = config.missing_required(&resource.attributes);
        if !missing.is_empty() {
            return Err(ProviderError::new(format!(
                "Missing required attributes: {}",
                missing.join(", ")
            ))
            .for_resource(resource.id.clone()));
        }

        let tags = self.resolve_tags(config, resource)?;
        let desired_state = config.desired_state(&resource.attributes, &tags);

        let remote_id = cloudcontrol::create_resource(
            self.client.cloudcontrol(),
            config.type_name,
            &desired_state,
            config.timeouts.create,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))?;

        let identifier = config
            .state_identifier(&remote_id)
            .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))?;
        log::debug!("created {} ({})", resource.id, identifier);

        let state = self.read_resource(&resource.id, &identifier).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Error reading {} ({}): empty output after creation",
                resource.id, identifier
            ))
            .for_resource(resource.id.clone()));
        }
        Ok(state)
    }

    /// Update a resource in place and read it back
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let config = self.resource_config(id)?;
        let remote_id = config
            .remote_identifier(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        let tags = self.resolve_tags(config, to)?;
        let patch_ops = config.patch_ops(&from.attributes, &to.attributes, &from.tags, &tags);

        cloudcontrol::update_resource(
            self.client.cloudcontrol(),
            config.type_name,
            &remote_id,
            &patch_ops,
            config.timeouts.update,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        self.read_resource(id, identifier).await
    }

    /// Delete a resource and wait until Cloud Control reports it gone
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let config = self.resource_config(id)?;
        let remote_id = config
            .remote_identifier(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        cloudcontrol::delete_resource(
            self.client.cloudcontrol(),
            config.type_name,
            &remote_id,
            config.timeouts.delete,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::cloudcontrol::tests::FakeCloudControl;

    fn provider(fake: FakeCloudControl) -> (Arc<FakeCloudControl>, AwsProvider) {
        let fake = Arc::new(FakeCloudControl {
            identifier_property: Some("FeatureGroupName"),
            ..fake
        });
        let mut config = ProviderConfig::new("us-west-2");
        config.default_tags.tags.insert("owner", "infra");
        let client = AwsClient::with_cloudcontrol(fake.clone(), &config);
        (fake, AwsProvider::with_client(client, &config).unwrap())
    }

    fn feature_group() -> Resource {
        Resource::new("sagemaker_feature_group", "orders")
            .with_attribute("feature_group_name", "orders")
            .with_attribute("record_identifier_feature_name", "order_id")
            .with_attribute("event_time_feature_name", "ts")
            .with_tag("env", "prod")
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_sends_tags_and_reads_back() {
        let (fake, provider) = provider(FakeCloudControl::default());

        let state = provider.create_resource(&feature_group()).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("orders"));
        assert_eq!(state.attributes["record_identifier_feature_name"], json!("order_id"));
        assert_eq!(state.tags.get("owner"), Some("infra"));
        assert_eq!(state.tags.get("env"), Some("prod"));

        let stored = fake.resources.lock().unwrap()["orders"].clone();
        assert_eq!(stored["FeatureGroupName"], json!("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_missing_required() {
        let (fake, provider) = provider(FakeCloudControl::default());
        let resource = Resource::new("sagemaker_feature_group", "orders");

        let err = provider.create_resource(&resource).await.unwrap_err();

        assert!(err.message.starts_with("Missing required attributes"));
        assert_eq!(err.resource_id, Some(resource.id));
        assert_eq!(fake.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_resource() {
        let (_fake, provider) = provider(FakeCloudControl::default());
        let id = ResourceId::new("ec2_carrier_gateway", "cagw");

        let state = provider.read_resource(&id, "cagw-0123").await.unwrap();

        assert!(!state.exists);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_maps_composite_identifier() {
        let fake = FakeCloudControl::default()
            .with_resource("main|vpc-cni", json!({"ClusterName": "main", "AddonName": "vpc-cni"}));
        let (_fake, provider) = provider(fake);
        let id = ResourceId::new("eks_addon", "cni");

        let state = provider.read_resource(&id, "main:vpc-cni").await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("main:vpc-cni"));
        assert_eq!(state.attributes["addon_name"], json!("vpc-cni"));

        let err = provider.read_resource(&id, "main").await.unwrap_err();
        assert!(err.message.contains("expected cluster-name:addon-name"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_patches_changes_only() {
        let (fake, provider) = provider(FakeCloudControl::default());
        let created = provider.create_resource(&feature_group()).await.unwrap();

        let to = feature_group().with_attribute("description", "order events");
        provider
            .update_resource(&created.id, "orders", &created, &to)
            .await
            .unwrap();

        let patches = fake.patches.lock().unwrap().clone();
        assert_eq!(
            patches,
            vec![
                json!([{"op": "replace", "path": "/Description", "value": "order events"}])
                    .to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_rejects_tags_equal_to_defaults() {
        let (_fake, provider) = provider(FakeCloudControl::default());
        let created = provider.create_resource(&feature_group()).await.unwrap();

        let to = Resource::new("sagemaker_feature_group", "orders").with_tag("owner", "infra");
        let err = provider
            .update_resource(&created.id, "orders", &created, &to)
            .await
            .unwrap_err();

        assert!(err.message.contains("default_tags"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_registered_types_only() {
        let fake = Arc::new(FakeCloudControl::default().with_resource(
            "main|vpc-cni",
            json!({"ClusterName": "main", "AddonName": "vpc-cni"}),
        ));
        let config = ProviderConfig::new("us-west-2");
        let mut registry = Registry::new();
        registry
            .register(Box::new(services::CloudControlPackage {
                name: "eks",
                categories: &[],
                resources: services::eks::RESOURCES,
            }))
            .unwrap();
        registry.close().unwrap();
        let provider =
            AwsProvider::with_registry(AwsClient::with_cloudcontrol(fake, &config), registry);

        let addon = ResourceId::new("eks_addon", "cni");
        assert!(provider.read_resource(&addon, "main:vpc-cni").await.unwrap().exists);

        let group = ResourceId::new("sagemaker_feature_group", "orders");
        let err = provider.read_resource(&group, "orders").await.unwrap_err();
        assert_eq!(err.message, "Unknown resource type: sagemaker_feature_group");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unknown_type() {
        let (_fake, provider) = provider(FakeCloudControl::default());
        let id = ResourceId::new("s3_bucket", "logs");

        let err = provider.delete_resource(&id, "logs").await.unwrap_err();

        assert_eq!(err.message, "Unknown resource type: s3_bucket");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_then_read() {
        let (_fake, provider) = provider(FakeCloudControl::default());
        let created = provider.create_resource(&feature_group()).await.unwrap();

        provider.delete_resource(&created.id, "orders").await.unwrap();

        assert!(!provider.read_resource(&created.id, "orders").await.unwrap().exists);
    }
}
