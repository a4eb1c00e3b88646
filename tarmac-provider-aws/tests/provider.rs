use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tarmac_core::config::ProviderConfig;
use tarmac_core::provider::Provider;
use tarmac_core::resource::{Resource, ResourceId};
use tarmac_provider_aws::cloudcontrol::{CloudControlApi, OPERATION_STATUS_SUCCESS, ProgressEvent};
use tarmac_provider_aws::{AwsClient, AwsError, AwsProvider};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Cloud Control stand-in keying EKS add-ons by `ClusterName|AddonName`
#[derive(Default)]
struct InMemoryCloudControl {
    resources: Mutex<HashMap<String, Value>>,
    requests: Mutex<HashMap<String, String>>,
    tokens: AtomicU32,
}

impl InMemoryCloudControl {
    fn submit(&self, identifier: &str) -> ProgressEvent {
        let token = format!("req-{}", self.tokens.fetch_add(1, Ordering::SeqCst));
        self.requests
            .lock()
            .unwrap()
            .insert(token.clone(), identifier.to_string());
        ProgressEvent {
            identifier: Some(identifier.to_string()),
            request_token: Some(token),
            operation_status: "IN_PROGRESS".to_string(),
            ..ProgressEvent::default()
        }
    }
}

#[async_trait]
impl CloudControlApi for InMemoryCloudControl {
    async fn get_resource(
        &self,
        _type_name: &str,
        identifier: &str,
    ) -> Result<Option<Value>, AwsError> {
        Ok(self.resources.lock().unwrap().get(identifier).cloned())
    }

    async fn create_resource(
        &self,
        _type_name: &str,
        desired_state: &Value,
    ) -> Result<ProgressEvent, AwsError> {
        let identifier = format!(
            "{}|{}",
            desired_state["ClusterName"].as_str().unwrap(),
            desired_state["AddonName"].as_str().unwrap()
        );
        self.resources
            .lock()
            .unwrap()
            .insert(identifier.clone(), desired_state.clone());
        Ok(self.submit(&identifier))
    }

    async fn update_resource(
        &self,
        _type_name: &str,
        identifier: &str,
        patch_document: &str,
    ) -> Result<ProgressEvent, AwsError> {
        let ops: Vec<Value> = serde_json::from_str(patch_document).unwrap();
        let mut resources = self.resources.lock().unwrap();
        let props = resources.get_mut(identifier).unwrap().as_object_mut().unwrap();
        for op in ops {
            let key = op["path"].as_str().unwrap().trim_start_matches('/').to_string();
            match op["op"].as_str().unwrap() {
                "remove" => {
                    props.remove(&key);
                }
                _ => {
                    props.insert(key, op["value"].clone());
                }
            }
        }
        drop(resources);
        Ok(self.submit(identifier))
    }

    async fn delete_resource(
        &self,
        _type_name: &str,
        identifier: &str,
    ) -> Result<ProgressEvent, AwsError> {
        self.resources.lock().unwrap().remove(identifier);
        Ok(self.submit(identifier))
    }

    async fn get_resource_request_status(
        &self,
        request_token: &str,
    ) -> Result<ProgressEvent, AwsError> {
        let identifier = self.requests.lock().unwrap().get(request_token).cloned();
        Ok(ProgressEvent {
            identifier,
            request_token: Some(request_token.to_string()),
            operation_status: OPERATION_STATUS_SUCCESS.to_string(),
            ..ProgressEvent::default()
        })
    }
}

fn provider() -> Box<dyn Provider> {
    let config = ProviderConfig::from_json(
        r#"{"region": "aws.Region.eu_west_1", "default_tags": {"tags": {"team": "platform"}}}"#,
    )
    .unwrap();
    let client = AwsClient::with_cloudcontrol(Arc::new(InMemoryCloudControl::default()), &config);
    Box::new(AwsProvider::with_client(client, &config).unwrap())
}

fn addon() -> Resource {
    Resource::new("eks_addon", "cni")
        .with_attribute("cluster_name", "prod")
        .with_attribute("addon_name", "vpc-cni")
        .with_attribute("addon_version", "v1.18.0")
        .with_tag("Name", "cni")
}

#[tokio::test(start_paused = true)]
async fn test_addon_lifecycle() {
    init_logger();
    let provider = provider();
    let resource = addon();

    let created = provider.create(&resource).await.unwrap();
    assert!(created.exists);
    assert_eq!(created.identifier.as_deref(), Some("prod:vpc-cni"));
    assert_eq!(created.attributes["addon_version"], json!("v1.18.0"));
    assert_eq!(created.tags.get("team"), Some("platform"));
    assert_eq!(created.tags.get("Name"), Some("cni"));

    let to = resource.clone().with_attribute("addon_version", "v1.19.0");
    let updated = provider
        .update(&resource.id, "prod:vpc-cni", &created, &to)
        .await
        .unwrap();
    assert_eq!(updated.attributes["addon_version"], json!("v1.19.0"));

    provider.delete(&resource.id, "prod:vpc-cni").await.unwrap();

    let gone = provider.read(&resource.id, "prod:vpc-cni").await.unwrap();
    assert!(!gone.exists);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_identifier() {
    let provider = provider();
    let id = ResourceId::new("eks_addon", "cni");

    let err = provider.read(&id, "prod/vpc-cni").await.unwrap_err();

    assert_eq!(
        err.message,
        "unexpected format for ID (prod/vpc-cni), expected cluster-name:addon-name"
    );
    assert_eq!(err.resource_id, Some(id));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_resource_type() {
    let provider = provider();
    let id = ResourceId::new("amplify_branch", "main");

    let err = provider.read(&id, "app/main").await.unwrap_err();

    assert!(err.message.contains("Unknown resource type: amplify_branch"));
}

#[test]
fn test_resource_types() {
    let provider = provider();
    assert_eq!(provider.name(), "aws");

    let names: Vec<_> = provider.resource_types().iter().map(|r| r.name()).collect();
    assert!(names.contains(&"eks_addon"));
    assert!(names.contains(&"sagemaker_feature_group"));
    assert!(names.contains(&"kms_key"));
}
