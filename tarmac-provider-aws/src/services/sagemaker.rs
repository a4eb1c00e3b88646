//! SageMaker - Feature groups

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::provider::BoxFuture;
use tarmac_core::waiter::{RefreshResult, StateChangeConf, StateChangeError};

use crate::errs::AwsError;
use crate::resources::CloudControlResource;

pub const FEATURE_GROUP_STATUS_CREATING: &str = "Creating";
pub const FEATURE_GROUP_STATUS_CREATED: &str = "Created";
pub const FEATURE_GROUP_STATUS_CREATE_FAILED: &str = "CreateFailed";
pub const FEATURE_GROUP_STATUS_DELETING: &str = "Deleting";
pub const FEATURE_GROUP_STATUS_DELETE_FAILED: &str = "DeleteFailed";

pub const FEATURE_GROUP_CREATED_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const FEATURE_GROUP_DELETED_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroup {
    pub feature_group_name: String,
    pub feature_group_status: String,
    pub failure_reason: Option<String>,
}

#[async_trait]
pub trait SageMakerApi: Send + Sync {
    async fn find_feature_group(&self, name: &str) -> Result<Option<FeatureGroup>, AwsError>;
}

pub const RESOURCES: &[CloudControlResource] = &[CloudControlResource::new(
    "sagemaker_feature_group",
    "AWS::SageMaker::FeatureGroup",
    &[
        ("feature_group_name", "FeatureGroupName", true),
        ("record_identifier_feature_name", "RecordIdentifierFeatureName", true),
        ("event_time_feature_name", "EventTimeFeatureName", true),
        ("feature_definitions", "FeatureDefinitions", false),
        ("description", "Description", false),
        ("role_arn", "RoleArn", false),
        ("online_store_config", "OnlineStoreConfig", false),
        ("offline_store_config", "OfflineStoreConfig", false),
    ],
)
.with_tags()
.with_timeouts(
    FEATURE_GROUP_CREATED_TIMEOUT,
    FEATURE_GROUP_CREATED_TIMEOUT,
    FEATURE_GROUP_DELETED_TIMEOUT,
)];

async fn find_feature_group_status<C>(conn: &C, name: &str) -> RefreshResult<FeatureGroup>
where
    C: SageMakerApi + ?Sized,
{
    let group = conn.find_feature_group(name).await?;
    Ok(group.map(|g| {
        let status = g.feature_group_status.clone();
        (g, status)
    }))
}

pub fn status_feature_group<'a, C>(
    conn: &'a C,
    name: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<FeatureGroup>> + 'a
where
    C: SageMakerApi + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<FeatureGroup>> {
        Box::pin(find_feature_group_status(conn, name))
    }
}

/// Attach the feature group's failure reason when it ended in `failed_status`
fn with_failure_reason(err: StateChangeError<FeatureGroup>, failed_status: &str) -> AwsError {
    let (mut error, last) = err.into_parts();
    if let Some(group) = last
        && group.feature_group_status == failed_status
        && let Some(reason) = group.failure_reason.filter(|r| !r.is_empty())
    {
        error.set_last_error(reason);
    }
    error.into()
}

pub async fn wait_feature_group_created<C>(
    conn: &C,
    name: &str,
) -> Result<Option<FeatureGroup>, AwsError>
where
    C: SageMakerApi + ?Sized,
{
    StateChangeConf::new(status_feature_group(conn, name))
        .pending([FEATURE_GROUP_STATUS_CREATING])
        .target([FEATURE_GROUP_STATUS_CREATED])
        .timeout(FEATURE_GROUP_CREATED_TIMEOUT)
        .wait_for_state()
        .await
        .map_err(|e| with_failure_reason(e, FEATURE_GROUP_STATUS_CREATE_FAILED))
}

pub async fn wait_feature_group_deleted<C>(conn: &C, name: &str) -> Result<(), AwsError>
where
    C: SageMakerApi + ?Sized,
{
    StateChangeConf::new(status_feature_group(conn, name))
        .pending([FEATURE_GROUP_STATUS_DELETING])
        .target(Vec::<String>::new())
        .timeout(FEATURE_GROUP_DELETED_TIMEOUT)
        .wait_for_state()
        .await
        .map_err(|e| with_failure_reason(e, FEATURE_GROUP_STATUS_DELETE_FAILED))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeSageMaker {
        statuses: Mutex<VecDeque<Option<(&'static str, Option<&'static str>)>>>,
    }

    impl FakeSageMaker {
        fn new(statuses: &[Option<(&'static str, Option<&'static str>)>]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl SageMakerApi for FakeSageMaker {
        async fn find_feature_group(&self, name: &str) -> Result<Option<FeatureGroup>, AwsError> {
            let mut statuses = self.statuses.lock().unwrap();
            let next = if statuses.len() > 1 {
                statuses.pop_front().flatten()
            } else {
                statuses.front().copied().flatten()
            };
            Ok(next.map(|(status, reason)| FeatureGroup {
                feature_group_name: name.to_string(),
                feature_group_status: status.to_string(),
                failure_reason: reason.map(str::to_string),
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_created() {
        let conn = FakeSageMaker::new(&[Some(("Creating", None)), Some(("Created", None))]);

        let group = wait_feature_group_created(&conn, "orders").await.unwrap().unwrap();

        assert_eq!(group.feature_group_status, "Created");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failed_carries_failure_reason() {
        let conn = FakeSageMaker::new(&[
            Some(("Creating", None)),
            Some(("CreateFailed", Some("Offline store bucket does not exist"))),
        ]);

        let err = wait_feature_group_created(&conn, "orders").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "unexpected state 'CreateFailed', wanted target 'Created': Offline store bucket does not exist"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failed_without_reason() {
        let conn = FakeSageMaker::new(&[Some(("CreateFailed", Some("")))]);

        let err = wait_feature_group_created(&conn, "orders").await.unwrap_err();

        assert_eq!(err.to_string(), "unexpected state 'CreateFailed', wanted target 'Created'");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted() {
        let conn = FakeSageMaker::new(&[Some(("Deleting", None)), Some(("Deleting", None)), None]);

        wait_feature_group_deleted(&conn, "orders").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failed_carries_failure_reason() {
        let conn = FakeSageMaker::new(&[Some(("DeleteFailed", Some("Online store in use")))]);

        let err = wait_feature_group_deleted(&conn, "orders").await.unwrap_err();

        assert!(err.to_string().ends_with(": Online store in use"));
    }
}
