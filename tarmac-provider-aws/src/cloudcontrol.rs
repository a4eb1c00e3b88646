//! AWS Cloud Control API
//!
//! Generic create/read/update/delete of any resource type Cloud Control
//! supports. Mutations are retried on throttling and concurrent operation
//! errors, then the returned request is polled until it settles.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::types;
use tarmac_core::provider::BoxFuture;
use tarmac_core::retry::retry_when;
use tarmac_core::waiter::{RefreshResult, StateChangeConf, StateChangeError};
use tokio::time::Instant;

use crate::errs::{AwsError, ERR_CODE_CONCURRENT_OPERATION, ERR_CODE_THROTTLING};

pub const OPERATION_STATUS_PENDING: &str = "PENDING";
pub const OPERATION_STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const OPERATION_STATUS_SUCCESS: &str = "SUCCESS";
pub const OPERATION_STATUS_FAILED: &str = "FAILED";
pub const OPERATION_STATUS_CANCEL_IN_PROGRESS: &str = "CANCEL_IN_PROGRESS";
pub const OPERATION_STATUS_CANCEL_COMPLETE: &str = "CANCEL_COMPLETE";

pub const HANDLER_ERROR_CODE_NOT_FOUND: &str = "NotFound";

/// Spacing between two request status polls
const REQUEST_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Progress of a Cloud Control resource request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressEvent {
    pub type_name: Option<String>,
    pub identifier: Option<String>,
    pub request_token: Option<String>,
    pub operation: Option<String>,
    pub operation_status: String,
    pub status_message: Option<String>,
    pub error_code: Option<String>,
}

impl ProgressEvent {
    /// Remote failure reason, e.g. `AlreadyExists: Bucket exists`
    pub fn failure_reason(&self) -> Option<String> {
        match (&self.error_code, &self.status_message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (Some(code), None) => Some(code.clone()),
            (None, Some(message)) => Some(message.clone()),
            (None, None) => None,
        }
    }
}

impl From<&types::ProgressEvent> for ProgressEvent {
    fn from(event: &types::ProgressEvent) -> Self {
        Self {
            type_name: event.type_name().map(str::to_string),
            identifier: event.identifier().map(str::to_string),
            request_token: event.request_token().map(str::to_string),
            operation: event.operation().map(|o| o.as_str().to_string()),
            operation_status: event
                .operation_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_message: event.status_message().map(str::to_string),
            error_code: event.error_code().map(|c| c.as_str().to_string()),
        }
    }
}

/// The subset of the Cloud Control API used by the provider
#[async_trait]
pub trait CloudControlApi: Send + Sync {
    /// Current properties of a resource, `None` if it does not exist
    async fn get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> Result<Option<serde_json::Value>, AwsError>;

    async fn create_resource(
        &self,
        type_name: &str,
        desired_state: &serde_json::Value,
    ) -> Result<ProgressEvent, AwsError>;

    async fn update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch_document: &str,
    ) -> Result<ProgressEvent, AwsError>;

    async fn delete_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> Result<ProgressEvent, AwsError>;

    async fn get_resource_request_status(
        &self,
        request_token: &str,
    ) -> Result<ProgressEvent, AwsError>;
}

fn progress_event(event: Option<&types::ProgressEvent>) -> Result<ProgressEvent, AwsError> {
    event
        .map(ProgressEvent::from)
        .ok_or_else(|| AwsError::Response("no progress event returned".to_string()))
}

#[async_trait]
impl CloudControlApi for CloudControlClient {
    async fn get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> Result<Option<serde_json::Value>, AwsError> {
        let result = self
            .get_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let err = AwsError::from_sdk(e);
                if err.is_not_found() {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        match output.resource_description().and_then(|d| d.properties()) {
            Some(properties) => serde_json::from_str(properties)
                .map(Some)
                .map_err(|e| AwsError::Response(format!("invalid resource properties: {}", e))),
            None => Ok(None),
        }
    }

    async fn create_resource(
        &self,
        type_name: &str,
        desired_state: &serde_json::Value,
    ) -> Result<ProgressEvent, AwsError> {
        let output = self
            .create_resource()
            .type_name(type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        progress_event(output.progress_event())
    }

    async fn update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch_document: &str,
    ) -> Result<ProgressEvent, AwsError> {
        let output = self
            .update_resource()
            .type_name(type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        progress_event(output.progress_event())
    }

    async fn delete_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> Result<ProgressEvent, AwsError> {
        let output = self
            .delete_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        progress_event(output.progress_event())
    }

    async fn get_resource_request_status(
        &self,
        request_token: &str,
    ) -> Result<ProgressEvent, AwsError> {
        let output = self
            .get_resource_request_status()
            .request_token(request_token)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        progress_event(output.progress_event())
    }
}

// =============================================================================
// Request status
// =============================================================================

async fn find_request_status<C>(conn: &C, request_token: &str) -> RefreshResult<ProgressEvent>
where
    C: CloudControlApi + ?Sized,
{
    let event = conn.get_resource_request_status(request_token).await?;
    let status = event.operation_status.clone();
    Ok(Some((event, status)))
}

/// Refresh function reporting the operation status of a resource request
pub fn status_resource_request<'a, C>(
    conn: &'a C,
    request_token: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<ProgressEvent>> + 'a
where
    C: CloudControlApi + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<ProgressEvent>> {
        Box::pin(find_request_status(conn, request_token))
    }
}

async fn wait_for_request<C>(
    conn: &C,
    request_token: &str,
    timeout: Duration,
) -> Result<ProgressEvent, StateChangeError<ProgressEvent>>
where
    C: CloudControlApi + ?Sized,
{
    let event = StateChangeConf::new(status_resource_request(conn, request_token))
        .pending([
            OPERATION_STATUS_PENDING,
            OPERATION_STATUS_IN_PROGRESS,
            OPERATION_STATUS_CANCEL_IN_PROGRESS,
        ])
        .target([OPERATION_STATUS_SUCCESS])
        .timeout(timeout)
        .poll_interval(REQUEST_POLL_INTERVAL)
        .wait_for_state()
        .await?;

    // Request status lookups never report absence
    Ok(event.unwrap_or_default())
}

fn enrich(err: StateChangeError<ProgressEvent>) -> AwsError {
    let (mut error, last) = err.into_parts();
    if let Some(reason) = last.as_ref().and_then(ProgressEvent::failure_reason) {
        error.set_last_error(reason);
    }
    error.into()
}

/// Wait for a Cloud Control request to succeed
pub async fn wait_for_operation<C>(
    conn: &C,
    request_token: &str,
    timeout: Duration,
) -> Result<ProgressEvent, AwsError>
where
    C: CloudControlApi + ?Sized,
{
    wait_for_request(conn, request_token, timeout)
        .await
        .map_err(enrich)
}

fn request_token(event: &ProgressEvent) -> Result<&str, AwsError> {
    event
        .request_token
        .as_deref()
        .ok_or_else(|| AwsError::Response("no request token returned".to_string()))
}

/// What is left of `timeout` for the request status wait
fn remaining(started: Instant, timeout: Duration) -> Duration {
    timeout.saturating_sub(started.elapsed())
}

/// Errors worth another attempt of the same mutation
pub fn is_retryable(err: &AwsError) -> bool {
    err.is_code(ERR_CODE_THROTTLING) || err.is_code(ERR_CODE_CONCURRENT_OPERATION)
}

// =============================================================================
// Resource operations
// =============================================================================

pub async fn get_resource<C>(
    conn: &C,
    type_name: &str,
    identifier: &str,
    timeout: Duration,
) -> Result<Option<serde_json::Value>, AwsError>
where
    C: CloudControlApi + ?Sized,
{
    retry_when(timeout, || conn.get_resource(type_name, identifier), is_retryable).await
}

/// Create a resource and return its Cloud Control identifier
pub async fn create_resource<C>(
    conn: &C,
    type_name: &str,
    desired_state: &serde_json::Value,
    timeout: Duration,
) -> Result<String, AwsError>
where
    C: CloudControlApi + ?Sized,
{
    log::debug!("creating {}", type_name);
    let started = Instant::now();
    let event = retry_when(
        timeout,
        || conn.create_resource(type_name, desired_state),
        is_retryable,
    )
    .await?;

    let done = wait_for_operation(conn, request_token(&event)?, remaining(started, timeout)).await?;
    done.identifier
        .or(event.identifier)
        .ok_or_else(|| AwsError::Response(format!("no identifier returned for {}", type_name)))
}

/// Apply JSON patch operations to a resource
pub async fn update_resource<C>(
    conn: &C,
    type_name: &str,
    identifier: &str,
    patch_ops: &[serde_json::Value],
    timeout: Duration,
) -> Result<(), AwsError>
where
    C: CloudControlApi + ?Sized,
{
    if patch_ops.is_empty() {
        return Ok(());
    }

    let patch_document = serde_json::Value::Array(patch_ops.to_vec()).to_string();
    log::debug!("updating {} {}", type_name, identifier);
    let started = Instant::now();
    let event = retry_when(
        timeout,
        || conn.update_resource(type_name, identifier, &patch_document),
        is_retryable,
    )
    .await?;

    wait_for_operation(conn, request_token(&event)?, remaining(started, timeout)).await?;
    Ok(())
}

/// Delete a resource; a resource that is already gone counts as deleted
pub async fn delete_resource<C>(
    conn: &C,
    type_name: &str,
    identifier: &str,
    timeout: Duration,
) -> Result<(), AwsError>
where
    C: CloudControlApi + ?Sized,
{
    log::debug!("deleting {} {}", type_name, identifier);
    let started = Instant::now();
    let result = retry_when(
        timeout,
        || conn.delete_resource(type_name, identifier),
        is_retryable,
    )
    .await;

    let event = match result {
        Ok(event) => event,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err),
    };

    match wait_for_request(conn, request_token(&event)?, remaining(started, timeout)).await {
        Ok(_) => Ok(()),
        Err(err)
            if err.last.as_ref().and_then(|e| e.error_code.as_deref())
                == Some(HANDLER_ERROR_CODE_NOT_FOUND) =>
        {
            log::warn!("{} {} was already deleted", type_name, identifier);
            Ok(())
        }
        Err(err) => Err(enrich(err)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::errs::ERR_CODE_RESOURCE_NOT_FOUND;

    pub(crate) struct FakeRequest {
        event: ProgressEvent,
        polls: u32,
    }

    /// In-memory Cloud Control.
    ///
    /// Every request reports `IN_PROGRESS` for `pending_polls` polls, then
    /// `SUCCESS`, or `FAILED` when `failure` is set. Created resources are
    /// keyed by `identifier_property`, `Name` unless set.
    #[derive(Default)]
    pub struct FakeCloudControl {
        pub resources: Mutex<HashMap<String, serde_json::Value>>,
        pub mutation_errors: Mutex<VecDeque<AwsError>>,
        pub identifier_property: Option<&'static str>,
        pub pending_polls: u32,
        pub failure: Option<(String, String)>,
        pub mutations: AtomicU32,
        pub patches: Mutex<Vec<String>>,
        pub(crate) requests: Mutex<HashMap<String, FakeRequest>>,
    }

    impl FakeCloudControl {
        pub fn with_resource(self, identifier: &str, properties: serde_json::Value) -> Self {
            if let Ok(mut resources) = self.resources.lock() {
                resources.insert(identifier.to_string(), properties);
            }
            self
        }

        pub fn mutation_count(&self) -> u32 {
            self.mutations.load(Ordering::SeqCst)
        }

        fn start(
            &self,
            operation: &str,
            type_name: &str,
            identifier: &str,
        ) -> Result<ProgressEvent, AwsError> {
            let n = self.mutations.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.mutation_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            let token = format!("token-{}", n);
            let event = ProgressEvent {
                type_name: Some(type_name.to_string()),
                identifier: Some(identifier.to_string()),
                request_token: Some(token.clone()),
                operation: Some(operation.to_string()),
                operation_status: OPERATION_STATUS_PENDING.to_string(),
                ..ProgressEvent::default()
            };
            self.requests.lock().unwrap().insert(
                token,
                FakeRequest {
                    event: event.clone(),
                    polls: 0,
                },
            );
            Ok(event)
        }
    }

    #[async_trait]
    impl CloudControlApi for FakeCloudControl {
        async fn get_resource(
            &self,
            _type_name: &str,
            identifier: &str,
        ) -> Result<Option<serde_json::Value>, AwsError> {
            Ok(self.resources.lock().unwrap().get(identifier).cloned())
        }

        async fn create_resource(
            &self,
            type_name: &str,
            desired_state: &serde_json::Value,
        ) -> Result<ProgressEvent, AwsError> {
            let property = self.identifier_property.unwrap_or("Name");
            let identifier = desired_state[property].as_str().unwrap_or("generated").to_string();
            let event = self.start("CREATE", type_name, &identifier)?;
            self.resources
                .lock()
                .unwrap()
                .insert(identifier, desired_state.clone());
            Ok(event)
        }

        async fn update_resource(
            &self,
            type_name: &str,
            identifier: &str,
            patch_document: &str,
        ) -> Result<ProgressEvent, AwsError> {
            let event = self.start("UPDATE", type_name, identifier)?;
            self.patches.lock().unwrap().push(patch_document.to_string());
            Ok(event)
        }

        async fn delete_resource(
            &self,
            type_name: &str,
            identifier: &str,
        ) -> Result<ProgressEvent, AwsError> {
            if self.resources.lock().unwrap().remove(identifier).is_none() {
                return Err(AwsError::api(ERR_CODE_RESOURCE_NOT_FOUND, "resource not found"));
            }
            self.start("DELETE", type_name, identifier)
        }

        async fn get_resource_request_status(
            &self,
            request_token: &str,
        ) -> Result<ProgressEvent, AwsError> {
            let mut requests = self.requests.lock().unwrap();
            let request = requests
                .get_mut(request_token)
                .ok_or_else(|| AwsError::api("RequestTokenNotFoundException", request_token))?;

            let mut event = request.event.clone();
            if request.polls < self.pending_polls {
                request.polls += 1;
                event.operation_status = OPERATION_STATUS_IN_PROGRESS.to_string();
            } else if let Some((code, message)) = &self.failure {
                event.operation_status = OPERATION_STATUS_FAILED.to_string();
                event.error_code = Some(code.clone());
                event.status_message = Some(message.clone());
            } else {
                event.operation_status = OPERATION_STATUS_SUCCESS.to_string();
            }
            Ok(event)
        }
    }

    const TYPE_NAME: &str = "AWS::SageMaker::FeatureGroup";
    const TIMEOUT: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_success() {
        let conn = FakeCloudControl {
            pending_polls: 2,
            ..FakeCloudControl::default()
        };
        let start = tokio::time::Instant::now();

        let desired = serde_json::json!({"Name": "orders"});
        let identifier = create_resource(&conn, TYPE_NAME, &desired, TIMEOUT).await.unwrap();

        assert_eq!(identifier, "orders");
        assert_eq!(start.elapsed(), REQUEST_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_throttling() {
        let conn = FakeCloudControl::default();
        conn.mutation_errors
            .lock()
            .unwrap()
            .extend([
                AwsError::api(ERR_CODE_THROTTLING, "Rate exceeded"),
                AwsError::api(ERR_CODE_CONCURRENT_OPERATION, "busy"),
            ]);

        let desired = serde_json::json!({"Name": "orders"});
        let identifier = create_resource(&conn, TYPE_NAME, &desired, TIMEOUT).await.unwrap();

        assert_eq!(identifier, "orders");
        assert_eq!(conn.mutation_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_does_not_retry_other_errors() {
        let conn = FakeCloudControl::default();
        conn.mutation_errors
            .lock()
            .unwrap()
            .push_back(AwsError::api("InvalidRequestException", "bad schema"));

        let err = create_resource(&conn, TYPE_NAME, &serde_json::json!({"Name": "orders"}), TIMEOUT)
            .await
            .unwrap_err();

        assert!(err.is_code("InvalidRequestException"));
        assert_eq!(conn.mutation_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_is_enriched() {
        let conn = FakeCloudControl {
            failure: Some(("AlreadyExists".to_string(), "orders already exists".to_string())),
            ..FakeCloudControl::default()
        };

        let err = create_resource(&conn, TYPE_NAME, &serde_json::json!({"Name": "orders"}), TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "unexpected state 'FAILED', wanted target 'SUCCESS': AlreadyExists: orders already exists"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let conn = FakeCloudControl {
            pending_polls: u32::MAX,
            ..FakeCloudControl::default()
        };

        let err = create_resource(
            &conn,
            TYPE_NAME,
            &serde_json::json!({"Name": "orders"}),
            Duration::from_secs(30),
        )
        .await
        .unwrap_err();

        match err {
            AwsError::Wait(wait) => assert!(wait.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_shares_the_timeout_with_the_wait() {
        let conn = FakeCloudControl {
            pending_polls: u32::MAX,
            ..FakeCloudControl::default()
        };
        conn.mutation_errors
            .lock()
            .unwrap()
            .extend((0..6).map(|_| AwsError::api(ERR_CODE_THROTTLING, "Rate exceeded")));
        let timeout = Duration::from_secs(30);
        let start = tokio::time::Instant::now();

        let err = create_resource(&conn, TYPE_NAME, &serde_json::json!({"Name": "orders"}), timeout)
            .await
            .unwrap_err();

        // Attempts at 0, 0.5, 1.5, 3.5, 7.5, 15.5 and 25.5 seconds
        assert_eq!(conn.mutation_count(), 7);
        assert!(matches!(&err, AwsError::Wait(wait) if wait.is_timeout()));
        assert!(start.elapsed() <= timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_skips_empty_patch() {
        let conn = FakeCloudControl::default();
        update_resource(&conn, TYPE_NAME, "orders", &[], TIMEOUT)
            .await
            .unwrap();
        assert_eq!(conn.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_missing_resource_is_ok() {
        let conn = FakeCloudControl::default();
        delete_resource(&conn, TYPE_NAME, "orders", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(conn.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_reported_not_found_is_ok() {
        let conn = FakeCloudControl {
            failure: Some((HANDLER_ERROR_CODE_NOT_FOUND.to_string(), "gone".to_string())),
            ..FakeCloudControl::default()
        }
        .with_resource("orders", serde_json::json!({"Name": "orders"}));

        delete_resource(&conn, TYPE_NAME, "orders", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(conn.mutation_count(), 1);
    }
}
