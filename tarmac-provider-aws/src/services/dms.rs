//! DMS - Replication tasks
//!
//! Replication tasks move through several statuses on every change and only
//! accept modifications while not running.

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::provider::BoxFuture;
use tarmac_core::waiter::{RefreshResult, StateChangeConf, StateChangeError};

use crate::errs::AwsError;
use crate::resources::CloudControlResource;

pub const ERR_CODE_RESOURCE_NOT_FOUND_FAULT: &str = "ResourceNotFoundFault";

pub const REPLICATION_TASK_STATUS_CREATING: &str = "creating";
pub const REPLICATION_TASK_STATUS_DELETING: &str = "deleting";
pub const REPLICATION_TASK_STATUS_MODIFYING: &str = "modifying";
pub const REPLICATION_TASK_STATUS_READY: &str = "ready";
pub const REPLICATION_TASK_STATUS_RUNNING: &str = "running";
pub const REPLICATION_TASK_STATUS_STARTING: &str = "starting";
pub const REPLICATION_TASK_STATUS_STOPPED: &str = "stopped";
pub const REPLICATION_TASK_STATUS_STOPPING: &str = "stopping";

pub const REPLICATION_TASK_DELETED_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const REPLICATION_TASK_READY_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const REPLICATION_TASK_RUNNING_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const REPLICATION_TASK_STOPPED_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const REPLICATION_TASK_DELAY: Duration = Duration::from_secs(30);
const REPLICATION_TASK_MIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTask {
    pub replication_task_identifier: String,
    pub replication_task_arn: String,
    pub status: String,
    pub last_failure_message: Option<String>,
}

/// Changes to apply to a replication task; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyReplicationTaskInput {
    pub replication_task_arn: String,
    pub cdc_start_time: Option<i64>,
    pub replication_task_settings: Option<String>,
    pub table_mappings: Option<String>,
}

#[async_trait]
pub trait DmsApi: Send + Sync {
    /// Task whose identifier is exactly `id`
    async fn find_replication_task(&self, id: &str) -> Result<Option<ReplicationTask>, AwsError>;

    async fn stop_replication_task(&self, arn: &str) -> Result<(), AwsError>;

    async fn modify_replication_task(
        &self,
        input: &ModifyReplicationTaskInput,
    ) -> Result<(), AwsError>;

    async fn delete_replication_task(&self, arn: &str) -> Result<(), AwsError>;
}

pub const RESOURCES: &[CloudControlResource] = &[CloudControlResource::new(
    "dms_replication_task",
    "AWS::DMS::ReplicationTask",
    &[
        ("replication_task_identifier", "ReplicationTaskIdentifier", false),
        ("migration_type", "MigrationType", true),
        ("replication_instance_arn", "ReplicationInstanceArn", true),
        ("source_endpoint_arn", "SourceEndpointArn", true),
        ("target_endpoint_arn", "TargetEndpointArn", true),
        ("table_mappings", "TableMappings", true),
        ("replication_task_settings", "ReplicationTaskSettings", false),
        ("cdc_start_time", "CdcStartTime", false),
    ],
)
.with_tags()
.with_timeouts(
    REPLICATION_TASK_READY_TIMEOUT,
    REPLICATION_TASK_READY_TIMEOUT,
    REPLICATION_TASK_DELETED_TIMEOUT,
)];

async fn find_replication_task_status<C>(conn: &C, id: &str) -> RefreshResult<ReplicationTask>
where
    C: DmsApi + ?Sized,
{
    let task = conn.find_replication_task(id).await?;
    Ok(task.map(|t| {
        let status = t.status.clone();
        (t, status)
    }))
}

pub fn status_replication_task<'a, C>(
    conn: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<ReplicationTask>> + 'a
where
    C: DmsApi + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<ReplicationTask>> {
        Box::pin(find_replication_task_status(conn, id))
    }
}

fn with_last_failure_message(err: StateChangeError<ReplicationTask>) -> AwsError {
    let (mut error, last) = err.into_parts();
    if let Some(message) = last
        .and_then(|t| t.last_failure_message)
        .filter(|m| !m.is_empty())
    {
        error.set_last_error(message);
    }
    error.into()
}

async fn wait_replication_task<C>(
    conn: &C,
    id: &str,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
) -> Result<Option<ReplicationTask>, AwsError>
where
    C: DmsApi + ?Sized,
{
    StateChangeConf::new(status_replication_task(conn, id))
        .pending(pending.iter().copied())
        .target(target.iter().copied())
        .timeout(timeout)
        .min_timeout(REPLICATION_TASK_MIN_TIMEOUT)
        .delay(REPLICATION_TASK_DELAY)
        .wait_for_state()
        .await
        .map_err(with_last_failure_message)
}

pub async fn wait_replication_task_ready<C>(
    conn: &C,
    id: &str,
) -> Result<Option<ReplicationTask>, AwsError>
where
    C: DmsApi + ?Sized,
{
    wait_replication_task(
        conn,
        id,
        &[REPLICATION_TASK_STATUS_CREATING, REPLICATION_TASK_STATUS_MODIFYING],
        &[REPLICATION_TASK_STATUS_READY],
        REPLICATION_TASK_READY_TIMEOUT,
    )
    .await
}

pub async fn wait_replication_task_running<C>(
    conn: &C,
    id: &str,
) -> Result<Option<ReplicationTask>, AwsError>
where
    C: DmsApi + ?Sized,
{
    wait_replication_task(
        conn,
        id,
        &[REPLICATION_TASK_STATUS_STARTING],
        &[REPLICATION_TASK_STATUS_RUNNING],
        REPLICATION_TASK_RUNNING_TIMEOUT,
    )
    .await
}

pub async fn wait_replication_task_stopped<C>(
    conn: &C,
    id: &str,
) -> Result<Option<ReplicationTask>, AwsError>
where
    C: DmsApi + ?Sized,
{
    wait_replication_task(
        conn,
        id,
        &[REPLICATION_TASK_STATUS_READY, REPLICATION_TASK_STATUS_STOPPING],
        &[REPLICATION_TASK_STATUS_STOPPED],
        REPLICATION_TASK_STOPPED_TIMEOUT,
    )
    .await
}

pub async fn wait_replication_task_deleted<C>(conn: &C, id: &str) -> Result<(), AwsError>
where
    C: DmsApi + ?Sized,
{
    wait_replication_task(
        conn,
        id,
        &[REPLICATION_TASK_STATUS_DELETING],
        &[],
        REPLICATION_TASK_DELETED_TIMEOUT,
    )
    .await?;
    Ok(())
}

/// Apply `input` to a task, stopping it first when it is running
pub async fn update_replication_task<C>(
    conn: &C,
    id: &str,
    status: &str,
    input: &ModifyReplicationTaskInput,
) -> Result<(), AwsError>
where
    C: DmsApi + ?Sized,
{
    if status == REPLICATION_TASK_STATUS_RUNNING {
        log::debug!("stopping DMS replication task ({}) before modifying", id);
        conn.stop_replication_task(&input.replication_task_arn).await?;
        wait_replication_task_stopped(conn, id).await?;
    }

    log::debug!("modifying DMS replication task ({})", id);
    conn.modify_replication_task(input).await?;
    wait_replication_task_ready(conn, id).await?;
    Ok(())
}

/// Delete a task and wait until it is gone; a missing task counts as deleted
pub async fn delete_replication_task<C>(conn: &C, id: &str, arn: &str) -> Result<(), AwsError>
where
    C: DmsApi + ?Sized,
{
    log::debug!("deleting DMS replication task ({})", id);
    match conn.delete_replication_task(arn).await {
        Err(err) if err.is_code(ERR_CODE_RESOURCE_NOT_FOUND_FAULT) => return Ok(()),
        Err(err) => return Err(err),
        Ok(()) => {}
    }

    wait_replication_task_deleted(conn, id).await
}
