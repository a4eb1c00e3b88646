//! KMS - Keys and their eventually consistent attributes
//!
//! KMS reads can return stale values for a while after a write, so updates
//! wait until several consecutive reads agree with what was written.

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::provider::BoxFuture;
use tarmac_core::tags::KeyValueTags;
use tarmac_core::waiter::{RefreshError, RefreshResult, StateChangeConf, WaitOpts, wait_until};

use crate::errs::AwsError;
use crate::resources::CloudControlResource;

pub const ERR_CODE_NOT_FOUND: &str = "NotFoundException";

pub const KEY_STATE_ENABLED: &str = "Enabled";
pub const KEY_STATE_DISABLED: &str = "Disabled";
pub const KEY_STATE_PENDING_DELETION: &str = "PendingDeletion";

pub const POLICY_NAME_DEFAULT: &str = "default";

pub const KEY_DELETED_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const KEY_DESCRIPTION_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const KEY_STATE_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub key_id: String,
    pub description: String,
    pub enabled: bool,
    pub key_state: String,
}

#[async_trait]
pub trait KmsApi: Send + Sync {
    async fn find_key(&self, id: &str) -> Result<Option<KeyMetadata>, AwsError>;

    async fn find_key_policy(
        &self,
        id: &str,
        policy_name: &str,
    ) -> Result<Option<String>, AwsError>;

    async fn find_key_rotation_enabled(&self, id: &str) -> Result<Option<bool>, AwsError>;

    async fn list_tags(&self, id: &str) -> Result<KeyValueTags, AwsError>;
}

pub const RESOURCES: &[CloudControlResource] = &[CloudControlResource::new(
    "kms_key",
    "AWS::KMS::Key",
    &[
        ("description", "Description", false),
        ("enabled", "Enabled", false),
        ("enable_key_rotation", "EnableKeyRotation", false),
        ("key_policy", "KeyPolicy", false),
        ("key_spec", "KeySpec", false),
        ("key_usage", "KeyUsage", false),
        ("pending_window_in_days", "PendingWindowInDays", false),
        ("key_id", "KeyId", false),
        ("arn", "Arn", false),
    ],
)
.with_tags()];

/// Keys scheduled for deletion are as good as gone
async fn find_live_key<C>(conn: &C, id: &str) -> Result<Option<KeyMetadata>, AwsError>
where
    C: KmsApi + ?Sized,
{
    let key = conn.find_key(id).await?;
    Ok(key.filter(|k| k.key_state != KEY_STATE_PENDING_DELETION))
}

async fn find_key_state<C>(conn: &C, id: &str) -> RefreshResult<KeyMetadata>
where
    C: KmsApi + ?Sized,
{
    let key = find_live_key(conn, id).await?;
    Ok(key.map(|k| {
        let state = k.key_state.clone();
        (k, state)
    }))
}

pub fn status_key_state<'a, C>(
    conn: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<KeyMetadata>> + 'a
where
    C: KmsApi + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<KeyMetadata>> { Box::pin(find_key_state(conn, id)) }
}

pub async fn wait_key_deleted<C>(conn: &C, id: &str) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    StateChangeConf::new(status_key_state(conn, id))
        .pending([KEY_STATE_DISABLED, KEY_STATE_ENABLED])
        .target(Vec::<String>::new())
        .timeout(KEY_DELETED_TIMEOUT)
        .wait_for_state()
        .await?;
    Ok(())
}

// =============================================================================
// Propagation
// =============================================================================

async fn key_matches<C>(
    conn: &C,
    id: &str,
    check: impl Fn(&KeyMetadata) -> bool,
) -> Result<bool, RefreshError>
where
    C: KmsApi + ?Sized,
{
    Ok(find_live_key(conn, id).await?.is_some_and(|k| check(&k)))
}

/// Compare two policy documents as JSON, ignoring formatting
pub fn policies_are_equivalent(a: &str, b: &str) -> Result<bool, serde_json::Error> {
    let a: serde_json::Value = serde_json::from_str(a)?;
    let b: serde_json::Value = serde_json::from_str(b)?;
    Ok(a == b)
}

async fn key_policy_matches<C>(conn: &C, id: &str, policy: &str) -> Result<bool, RefreshError>
where
    C: KmsApi + ?Sized,
{
    match conn.find_key_policy(id, POLICY_NAME_DEFAULT).await? {
        Some(current) => Ok(policies_are_equivalent(&current, policy)?),
        None => Ok(false),
    }
}

async fn key_rotation_matches<C>(conn: &C, id: &str, enabled: bool) -> Result<bool, RefreshError>
where
    C: KmsApi + ?Sized,
{
    Ok(conn.find_key_rotation_enabled(id).await? == Some(enabled))
}

async fn key_tags_match<C>(conn: &C, id: &str, tags: &KeyValueTags) -> Result<bool, RefreshError>
where
    C: KmsApi + ?Sized,
{
    match conn.list_tags(id).await {
        Ok(current) => Ok(current == *tags),
        Err(err) if err.is_code(ERR_CODE_NOT_FOUND) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub async fn wait_key_description_propagated<C>(
    conn: &C,
    id: &str,
    description: &str,
) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    let opts = WaitOpts {
        continuous_target_occurence: 5,
        min_timeout: Duration::from_secs(2),
        ..WaitOpts::default()
    };
    wait_until(
        KEY_DESCRIPTION_PROPAGATION_TIMEOUT,
        || key_matches(conn, id, |k| k.description == description),
        opts,
    )
    .await?;
    Ok(())
}

pub async fn wait_key_state_propagated<C>(conn: &C, id: &str, enabled: bool) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    let opts = WaitOpts {
        continuous_target_occurence: 15,
        min_timeout: Duration::from_secs(2),
        ..WaitOpts::default()
    };
    wait_until(
        KEY_STATE_PROPAGATION_TIMEOUT,
        || key_matches(conn, id, |k| k.enabled == enabled),
        opts,
    )
    .await?;
    Ok(())
}

pub async fn wait_key_policy_propagated<C>(conn: &C, id: &str, policy: &str) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    let opts = WaitOpts {
        continuous_target_occurence: 5,
        min_timeout: Duration::from_secs(1),
        ..WaitOpts::default()
    };
    wait_until(PROPAGATION_TIMEOUT, || key_policy_matches(conn, id, policy), opts).await?;
    Ok(())
}

pub async fn wait_key_rotation_enabled_propagated<C>(
    conn: &C,
    id: &str,
    enabled: bool,
) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    let opts = WaitOpts {
        continuous_target_occurence: 5,
        min_timeout: Duration::from_secs(1),
        ..WaitOpts::default()
    };
    wait_until(PROPAGATION_TIMEOUT, || key_rotation_matches(conn, id, enabled), opts).await?;
    Ok(())
}

pub async fn wait_tags_propagated<C>(
    conn: &C,
    id: &str,
    tags: &KeyValueTags,
) -> Result<(), AwsError>
where
    C: KmsApi + ?Sized,
{
    let opts = WaitOpts {
        continuous_target_occurence: 5,
        min_timeout: Duration::from_secs(1),
        ..WaitOpts::default()
    };
    wait_until(PROPAGATION_TIMEOUT, || key_tags_match(conn, id, tags), opts).await?;
    Ok(())
}
