//! Lex - Slot types
//!
//! Lex rejects concurrent changes to a slot type with a conflict that carries
//! the checksum of the current revision. The next attempt has to send that
//! checksum back.

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::retry::{RetryError, retry};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::errs::{AwsError, ERR_CODE_CONFLICT};

pub const ERR_CODE_NOT_FOUND: &str = "NotFoundException";

pub const SLOT_TYPE_CREATE_TIMEOUT: Duration = Duration::from_secs(60);
pub const SLOT_TYPE_UPDATE_TIMEOUT: Duration = Duration::from_secs(60);
pub const SLOT_TYPE_DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const SLOT_TYPE_VERSION_LATEST: &str = "$LATEST";

pub const VALUE_SELECTION_STRATEGY_ORIGINAL_VALUE: &str = "ORIGINAL_VALUE";
pub const VALUE_SELECTION_STRATEGY_TOP_RESOLUTION: &str = "TOP_RESOLUTION";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationValue {
    pub value: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutSlotTypeInput {
    pub name: String,
    pub description: Option<String>,
    pub enumeration_values: Vec<EnumerationValue>,
    pub value_selection_strategy: Option<String>,
    pub checksum: Option<String>,
    pub create_version: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotType {
    pub name: String,
    pub description: Option<String>,
    pub enumeration_values: Vec<EnumerationValue>,
    pub value_selection_strategy: Option<String>,
    pub checksum: Option<String>,
    pub version: String,
}

/// A rejected put, with the checksum of the revision that won when Lex
/// returned one
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PutSlotTypeFailure {
    pub error: AwsError,
    pub checksum: Option<String>,
}

impl From<AwsError> for PutSlotTypeFailure {
    fn from(error: AwsError) -> Self {
        Self { error, checksum: None }
    }
}

#[async_trait]
pub trait LexModelsApi: Send + Sync {
    async fn put_slot_type(&self, input: &PutSlotTypeInput) -> Result<SlotType, PutSlotTypeFailure>;

    async fn get_slot_type(&self, name: &str, version: &str) -> Result<SlotType, AwsError>;

    async fn delete_slot_type(&self, name: &str) -> Result<(), AwsError>;
}

/// Put `input`, retrying conflicts with the checksum Lex returned
async fn put_slot_type<C>(
    conn: &C,
    input: PutSlotTypeInput,
    timeout: Duration,
) -> Result<SlotType, AwsError>
where
    C: LexModelsApi + ?Sized,
{
    let input = &Mutex::new(input);
    retry(timeout, || async move {
        let attempt = input.lock().await.clone();
        match conn.put_slot_type(&attempt).await {
            Ok(slot_type) => Ok(slot_type),
            Err(PutSlotTypeFailure { error, checksum }) if error.is_code(ERR_CODE_CONFLICT) => {
                log::debug!("conflict putting Lex slot type ({}), retrying", attempt.name);
                input.lock().await.checksum = checksum;
                Err(RetryError::Retryable(error))
            }
            Err(failure) => Err(RetryError::NonRetryable(failure.error)),
        }
    })
    .await
}

pub async fn create_slot_type<C>(
    conn: &C,
    mut input: PutSlotTypeInput,
) -> Result<SlotType, AwsError>
where
    C: LexModelsApi + ?Sized,
{
    input.checksum = None;
    put_slot_type(conn, input, SLOT_TYPE_CREATE_TIMEOUT).await
}

/// Update an existing slot type starting from the `checksum` it was read with
pub async fn update_slot_type<C>(
    conn: &C,
    mut input: PutSlotTypeInput,
    checksum: Option<String>,
) -> Result<SlotType, AwsError>
where
    C: LexModelsApi + ?Sized,
{
    input.checksum = checksum;
    put_slot_type(conn, input, SLOT_TYPE_UPDATE_TIMEOUT).await
}

/// Latest revision of a slot type, `None` when it does not exist
pub async fn find_slot_type<C>(conn: &C, name: &str) -> Result<Option<SlotType>, AwsError>
where
    C: LexModelsApi + ?Sized,
{
    match conn.get_slot_type(name, SLOT_TYPE_VERSION_LATEST).await {
        Ok(slot_type) => Ok(Some(slot_type)),
        Err(err) if err.is_code(ERR_CODE_NOT_FOUND) => Ok(None),
        Err(err) => Err(err),
    }
}

pub async fn delete_slot_type<C>(conn: &C, name: &str) -> Result<(), AwsError>
where
    C: LexModelsApi + ?Sized,
{
    retry(SLOT_TYPE_DELETE_TIMEOUT, || async move {
        conn.delete_slot_type(name).await.map_err(|err| {
            if err.is_code(ERR_CODE_CONFLICT) {
                RetryError::Retryable(err)
            } else {
                RetryError::NonRetryable(err)
            }
        })
    })
    .await
}
