//! Budgets - Budget and budget action identifiers, action status

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::id::{IdError, IdScheme};
use tarmac_core::provider::BoxFuture;
use tarmac_core::waiter::{RefreshResult, StateChangeConf};

use crate::errs::AwsError;

pub const ERR_CODE_NOT_FOUND: &str = "NotFoundException";

pub const ACTION_STATUS_STANDBY: &str = "STANDBY";
pub const ACTION_STATUS_PENDING: &str = "PENDING";
pub const ACTION_STATUS_EXECUTION_IN_PROGRESS: &str = "EXECUTION_IN_PROGRESS";
pub const ACTION_STATUS_EXECUTION_SUCCESS: &str = "EXECUTION_SUCCESS";
pub const ACTION_STATUS_EXECUTION_FAILURE: &str = "EXECUTION_FAILURE";
pub const ACTION_STATUS_REVERSE_IN_PROGRESS: &str = "REVERSE_IN_PROGRESS";
pub const ACTION_STATUS_REVERSE_SUCCESS: &str = "REVERSE_SUCCESS";
pub const ACTION_STATUS_REVERSE_FAILURE: &str = "REVERSE_FAILURE";
pub const ACTION_STATUS_RESET_IN_PROGRESS: &str = "RESET_IN_PROGRESS";
pub const ACTION_STATUS_RESET_FAILURE: &str = "RESET_FAILURE";

pub const ACTION_AVAILABLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const BUDGET_ID: IdScheme<2> = IdScheme::new(":", ["AccountID", "BudgetName"]);

pub const BUDGET_ACTION_ID: IdScheme<3> =
    IdScheme::new(":", ["AccountID", "ActionID", "BudgetName"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetAction {
    pub account_id: String,
    pub action_id: String,
    pub budget_name: String,
    pub status: String,
}

#[async_trait]
pub trait BudgetsApi: Send + Sync {
    async fn describe_budget_action(
        &self,
        account_id: &str,
        action_id: &str,
        budget_name: &str,
    ) -> Result<BudgetAction, AwsError>;
}

pub fn budget_create_id(account_id: &str, budget_name: &str) -> Result<String, IdError> {
    BUDGET_ID.create([account_id, budget_name])
}

/// Returns `(account_id, budget_name)`
pub fn budget_parse_id(id: &str) -> Result<(String, String), IdError> {
    let [account_id, budget_name] = BUDGET_ID.parse(id)?;
    Ok((account_id, budget_name))
}

pub fn budget_action_create_id(
    account_id: &str,
    action_id: &str,
    budget_name: &str,
) -> Result<String, IdError> {
    BUDGET_ACTION_ID.create([account_id, action_id, budget_name])
}

/// Returns `(account_id, action_id, budget_name)`
pub fn budget_action_parse_id(id: &str) -> Result<(String, String, String), IdError> {
    let [account_id, action_id, budget_name] = BUDGET_ACTION_ID.parse(id)?;
    Ok((account_id, action_id, budget_name))
}

/// Budget action, `None` when it does not exist
pub async fn find_budget_action<C>(
    conn: &C,
    account_id: &str,
    action_id: &str,
    budget_name: &str,
) -> Result<Option<BudgetAction>, AwsError>
where
    C: BudgetsApi + ?Sized,
{
    match conn.describe_budget_action(account_id, action_id, budget_name).await {
        Ok(action) => Ok(Some(action)),
        Err(err) if err.is_code(ERR_CODE_NOT_FOUND) => Ok(None),
        Err(err) => Err(err),
    }
}

async fn find_budget_action_status<C>(conn: &C, id: &str) -> RefreshResult<BudgetAction>
where
    C: BudgetsApi + ?Sized,
{
    let (account_id, action_id, budget_name) = budget_action_parse_id(id)?;
    let action = find_budget_action(conn, &account_id, &action_id, &budget_name).await?;
    Ok(action.map(|a| {
        let status = a.status.clone();
        (a, status)
    }))
}

/// Refresh a budget action by its composite identifier
pub fn status_budget_action<'a, C>(
    conn: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<BudgetAction>> + 'a
where
    C: BudgetsApi + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<BudgetAction>> {
        Box::pin(find_budget_action_status(conn, id))
    }
}

/// Wait until an action leaves standby and any execution in progress
pub async fn wait_budget_action_available<C>(
    conn: &C,
    id: &str,
) -> Result<Option<BudgetAction>, AwsError>
where
    C: BudgetsApi + ?Sized,
{
    let action = StateChangeConf::new(status_budget_action(conn, id))
        .pending([ACTION_STATUS_EXECUTION_IN_PROGRESS, ACTION_STATUS_STANDBY])
        .target([
            ACTION_STATUS_EXECUTION_SUCCESS,
            ACTION_STATUS_EXECUTION_FAILURE,
            ACTION_STATUS_PENDING,
        ])
        .timeout(ACTION_AVAILABLE_TIMEOUT)
        .wait_for_state()
        .await?;
    Ok(action)
}
