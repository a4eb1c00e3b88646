//! EC2 - Carrier gateways, route tables and VPC endpoint associations

use std::time::Duration;

use async_trait::async_trait;
use tarmac_core::id::LengthPrefixedScheme;
use tarmac_core::provider::BoxFuture;
use tarmac_core::waiter::{RefreshResult, StateChangeConf};

use crate::errs::AwsError;
use crate::resources::CloudControlResource;

pub const ERR_CODE_INVALID_CARRIER_GATEWAY_ID_NOT_FOUND: &str = "InvalidCarrierGatewayID.NotFound";
pub const ERR_CODE_INVALID_VPC_ENDPOINT_ID_NOT_FOUND: &str = "InvalidVpcEndpointId.NotFound";
pub const ERR_CODE_INVALID_ROUTE_TABLE_ID_NOT_FOUND: &str = "InvalidRouteTableID.NotFound";
pub const ERR_CODE_INVALID_PARAMETER: &str = "InvalidParameter";

pub const CARRIER_GATEWAY_STATE_PENDING: &str = "pending";
pub const CARRIER_GATEWAY_STATE_AVAILABLE: &str = "available";
pub const CARRIER_GATEWAY_STATE_DELETING: &str = "deleting";
pub const CARRIER_GATEWAY_STATE_DELETED: &str = "deleted";

/// Route tables have no lifecycle state; existing ones are reported as ready
pub const ROUTE_TABLE_STATUS_READY: &str = "ready";
pub const VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_STATUS_READY: &str = "ready";

pub const CARRIER_GATEWAY_AVAILABLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const CARRIER_GATEWAY_DELETED_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const ROUTE_TABLE_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const ROUTE_TABLE_DELETED_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// New route tables can take a while to show up in Describe calls
const ROUTE_TABLE_NOT_FOUND_CHECKS: u32 = 40;

/// Association identifiers, unambiguous whatever the IDs contain
pub const VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_ID: LengthPrefixedScheme<2> =
    LengthPrefixedScheme::new(["vpc-endpoint-id", "route-table-id"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierGateway {
    pub carrier_gateway_id: String,
    pub vpc_id: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub route_table_id: String,
    pub vpc_id: String,
}

#[async_trait]
pub trait Ec2Api: Send + Sync {
    async fn find_carrier_gateway(&self, id: &str) -> Result<Option<CarrierGateway>, AwsError>;

    async fn find_route_table(&self, id: &str) -> Result<Option<RouteTable>, AwsError>;

    /// Whether the VPC endpoint lists the route table among its route tables
    async fn vpc_endpoint_route_table_association_exists(
        &self,
        vpc_endpoint_id: &str,
        route_table_id: &str,
    ) -> Result<bool, AwsError>;

    async fn modify_vpc_endpoint_route_tables(
        &self,
        vpc_endpoint_id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), AwsError>;
}

pub const RESOURCES: &[CloudControlResource] = &[
    CloudControlResource::new(
        "ec2_carrier_gateway",
        "AWS::EC2::CarrierGateway",
        &[("vpc_id", "VpcId", true), ("carrier_gateway_id", "CarrierGatewayId", false)],
    )
    .with_tags()
    .with_timeouts(
        CARRIER_GATEWAY_AVAILABLE_TIMEOUT,
        CARRIER_GATEWAY_AVAILABLE_TIMEOUT,
        CARRIER_GATEWAY_DELETED_TIMEOUT,
    ),
    CloudControlResource::new(
        "ec2_route_table",
        "AWS::EC2::RouteTable",
        &[("vpc_id", "VpcId", true), ("route_table_id", "RouteTableId", false)],
    )
    .with_tags()
    .with_timeouts(
        ROUTE_TABLE_READY_TIMEOUT,
        ROUTE_TABLE_READY_TIMEOUT,
        ROUTE_TABLE_DELETED_TIMEOUT,
    ),
];

// =============================================================================
// Status
// =============================================================================

async fn find_carrier_gateway_state<C>(conn: &C, id: &str) -> RefreshResult<CarrierGateway>
where
    C: Ec2Api + ?Sized,
{
    match conn.find_carrier_gateway(id).await {
        Err(err) if err.is_code(ERR_CODE_INVALID_CARRIER_GATEWAY_ID_NOT_FOUND) => Ok(None),
        Err(err) => Err(err.into()),
        Ok(None) => Ok(None),
        // Deleted gateways linger in Describe output for a while
        Ok(Some(gateway)) if gateway.state == CARRIER_GATEWAY_STATE_DELETED => Ok(None),
        Ok(Some(gateway)) => {
            let state = gateway.state.clone();
            Ok(Some((gateway, state)))
        }
    }
}

pub fn status_carrier_gateway_state<'a, C>(
    conn: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<CarrierGateway>> + 'a
where
    C: Ec2Api + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<CarrierGateway>> {
        Box::pin(find_carrier_gateway_state(conn, id))
    }
}

async fn find_route_table_status<C>(conn: &C, id: &str) -> RefreshResult<RouteTable>
where
    C: Ec2Api + ?Sized,
{
    match conn.find_route_table(id).await {
        Err(err) if err.is_code(ERR_CODE_INVALID_ROUTE_TABLE_ID_NOT_FOUND) => Ok(None),
        Err(err) => Err(err.into()),
        Ok(table) => Ok(table.map(|t| (t, ROUTE_TABLE_STATUS_READY.to_string()))),
    }
}

pub fn status_route_table<'a, C>(
    conn: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<RouteTable>> + 'a
where
    C: Ec2Api + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<RouteTable>> {
        Box::pin(find_route_table_status(conn, id))
    }
}

async fn find_vpc_endpoint_route_table_association<C>(
    conn: &C,
    vpc_endpoint_id: &str,
    route_table_id: &str,
) -> RefreshResult<()>
where
    C: Ec2Api + ?Sized,
{
    let exists = conn
        .vpc_endpoint_route_table_association_exists(vpc_endpoint_id, route_table_id)
        .await?;
    Ok(exists.then(|| ((), VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_STATUS_READY.to_string())))
}

pub fn status_vpc_endpoint_route_table_association<'a, C>(
    conn: &'a C,
    vpc_endpoint_id: &'a str,
    route_table_id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, RefreshResult<()>> + 'a
where
    C: Ec2Api + ?Sized,
{
    move || -> BoxFuture<'a, RefreshResult<()>> {
        Box::pin(find_vpc_endpoint_route_table_association(
            conn,
            vpc_endpoint_id,
            route_table_id,
        ))
    }
}

// =============================================================================
// Waiters
// =============================================================================

pub async fn wait_carrier_gateway_available<C>(
    conn: &C,
    id: &str,
) -> Result<Option<CarrierGateway>, AwsError>
where
    C: Ec2Api + ?Sized,
{
    let gateway = StateChangeConf::new(status_carrier_gateway_state(conn, id))
        .pending([CARRIER_GATEWAY_STATE_PENDING])
        .target([CARRIER_GATEWAY_STATE_AVAILABLE])
        .timeout(CARRIER_GATEWAY_AVAILABLE_TIMEOUT)
        .wait_for_state()
        .await?;
    Ok(gateway)
}

pub async fn wait_carrier_gateway_deleted<C>(conn: &C, id: &str) -> Result<(), AwsError>
where
    C: Ec2Api + ?Sized,
{
    StateChangeConf::new(status_carrier_gateway_state(conn, id))
        .pending([CARRIER_GATEWAY_STATE_DELETING])
        .target(Vec::<String>::new())
        .timeout(CARRIER_GATEWAY_DELETED_TIMEOUT)
        .wait_for_state()
        .await?;
    Ok(())
}

pub async fn wait_route_table_ready<C>(conn: &C, id: &str) -> Result<Option<RouteTable>, AwsError>
where
    C: Ec2Api + ?Sized,
{
    let table = StateChangeConf::new(status_route_table(conn, id))
        .target([ROUTE_TABLE_STATUS_READY])
        .timeout(ROUTE_TABLE_READY_TIMEOUT)
        .not_found_checks(ROUTE_TABLE_NOT_FOUND_CHECKS)
        .wait_for_state()
        .await?;
    Ok(table)
}

pub async fn wait_route_table_deleted<C>(conn: &C, id: &str) -> Result<(), AwsError>
where
    C: Ec2Api + ?Sized,
{
    StateChangeConf::new(status_route_table(conn, id))
        .pending([ROUTE_TABLE_STATUS_READY])
        .target(Vec::<String>::new())
        .timeout(ROUTE_TABLE_DELETED_TIMEOUT)
        .wait_for_state()
        .await?;
    Ok(())
}

pub async fn wait_vpc_endpoint_route_table_association_ready<C>(
    conn: &C,
    vpc_endpoint_id: &str,
    route_table_id: &str,
) -> Result<(), AwsError>
where
    C: Ec2Api + ?Sized,
{
    StateChangeConf::new(status_vpc_endpoint_route_table_association(
        conn,
        vpc_endpoint_id,
        route_table_id,
    ))
    .target([VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_STATUS_READY])
    .timeout(PROPAGATION_TIMEOUT)
    .continuous_target_occurence(2)
    .wait_for_state()
    .await?;
    Ok(())
}

pub async fn wait_vpc_endpoint_route_table_association_deleted<C>(
    conn: &C,
    vpc_endpoint_id: &str,
    route_table_id: &str,
) -> Result<(), AwsError>
where
    C: Ec2Api + ?Sized,
{
    StateChangeConf::new(status_vpc_endpoint_route_table_association(
        conn,
        vpc_endpoint_id,
        route_table_id,
    ))
    .pending([VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_STATUS_READY])
    .target(Vec::<String>::new())
    .timeout(PROPAGATION_TIMEOUT)
    .continuous_target_occurence(2)
    .wait_for_state()
    .await?;
    Ok(())
}

// =============================================================================
// VPC Endpoint Route Table Association
// =============================================================================

/// Associate a route table with a VPC endpoint and return the association identifier
pub async fn create_vpc_endpoint_route_table_association<C>(
    conn: &C,
    vpc_endpoint_id: &str,
    route_table_id: &str,
) -> Result<String, AwsError>
where
    C: Ec2Api + ?Sized,
{
    let id = VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_ID.create([vpc_endpoint_id, route_table_id])?;
    log::debug!(
        "Creating VPC Endpoint Route Table Association: {}/{}",
        vpc_endpoint_id,
        route_table_id
    );
    conn.modify_vpc_endpoint_route_tables(vpc_endpoint_id, &[route_table_id], &[])
        .await?;
    wait_vpc_endpoint_route_table_association_ready(conn, vpc_endpoint_id, route_table_id).await?;
    Ok(id)
}

/// Remove the association; endpoints or route tables already gone count as removed
pub async fn delete_vpc_endpoint_route_table_association<C>(
    conn: &C,
    id: &str,
) -> Result<(), AwsError>
where
    C: Ec2Api + ?Sized,
{
    let [vpc_endpoint_id, route_table_id] = VPC_ENDPOINT_ROUTE_TABLE_ASSOCIATION_ID.parse(id)?;
    log::debug!(
        "Deleting VPC Endpoint Route Table Association: {}/{}",
        vpc_endpoint_id,
        route_table_id
    );

    match conn
        .modify_vpc_endpoint_route_tables(&vpc_endpoint_id, &[], &[route_table_id.as_str()])
        .await
    {
        Err(err)
            if err.is_code(ERR_CODE_INVALID_VPC_ENDPOINT_ID_NOT_FOUND)
                || err.is_code(ERR_CODE_INVALID_ROUTE_TABLE_ID_NOT_FOUND)
                || err.is_code(ERR_CODE_INVALID_PARAMETER) =>
        {
            return Ok(());
        }
        Err(err) => return Err(err),
        Ok(()) => {}
    }

    wait_vpc_endpoint_route_table_association_deleted(conn, &vpc_endpoint_id, &route_table_id).await
}
