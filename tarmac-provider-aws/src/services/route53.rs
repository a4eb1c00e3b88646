//! Route 53

use tarmac_core::id::{IdError, IdScheme};

use crate::resources::{CloudControlResource, two_part_from_remote, two_part_to_remote};

pub const KEY_SIGNING_KEY_ID: IdScheme<2> = IdScheme::new(",", ["hosted-zone-id", "name"]);

fn key_signing_key_to_remote(id: &str) -> Result<String, IdError> {
    two_part_to_remote(&KEY_SIGNING_KEY_ID, id)
}

fn key_signing_key_from_remote(id: &str) -> Result<String, IdError> {
    two_part_from_remote(&KEY_SIGNING_KEY_ID, id)
}

pub const RESOURCES: &[CloudControlResource] = &[CloudControlResource::new(
    "route53_key_signing_key",
    "AWS::Route53::KeySigningKey",
    &[
        ("hosted_zone_id", "HostedZoneId", true),
        ("name", "Name", true),
        ("key_management_service_arn", "KeyManagementServiceArn", true),
        ("status", "Status", true),
    ],
)
.with_identifier(key_signing_key_to_remote, key_signing_key_from_remote)];
