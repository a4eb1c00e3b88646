//! EKS - Cluster-scoped resources
//!
//! Every resource below is keyed by its cluster name and its own name,
//! joined with `:`.

use tarmac_core::id::{IdError, IdScheme};

use crate::resources::{CloudControlResource, two_part_from_remote, two_part_to_remote};

pub const ADDON_ID: IdScheme<2> = IdScheme::new(":", ["cluster-name", "addon-name"]);
pub const FARGATE_PROFILE_ID: IdScheme<2> =
    IdScheme::new(":", ["cluster-name", "fargate-profile-name"]);
pub const IDENTITY_PROVIDER_CONFIG_ID: IdScheme<2> =
    IdScheme::new(":", ["cluster-name", "config-name"]);
pub const NODE_GROUP_ID: IdScheme<2> = IdScheme::new(":", ["cluster-name", "node-group-name"]);

fn addon_to_remote(id: &str) -> Result<String, IdError> {
    two_part_to_remote(&ADDON_ID, id)
}

fn addon_from_remote(id: &str) -> Result<String, IdError> {
    two_part_from_remote(&ADDON_ID, id)
}

fn fargate_profile_to_remote(id: &str) -> Result<String, IdError> {
    two_part_to_remote(&FARGATE_PROFILE_ID, id)
}

fn fargate_profile_from_remote(id: &str) -> Result<String, IdError> {
    two_part_from_remote(&FARGATE_PROFILE_ID, id)
}

pub const RESOURCES: &[CloudControlResource] = &[
    CloudControlResource::new(
        "eks_addon",
        "AWS::EKS::Addon",
        &[
            ("cluster_name", "ClusterName", true),
            ("addon_name", "AddonName", true),
            ("addon_version", "AddonVersion", false),
            ("resolve_conflicts", "ResolveConflicts", false),
            ("service_account_role_arn", "ServiceAccountRoleArn", false),
            ("arn", "Arn", false),
        ],
    )
    .with_tags()
    .with_identifier(addon_to_remote, addon_from_remote),
    CloudControlResource::new(
        "eks_fargate_profile",
        "AWS::EKS::FargateProfile",
        &[
            ("cluster_name", "ClusterName", true),
            ("fargate_profile_name", "FargateProfileName", true),
            ("pod_execution_role_arn", "PodExecutionRoleArn", true),
            ("subnets", "Subnets", false),
            ("selectors", "Selectors", true),
            ("arn", "Arn", false),
        ],
    )
    .with_tags()
    .with_identifier(fargate_profile_to_remote, fargate_profile_from_remote),
];
