//! Services - Per-service identifiers, waiters and resource packages
//!
//! Services whose resources are managed through Cloud Control contribute a
//! [`CloudControlPackage`] to the registry. The others only provide
//! identifier codecs and waiters used by their callers.

pub mod amplify;
pub mod budgets;
pub mod cloudwatchevents;
pub mod directconnect;
pub mod dms;
pub mod ec2;
pub mod eks;
pub mod kms;
pub mod lex;
pub mod route53;
pub mod sagemaker;
pub mod schemas;

use tarmac_core::config::ProviderConfig;
use tarmac_core::provider::{ProviderError, ProviderResult, ResourceType};
use tarmac_core::registry::{Registry, RegistryError, ServicePackage};

use crate::resources::CloudControlResource;

/// Service package whose resource types are all backed by Cloud Control
#[derive(Clone, Copy)]
pub struct CloudControlPackage {
    pub name: &'static str,
    pub categories: &'static [&'static str],
    pub resources: &'static [CloudControlResource],
}

impl ServicePackage for CloudControlPackage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn resources(&self) -> Vec<Box<dyn ResourceType>> {
        self.resources
            .iter()
            .map(|r| Box::new(*r) as Box<dyn ResourceType>)
            .collect()
    }

    fn documentation_categories(&self) -> Vec<&'static str> {
        self.categories.to_vec()
    }
}

const PACKAGES: &[CloudControlPackage] = &[
    CloudControlPackage {
        name: "dms",
        categories: &["Database Migration Service (DMS)"],
        resources: dms::RESOURCES,
    },
    CloudControlPackage {
        name: "ec2",
        categories: &["EC2 (Elastic Compute Cloud)", "VPC (Virtual Private Cloud)"],
        resources: ec2::RESOURCES,
    },
    CloudControlPackage {
        name: "eks",
        categories: &["EKS (Elastic Kubernetes)"],
        resources: eks::RESOURCES,
    },
    CloudControlPackage {
        name: "kms",
        categories: &["KMS (Key Management)"],
        resources: kms::RESOURCES,
    },
    CloudControlPackage {
        name: "route53",
        categories: &["Route 53"],
        resources: route53::RESOURCES,
    },
    CloudControlPackage {
        name: "sagemaker",
        categories: &["SageMaker"],
        resources: sagemaker::RESOURCES,
    },
];

pub fn service_packages() -> Vec<Box<dyn ServicePackage>> {
    PACKAGES
        .iter()
        .map(|p| Box::new(*p) as Box<dyn ServicePackage>)
        .collect()
}

/// Every resource type served through Cloud Control
pub fn cloudcontrol_resources() -> impl Iterator<Item = &'static CloudControlResource> {
    PACKAGES.iter().flat_map(|p| p.resources.iter())
}

fn registry_error(err: RegistryError) -> ProviderError {
    ProviderError::new(err.to_string()).with_cause(err)
}

/// Register, configure and close every service package
pub fn new_registry(config: &ProviderConfig) -> ProviderResult<Registry> {
    let mut registry = Registry::new();
    for package in service_packages() {
        registry.register(package).map_err(registry_error)?;
    }
    registry.configure(config)?;
    registry.close().map_err(registry_error)?;
    Ok(registry)
}
