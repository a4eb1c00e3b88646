//! Registry - Service packages contributing resource types
//!
//! Each AWS service contributes its resource types through a
//! [`ServicePackage`]. Packages are registered while the provider is being
//! assembled; [`Registry::close`] then freezes the set and indexes every
//! resource type by name.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::config::ProviderConfig;
use crate::provider::{ProviderResult, ResourceType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service package registration is closed")]
    Closed,

    #[error("a service package named {0:?} is already registered")]
    DuplicatePackage(String),

    #[error("resource type {resource:?} is registered by both {first:?} and {second:?}")]
    DuplicateResource {
        resource: String,
        first: String,
        second: String,
    },
}

/// Contribution of one AWS service to the provider
pub trait ServicePackage: Send + Sync {
    /// Unique package name (e.g., "amplify")
    fn name(&self) -> &'static str;

    /// Called once with the provider configuration before any resource is used
    fn configure(&mut self, _config: &ProviderConfig) -> ProviderResult<()> {
        Ok(())
    }

    fn resources(&self) -> Vec<Box<dyn ResourceType>>;

    fn data_sources(&self) -> Vec<Box<dyn ResourceType>> {
        Vec::new()
    }

    /// Documentation categories the package's resources are listed under
    fn documentation_categories(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Resource types by name, with the name of the package providing them
type ResourceIndex = HashMap<&'static str, (&'static str, Box<dyn ResourceType>)>;

/// Explicit registry of service packages
#[derive(Default)]
pub struct Registry {
    packages: BTreeMap<&'static str, Box<dyn ServicePackage>>,
    resources: ResourceIndex,
    closed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, package: Box<dyn ServicePackage>) -> Result<(), RegistryError> {
        if self.closed {
            return Err(RegistryError::Closed);
        }
        let name = package.name();
        if self.packages.contains_key(name) {
            return Err(RegistryError::DuplicatePackage(name.to_string()));
        }
        log::debug!("registered service package {}", name);
        self.packages.insert(name, package);
        Ok(())
    }

    /// Pass the provider configuration to every package
    pub fn configure(&mut self, config: &ProviderConfig) -> ProviderResult<()> {
        for package in self.packages.values_mut() {
            package.configure(config)?;
        }
        Ok(())
    }

    /// Stop accepting packages and index their resource types.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), RegistryError> {
        if self.closed {
            return Ok(());
        }

        let mut resources = ResourceIndex::new();
        for (package_name, package) in &self.packages {
            for resource in package.resources() {
                let name = resource.name();
                if let Some((first, _)) = resources.get(name) {
                    return Err(RegistryError::DuplicateResource {
                        resource: name.to_string(),
                        first: first.to_string(),
                        second: package_name.to_string(),
                    });
                }
                resources.insert(name, (*package_name, resource));
            }
        }

        self.resources = resources;
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get(&self, name: &str) -> Option<&dyn ServicePackage> {
        self.packages.get(name).map(|p| p.as_ref())
    }

    pub fn packages(&self) -> impl Iterator<Item = &dyn ServicePackage> {
        self.packages.values().map(|p| p.as_ref())
    }

    /// Resource type by name; only populated once the registry is closed
    pub fn resource_type(&self, name: &str) -> Option<&dyn ResourceType> {
        self.resources.get(name).map(|(_, r)| r.as_ref())
    }

    pub fn resource_types(&self) -> Vec<&dyn ResourceType> {
        let mut types: Vec<&dyn ResourceType> =
            self.resources.values().map(|(_, r)| r.as_ref()).collect();
        types.sort_by_key(|r| r.name());
        types
    }
}
