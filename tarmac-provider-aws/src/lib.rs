//! Tarmac AWS Provider
//!
//! AWS provider built on the tarmac core engine.
//!
//! ## Module Structure
//!
//! - `client` - Typed client context shared by every handler
//! - `cloudcontrol` - Cloud Control API calls and request status waiters
//! - `errs` - AWS error classification
//! - `provider` - AwsProvider implementation
//! - `resources` - Cloud Control resource type definitions
//! - `services` - Per-service identifiers, waiters and packages

pub mod client;
pub mod cloudcontrol;
pub mod errs;
pub mod provider;
pub mod resources;
pub mod services;

// Re-export main types
pub use client::AwsClient;
pub use errs::AwsError;
pub use provider::AwsProvider;

use tarmac_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use tarmac_core::resource::{Resource, ResourceId, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<&dyn ResourceType> {
        self.registry().resource_types()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.read_resource(&id, &identifier).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
