//! Tarmac Core
//!
//! Building blocks shared by every service of the AWS provider: waiting for
//! remote state changes, retrying transient failures, encoding composite
//! identifiers, and the provider and registry surfaces.

pub mod config;
pub mod id;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod retry;
pub mod tags;
pub mod waiter;
