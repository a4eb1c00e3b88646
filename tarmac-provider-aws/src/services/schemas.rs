//! EventBridge Schemas

use tarmac_core::id::IdScheme;

pub const SCHEMA_ID: IdScheme<2> = IdScheme::new("/", ["SCHEMA_NAME", "REGISTRY_NAME"]);
