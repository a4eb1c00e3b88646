//! CloudWatch Events - Event bus scoped identifiers
//!
//! Permissions, rules and targets on the `default` bus keep their historical
//! identifiers without a bus name. Partner event bus names contain `/`
//! themselves, so identifiers with more parts than expected are split from
//! the right and accepted only when the remainder is a partner bus name.

use std::sync::LazyLock;

use regex::Regex;
use tarmac_core::id::{IdError, IdScheme};

pub const DEFAULT_EVENT_BUS_NAME: &str = "default";

static PARTNER_EVENT_BUS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^aws\.partner(/[\.\-_A-Za-z0-9]+){2,}$").ok());

pub const PERMISSION_ID: IdScheme<2> = IdScheme::new("/", ["<event-bus-name>", "<statement-id>"])
    .with_default_leading(DEFAULT_EVENT_BUS_NAME);

pub const RULE_ID: IdScheme<2> = IdScheme::new("/", ["<event-bus-name>", "<rule-name>"])
    .with_default_leading(DEFAULT_EVENT_BUS_NAME);

pub const TARGET_IMPORT_ID: IdScheme<3> =
    IdScheme::new("/", ["<event-bus-name>", "<rule-name>", "<target-id>"])
        .with_default_leading(DEFAULT_EVENT_BUS_NAME);

/// Separator of target identifiers kept in state; also valid inside rule
/// names and target IDs, so these identifiers are never parsed
const TARGET_ID_SEPARATOR: &str = "-";

pub fn is_partner_event_bus(name: &str) -> bool {
    PARTNER_EVENT_BUS_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Format errors quote the offending identifier
fn quoted(err: IdError) -> IdError {
    match err {
        IdError::UnexpectedFormat { id, expected } => IdError::UnexpectedFormat {
            id: format!("{:?}", id),
            expected,
        },
        other => other,
    }
}

pub fn permission_create_id(event_bus_name: &str, statement_id: &str) -> Result<String, IdError> {
    PERMISSION_ID.create([event_bus_name, statement_id])
}

/// Returns `(event_bus_name, statement_id)`
pub fn permission_parse_id(id: &str) -> Result<(String, String), IdError> {
    let [event_bus_name, statement_id] = PERMISSION_ID.parse(id).map_err(quoted)?;
    Ok((event_bus_name, statement_id))
}

pub fn rule_create_id(event_bus_name: &str, rule_name: &str) -> Result<String, IdError> {
    if is_partner_event_bus(event_bus_name) {
        // Validates the rule name alone
        let rule = RULE_ID.create([DEFAULT_EVENT_BUS_NAME, rule_name])?;
        return Ok(format!("{}{}{}", event_bus_name, RULE_ID.separator(), rule));
    }
    RULE_ID.create([event_bus_name, rule_name])
}

/// Returns `(event_bus_name, rule_name)`
pub fn rule_parse_id(id: &str) -> Result<(String, String), IdError> {
    match RULE_ID.parse(id) {
        Ok([event_bus_name, rule_name]) => Ok((event_bus_name, rule_name)),
        Err(err) => {
            if let Some((event_bus_name, rule_name)) = id.rsplit_once(RULE_ID.separator())
                && !rule_name.is_empty()
                && is_partner_event_bus(event_bus_name)
            {
                return Ok((event_bus_name.to_string(), rule_name.to_string()));
            }
            Err(quoted(err))
        }
    }
}

/// Identifier of a target as kept in state
pub fn target_create_id(event_bus_name: &str, rule_name: &str, target_id: &str) -> String {
    let id = format!("{}{}{}", rule_name, TARGET_ID_SEPARATOR, target_id);
    if event_bus_name.is_empty() || event_bus_name == DEFAULT_EVENT_BUS_NAME {
        return id;
    }
    format!("{}{}{}", event_bus_name, TARGET_ID_SEPARATOR, id)
}

/// Parse a target import identifier into `(event_bus_name, rule_name, target_id)`
pub fn target_parse_import_id(id: &str) -> Result<(String, String, String), IdError> {
    match TARGET_IMPORT_ID.parse(id) {
        Ok([event_bus_name, rule_name, target_id]) => Ok((event_bus_name, rule_name, target_id)),
        Err(err) => {
            let separator = TARGET_IMPORT_ID.separator();
            if let Some((rest, target_id)) = id.rsplit_once(separator)
                && let Some((event_bus_name, rule_name)) = rest.rsplit_once(separator)
                && !rule_name.is_empty()
                && !target_id.is_empty()
                && is_partner_event_bus(event_bus_name)
            {
                return Ok((
                    event_bus_name.to_string(),
                    rule_name.to_string(),
                    target_id.to_string(),
                ));
            }
            Err(quoted(err))
        }
    }
}
