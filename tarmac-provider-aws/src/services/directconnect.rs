//! Direct Connect

/// Identifier of a Direct Connect gateway association.
///
/// The two gateway IDs are concatenated without a separator, so the
/// identifier cannot be parsed back; reads look the association up by the
/// gateway IDs kept in state instead.
pub fn gateway_association_create_id(dx_gateway_id: &str, associated_gateway_id: &str) -> String {
    format!("ga-{}{}", dx_gateway_id, associated_gateway_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_association_id() {
        assert_eq!(
            gateway_association_create_id("5f294f92-bafb-4011-916d-9b0bexample", "vgw-0123"),
            "ga-5f294f92-bafb-4011-916d-9b0bexamplevgw-0123"
        );
    }
}
