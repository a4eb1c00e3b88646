//! Amplify - Identifiers of app-scoped resources

use tarmac_core::id::{IdError, IdScheme};

pub const BACKEND_ENVIRONMENT_ID: IdScheme<2> = IdScheme::new("/", ["APPID", "ENVIRONMENTNAME"]);

/// Branch names may contain `/`, so everything after the first separator is the branch
pub const BRANCH_ID: IdScheme<2> = IdScheme::new("/", ["APPID", "BRANCHNAME"]).remainder_in_last();

pub const DOMAIN_ASSOCIATION_ID: IdScheme<2> = IdScheme::new("/", ["APPID", "DOMAINNAME"]);

pub fn branch_create_id(app_id: &str, branch_name: &str) -> Result<String, IdError> {
    BRANCH_ID.create([app_id, branch_name])
}

/// Returns `(app_id, branch_name)`
pub fn branch_parse_id(id: &str) -> Result<(String, String), IdError> {
    let [app_id, branch_name] = BRANCH_ID.parse(id)?;
    Ok((app_id, branch_name))
}
