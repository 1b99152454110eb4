use std::sync::Arc;

use chrono::Utc;
use stratus_credentials::credentials::{AccountCredentials, ComputeVersion, JsonKey};
use stratus_credentials::naming::DefaultNamingStrategy;

/// Minimal validated credentials for unit tests.
pub(crate) fn credentials_fixture(
    name: &str,
    project: &str,
    regions: &[&str],
) -> Arc<AccountCredentials> {
    Arc::new(AccountCredentials {
        name: name.into(),
        environment: name.into(),
        account_type: name.into(),
        project: project.into(),
        compute_version: ComputeVersion::Default,
        json_key: JsonKey::parse(br#"{"project_id":"test"}"#.to_vec())
            .expect("fixture key is valid JSON"),
        service_account_id: None,
        service_account_project: None,
        image_projects: Vec::new(),
        user_data_file: None,
        regions: regions.iter().map(|r| r.to_string()).collect(),
        namer: Arc::new(DefaultNamingStrategy),
        parsed_at: Utc::now(),
    })
}
