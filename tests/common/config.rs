//! Test configuration helpers pointing a synchronizer at a mock server

use std::sync::Arc;

use edelstein_assets::{
    AssetSynchronizer, Collaborators, Config, FixedDecision, PlatformSelection, RecoveryDecision,
};
use tempfile::TempDir;

use super::fixtures::JsonContainerReader;

/// Config for one platform, with all hosts pointing at `server_uri`
pub fn mock_config(server_uri: &str, root: &TempDir) -> Config {
    let host = server_uri
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string();
    Config {
        assets_host: Some(host.clone()),
        api_host: Some(host),
        plain_http: true,
        manifests_dir: root.path().join("manifests"),
        download_dir: root.path().join("assets"),
        parallel_downloads: 4,
        platforms: PlatformSelection {
            android: true,
            ios: false,
        },
        ..Default::default()
    }
}

/// Synchronizer with plaintext collaborators and a fixed recovery decision
pub fn synchronizer(config: Config, decision: RecoveryDecision) -> AssetSynchronizer {
    let mut collaborators = Collaborators::plaintext(Arc::new(JsonContainerReader));
    collaborators.recovery = Some(Arc::new(FixedDecision(decision)));
    match AssetSynchronizer::new(config, collaborators) {
        Ok(sync) => sync,
        Err(e) => panic!("failed to build synchronizer: {}", e),
    }
}
