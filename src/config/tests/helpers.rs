//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use mockable::MockEnv;
use ortho_config::MergeComposer;
use rstest::fixture;

use crate::config::TockerConfig;

/// Fixture providing a `TockerConfig` parsed from a full TOML example.
#[fixture]
pub fn config_from_full_toml() -> TockerConfig {
    let toml = r#"
        engine_socket = "tcp://docker.ci.internal:2375"

        [engine]
        verify_on_connect = false

        [liveness]
        max_attempts = 120
        delay_ms = 250
        deadline_ms = 60000

        [ports]
        host_ip = "127.0.0.1"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Builds a `MockEnv` that answers from a fixed table of variables.
pub fn env_with(vars: &[(&str, &str)]) -> MockEnv {
    let owned_vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (String::from(*k), String::from(*v)))
        .collect();
    let mut env = MockEnv::new();
    env.expect_string().returning(move |key| {
        owned_vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    });
    env
}

/// Helper: Creates a `MergeComposer` with the defaults layer pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, ortho_config::serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(TockerConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `TockerConfig`.
pub fn merge_config(
    composer: MergeComposer,
) -> Result<TockerConfig, Arc<ortho_config::OrthoError>> {
    TockerConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts every field holds its default.
pub fn assert_config_has_defaults(config: &TockerConfig) {
    assert!(config.engine_socket.is_none(), "engine_socket should be None");
    assert!(config.engine.verify_on_connect, "verify_on_connect should default on");
    assert_eq!(config.liveness.max_attempts, 50);
    assert_eq!(config.liveness.delay_ms, 10);
    assert_eq!(config.liveness.deadline_ms, None);
    assert_eq!(config.ports.host_ip, "0.0.0.0");
}
