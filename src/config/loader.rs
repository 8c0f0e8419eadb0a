//! Configuration loading with layered precedence.
//!
//! Layers are composed manually with `MergeComposer` rather than through the
//! derive's `load()`, because `OrthoConfig`'s environment layer silently
//! ignores unparseable values. This loader reads `TOCKER_*` variables through
//! a [`mockable::Env`] and fails fast when a typed value does not parse, so a
//! misconfigured CI job reports an error instead of quietly running with
//! defaults.
//!
//! String fields (e.g. `TOCKER_ENGINE_SOCKET`) are always accepted. Typed
//! fields such as `TOCKER_ENGINE_VERIFY_ON_CONNECT` or
//! `TOCKER_LIVENESS_MAX_ATTEMPTS` must hold valid values.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::TockerConfig;
use crate::error::{ConfigError, Result};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "TOCKER_CONFIG_PATH";

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`).
    Bool,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name.
    env_var: &'static str,
    /// The JSON path segments (e.g. `["liveness", "delay_ms"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "TOCKER_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "TOCKER_ENGINE_VERIFY_ON_CONNECT",
        path: &["engine", "verify_on_connect"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "TOCKER_LIVENESS_MAX_ATTEMPTS",
        path: &["liveness", "max_attempts"],
        var_type: EnvVarType::U32,
    },
    EnvVarSpec {
        env_var: "TOCKER_LIVENESS_DELAY_MS",
        path: &["liveness", "delay_ms"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "TOCKER_LIVENESS_DEADLINE_MS",
        path: &["liveness", "deadline_ms"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "TOCKER_PORTS_HOST_IP",
        path: &["ports", "host_ip"],
        var_type: EnvVarType::String,
    },
];

/// Returns the environment variable names recognised by the loader.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a TOML configuration file through `cap_std` and push it as a layer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Pick the configuration file to load, if any.
///
/// An explicit path wins and must exist. Otherwise `TOCKER_CONFIG_PATH` is
/// consulted, then the standard discovery locations.
fn resolve_config_path<E: mockable::Env>(
    env: &E,
    explicit_path: Option<&Utf8Path>,
) -> Option<Utf8PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env
        .string(CONFIG_PATH_ENV_VAR)
        .filter(|value| !value.is_empty())
    {
        return Some(Utf8PathBuf::from(path));
    }

    ConfigDiscovery::builder("tocker")
        .config_file_name("config.toml")
        .dotfile_name(".tocker.toml")
        .build()
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok())
}

/// Load configuration with full layer precedence.
///
/// Sources, lowest to highest precedence:
/// 1. Defaults defined on the structs
/// 2. A configuration file (see [`TockerConfig`] for discovery order)
/// 3. `TOCKER_*` environment variables read from `env`
///
/// The merged result is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for unreadable or malformed files,
/// `ConfigError::InvalidValue` for unparseable typed environment values and
/// failed validation, and `ConfigError::OrthoConfig` when layers cannot be
/// merged.
pub fn load_config<E: mockable::Env>(
    env: &E,
    explicit_path: Option<&Utf8Path>,
) -> Result<TockerConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(TockerConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = resolve_config_path(env, explicit_path) {
        tracing::debug!(path = %path, "loading configuration file");
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let mut config =
        TockerConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.normalise();
    config.validate()?;
    Ok(config)
}

/// Collect `TOCKER_*` environment variables into a JSON value.
///
/// Returns `Value::Null` when none are set.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };
        let json_value = parse_env_value(spec, raw_value)?;
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn parse_env_value(spec: &EnvVarSpec, raw_value: String) -> Result<Value> {
    let invalid = |expected: &str, raw: &str| ConfigError::InvalidValue {
        field: String::from(spec.env_var),
        reason: format!("expected {expected}, got '{raw}'"),
    };

    let value = match spec.var_type {
        EnvVarType::String => Value::String(raw_value),
        EnvVarType::Bool => raw_value
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid("bool (true/false)", &raw_value))?,
        EnvVarType::U32 => raw_value
            .parse::<u32>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid("unsigned 32-bit integer", &raw_value))?,
        EnvVarType::U64 => raw_value
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid("unsigned integer", &raw_value))?,
    };
    Ok(value)
}

/// Insert a value at a nested path in a JSON map, creating parents.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(String::from(segment))
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(String::from(field), value);
}
