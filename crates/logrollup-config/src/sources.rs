// Configuration source loading.
//
// Priority order:
// 1. Environment variables (LOGROLLUP_* prefix, then legacy names)
// 2. Config file path from LOGROLLUP_CONFIG
// 3. Inline config content from LOGROLLUP_CONFIG_CONTENT
// 4. Default config files (./logrollup.toml, ./.logrollup.toml)
// 5. Platform defaults (based on auto-detected Platform)

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::platform::Platform;
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing::debug;

const DEFAULT_CONFIG_PATHS: &[&str] = &["./logrollup.toml", "./.logrollup.toml"];

/// Load and validate configuration for `platform`.
pub fn load_config<E: EnvSource>(platform: Platform, env: &E) -> Result<RuntimeConfig> {
    let config = load_or_default(platform, env)?;
    config.validate()?;
    Ok(config)
}

/// Layer defaults, the first config file found and env overrides, without
/// validating.
pub fn load_or_default<E: EnvSource>(platform: Platform, env: &E) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_platform_defaults(platform);

    if let Some(file_config) = load_from_file(env)? {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<RuntimeConfig>> {
    if let Some(path) = env.get("CONFIG") {
        debug!(path = %path, "Loading config file from {}CONFIG", ENV_PREFIX);
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from LOGROLLUP_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            debug!(path = %path.display(), "Loading default config file");
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
///
/// Returns error if file doesn't exist or can't be parsed. The file replaces
/// the LOGROLLUP_CONFIG / default file lookup; platform defaults and env
/// overrides still apply. The result is not validated, so callers can layer
/// CLI flags first.
pub fn load_from_file_path<E: EnvSource>(
    path: impl AsRef<Path>,
    platform: Platform,
    env: &E,
) -> Result<RuntimeConfig> {
    let file_config = read_config_file(path.as_ref())?;

    let mut config = RuntimeConfig::from_platform_defaults(platform);
    config.merge(file_config);

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

/// Reads the process environment
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}
