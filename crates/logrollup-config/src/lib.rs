// logrollup-config - Layered configuration for the CLI and Lambda runtimes
//
// Supports configuration from multiple sources:
// 1. Debug flag list (Lambda event payload or CLI --debug), highest priority
// 2. Environment variables (LOGROLLUP_* plus the legacy unprefixed names)
// 3. Config file path from LOGROLLUP_CONFIG env var
// 4. Config file contents from LOGROLLUP_CONFIG_CONTENT env var
// 5. Default config file locations (./logrollup.toml, ./.logrollup.toml)
// 6. Platform-specific defaults (lowest priority)

use anyhow::Result;
use logrollup_core::{ExecutionPolicy, Granularity, ParseFailurePolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::warn;

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults};
pub use sources::StdEnvSource;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub rollup: RollupConfig,

    #[serde(default)]
    pub policy: ExecutionPolicy,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub log: LogConfig,
}

/// What to roll up and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// `[scheme://]container[/prefix]` holding the small source objects
    #[serde(default)]
    pub source: String,
    /// `[scheme://]container[/prefix]` receiving the rolled-up objects
    #[serde(default)]
    pub dest: String,
    #[serde(default)]
    pub granularity: Granularity,
    /// Destination groups processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub on_parse_error: ParseFailurePolicy,
}

fn default_concurrency() -> usize {
    1
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            dest: String::new(),
            granularity: Granularity::default(),
            concurrency: default_concurrency(),
            on_parse_error: ParseFailurePolicy::default(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            s3: Some(S3Config::default()),
            fs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

/// S3 or S3-compatible object storage. The bucket is the container named in
/// the source and destination locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
        }
    }
}

/// Local filesystem storage. Each container is a directory under `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub root: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: "./data".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `logrollup_core=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Unset means the platform default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

impl LogConfig {
    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or(LogFormat::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config(Platform::detect(), &StdEnvSource)
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform, &StdEnvSource)
    }

    /// Load configuration using a custom environment source
    pub fn load_with_env<E: EnvSource>(platform: Platform, env: &E) -> Result<Self> {
        sources::load_config(platform, env)
    }

    /// Load configuration from a specific file path (for CLI --config flag).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path, Platform::detect(), &StdEnvSource)
    }

    /// Load configuration without validating it.
    ///
    /// For callers that layer further overrides (CLI flags) before calling
    /// [`RuntimeConfig::validate`] themselves.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default(Platform::detect(), &StdEnvSource)
    }

    /// Construct a config that contains only platform defaults (no env or files).
    pub fn from_platform_defaults(platform: Platform) -> Self {
        platform_defaults(platform)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.rollup = other.rollup;
        self.policy = other.policy;
        self.storage = other.storage;
        self.retry = other.retry;

        self.log.level = other.log.level;
        if other.log.format.is_some() {
            self.log.format = other.log.format;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Switch on execution flags from a colon-separated list (`keep:dryrun:overwrite`).
    ///
    /// Unknown flags are logged and ignored.
    pub fn apply_debug_flags(&mut self, list: &str) {
        for flag in self.policy.apply_flag_list(list) {
            warn!(flag = %flag, "Ignoring unknown debug flag");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

fn platform_defaults(platform: Platform) -> RuntimeConfig {
    let defaults = platform.defaults();

    // Both platforms read S3 unless configured otherwise
    RuntimeConfig {
        rollup: RollupConfig::default(),
        policy: ExecutionPolicy::default(),
        storage: StorageConfig::default(),
        retry: RetryPolicy::default(),
        log: LogConfig {
            level: default_log_level(),
            format: Some(defaults.log_format),
        },
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{EnvSource, ENV_PREFIX};
    use std::collections::HashMap;

    /// Environment backed by a map, keyed by full variable name
    #[derive(Default)]
    pub struct MapEnv(HashMap<String, String>);

    impl MapEnv {
        pub fn with(mut self, key: &str, val: &str) -> Self {
            self.0.insert(key.to_string(), val.to_string());
            self
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }
}
