use crate::{FsConfig, LogFormat, RuntimeConfig, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};
use logrollup_core::{Granularity, ParseFailurePolicy};

pub const ENV_PREFIX: &str = "LOGROLLUP_";

/// Abstraction over environment-variable lookups so tests and embedding
/// runtimes can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the LOGROLLUP_ prefix
    /// Used for legacy names (`source`, `dest`, ...) and AWS standard variables
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the runtime config.
///
/// Where a legacy unprefixed name exists, the prefixed form wins when both are
/// set.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Rollup locations and granularity
    if let Some(source) = first_string(env, "SOURCE", "source") {
        config.rollup.source = source;
    }
    if let Some(dest) = first_string(env, "DEST", "dest") {
        config.rollup.dest = dest;
    }
    if let Some(level) = first_string(env, "GRANULARITY", "level") {
        config.rollup.granularity = level
            .parse::<Granularity>()
            .context("Invalid LOGROLLUP_GRANULARITY value")?;
    }
    if let Some(val) = get_env_usize(env, "CONCURRENCY")? {
        config.rollup.concurrency = val;
    }
    if let Some(policy) = get_env_string(env, "ON_PARSE_ERROR") {
        config.rollup.on_parse_error = policy
            .parse::<ParseFailurePolicy>()
            .map_err(|e| anyhow!("Invalid {}ON_PARSE_ERROR value: {}", ENV_PREFIX, e))?;
    }

    // Execution policy
    if let Some(val) = get_flag(env, "KEEP", "debug_keep")? {
        config.policy.keep = val;
    }
    if let Some(val) = get_flag(env, "DRYRUN", "debug_dryrun")? {
        config.policy.dryrun = val;
    }
    if let Some(val) = get_flag(env, "OVERWRITE", "debug_overwrite")? {
        config.policy.overwrite = val;
    }
    if let Some(list) = get_env_string(env, "DEBUG") {
        config.apply_debug_flags(&list);
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid LOGROLLUP_STORAGE_BACKEND value")?;
    }

    // Filesystem storage
    if let Some(root) = get_env_string(env, "STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).root = root;
    }

    // S3 storage; AWS standard names without prefix for compatibility
    if let Some(region) = env.get_raw("AWS_REGION") {
        ensure_s3(config).region = region;
    }
    if let Some(region) = get_env_string(env, "S3_REGION") {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = env.get_raw("AWS_ENDPOINT_URL") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }

    // Retry
    if let Some(val) = get_env_u32(env, "RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = val;
    }
    if let Some(val) = get_env_u64(env, "RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = val;
    }
    if let Some(val) = get_env_u64(env, "RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = Some(
            format
                .parse::<LogFormat>()
                .context("Invalid LOGROLLUP_LOG_FORMAT value")?,
        );
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

/// Prefixed value, falling back to the legacy unprefixed name
fn first_string<E: EnvSource>(env: &E, key: &str, legacy: &str) -> Option<String> {
    env.get(key).or_else(|| env.get_raw(legacy))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Boolean flag from the prefixed name, else the legacy name
fn get_flag<E: EnvSource>(env: &E, key: &str, legacy: &str) -> Result<Option<bool>> {
    if let Some(val) = env.get(key) {
        return parse_bool(&val)
            .map(Some)
            .ok_or_else(|| anyhow!("Failed to parse {}{} (expected bool): '{}'", ENV_PREFIX, key, val));
    }
    if let Some(val) = env.get_raw(legacy) {
        return parse_bool(&val)
            .map(Some)
            .ok_or_else(|| anyhow!("Failed to parse {} (expected bool): '{}'", legacy, val));
    }
    Ok(None)
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapEnv;
    use crate::Platform;

    fn apply(env: &MapEnv) -> Result<RuntimeConfig> {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Cli);
        apply_env_overrides(&mut config, env)?;
        Ok(config)
    }

    #[test]
    fn test_legacy_names() {
        let env = MapEnv::default()
            .with("source", "s3://logs/raw/")
            .with("dest", "s3://logs/rolled/")
            .with("level", "day")
            .with("debug_keep", "true")
            .with("debug_dryrun", "0");
        let config = apply(&env).unwrap();

        assert_eq!(config.rollup.source, "s3://logs/raw/");
        assert_eq!(config.rollup.dest, "s3://logs/rolled/");
        assert_eq!(config.rollup.granularity, Granularity::Day);
        assert!(config.policy.keep);
        assert!(!config.policy.dryrun);
        assert!(!config.policy.overwrite);
    }

    #[test]
    fn test_prefixed_names_win_over_legacy() {
        let env = MapEnv::default()
            .with("source", "legacy/raw")
            .with("LOGROLLUP_SOURCE", "modern/raw")
            .with("level", "day")
            .with("LOGROLLUP_GRANULARITY", "month")
            .with("debug_overwrite", "yes")
            .with("LOGROLLUP_OVERWRITE", "off");
        let config = apply(&env).unwrap();

        assert_eq!(config.rollup.source, "modern/raw");
        assert_eq!(config.rollup.granularity, Granularity::Month);
        assert!(!config.policy.overwrite);
    }

    #[test]
    fn test_bool_values() {
        for (val, expected) in [
            ("1", true),
            ("TRUE", true),
            ("Yes", true),
            ("on", true),
            ("0", false),
            ("false", false),
            ("NO", false),
            ("off", false),
        ] {
            assert_eq!(parse_bool(val), Some(expected), "{val}");
        }
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_bool("maybe"), None);

        let env = MapEnv::default().with("debug_dryrun", "maybe");
        let err = apply(&env).unwrap_err();
        assert!(err.to_string().contains("debug_dryrun"));
    }

    #[test]
    fn test_debug_flag_list() {
        let env = MapEnv::default().with("LOGROLLUP_DEBUG", "keep:overwrite");
        let config = apply(&env).unwrap();
        assert!(config.policy.keep);
        assert!(config.policy.overwrite);
        assert!(!config.policy.dryrun);
    }

    #[test]
    fn test_invalid_values() {
        let env = MapEnv::default().with("level", "fortnight");
        assert!(apply(&env).is_err());

        let env = MapEnv::default().with("LOGROLLUP_CONCURRENCY", "many");
        let err = apply(&env).unwrap_err();
        assert!(err.to_string().contains("LOGROLLUP_CONCURRENCY"));

        let env = MapEnv::default().with("LOGROLLUP_ON_PARSE_ERROR", "ignore");
        assert!(apply(&env).is_err());

        let env = MapEnv::default().with("LOGROLLUP_STORAGE_BACKEND", "gcs");
        assert!(apply(&env).is_err());
    }

    #[test]
    fn test_storage_and_retry_overrides() {
        let env = MapEnv::default()
            .with("AWS_REGION", "eu-central-1")
            .with("LOGROLLUP_S3_ENDPOINT", "http://localhost:9000")
            .with("LOGROLLUP_RETRY_MAX_ATTEMPTS", "7")
            .with("LOGROLLUP_CONCURRENCY", "8")
            .with("LOGROLLUP_ON_PARSE_ERROR", "abort")
            .with("LOGROLLUP_LOG_FORMAT", "json");
        let config = apply(&env).unwrap();

        let s3 = config.storage.s3.as_ref().unwrap();
        assert_eq!(s3.region, "eu-central-1");
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.rollup.concurrency, 8);
        assert_eq!(config.rollup.on_parse_error, ParseFailurePolicy::Abort);
        assert_eq!(config.log.format(), LogFormat::Json);

        let env = MapEnv::default()
            .with("LOGROLLUP_STORAGE_BACKEND", "fs")
            .with("LOGROLLUP_STORAGE_PATH", "/var/lib/logs");
        let config = apply(&env).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.fs.as_ref().unwrap().root, "/var/lib/logs");
    }
}
