// Configuration validation
//
// Validates that required fields are present and values are sensible before
// any storage is touched

use crate::*;
use anyhow::{bail, Context, Result};
use logrollup_core::{check_disjoint, parse_location};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_rollup_config(&config.rollup)?;
    validate_retry_config(&config.retry)?;
    validate_storage_config(&config.storage)?;
    validate_log_config(&config.log)?;
    Ok(())
}

fn validate_rollup_config(config: &RollupConfig) -> Result<()> {
    if config.source.trim().is_empty() {
        bail!("rollup.source is required (set LOGROLLUP_SOURCE or 'source')");
    }
    if config.dest.trim().is_empty() {
        bail!("rollup.dest is required (set LOGROLLUP_DEST or 'dest')");
    }

    let source = parse_location(&config.source).context("Invalid rollup.source")?;
    let dest = parse_location(&config.dest).context("Invalid rollup.dest")?;
    check_disjoint(&source, &dest).context("rollup.dest must not lie within rollup.source")?;

    if config.concurrency == 0 {
        bail!("rollup.concurrency must be greater than 0");
    }

    if config.concurrency > 64 {
        warn!(
            concurrency = config.concurrency,
            "rollup.concurrency is very large; each group buffers its merged content in memory"
        );
    }

    Ok(())
}

fn validate_retry_config(config: &RetryPolicy) -> Result<()> {
    if config.max_attempts == 0 {
        bail!("retry.max_attempts must be greater than 0");
    }

    if config.base_delay_ms > config.max_delay_ms {
        warn!(
            base_delay_ms = config.base_delay_ms,
            max_delay_ms = config.max_delay_ms,
            "retry.base_delay_ms exceeds retry.max_delay_ms; every retry waits max_delay_ms"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.root.is_empty() {
                bail!("storage.fs.root must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.region.is_empty() {
                bail!("storage.s3.region is required for S3 backend");
            }

            if let Some(endpoint) = &s3.endpoint {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    bail!("storage.s3.endpoint must be an http(s) URL, got '{}'", endpoint);
                }
            }
        }
    }

    Ok(())
}

fn validate_log_config(config: &LogConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }
    Ok(())
}
