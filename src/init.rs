// Initialization utilities shared by the CLI and Lambda binaries
//
// Storage operators and logging/tracing setup

use anyhow::{anyhow, Result};
use logrollup_config::{LogFormat, RuntimeConfig, StorageBackend, StorageConfig};
use logrollup_core::opendal::{services, Operator};
use logrollup_core::{parse_location, OpenDalStore};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Containers a run touches: the source and destination containers
pub fn run_containers(config: &RuntimeConfig) -> Result<BTreeSet<String>> {
    let source = parse_location(&config.rollup.source)?;
    let dest = parse_location(&config.rollup.dest)?;
    Ok([source.container, dest.container].into_iter().collect())
}

/// Build a store with one operator per container the run touches
pub fn init_store(config: &RuntimeConfig) -> Result<OpenDalStore> {
    info!(
        "Initializing storage with backend: {}",
        config.storage.backend
    );

    let mut store = OpenDalStore::new(config.retry);
    for container in run_containers(config)? {
        let operator = build_operator(&config.storage, &container)?;
        store = store.with_container(container, operator);
    }
    Ok(store)
}

/// Create the OpenDAL operator serving one container
pub fn build_operator(storage: &StorageConfig, container: &str) -> Result<Operator> {
    match storage.backend {
        StorageBackend::Fs => {
            let fs = storage
                .fs
                .as_ref()
                .ok_or_else(|| anyhow!("fs config required for filesystem backend"))?;
            let root = Path::new(&fs.root).join(container);
            info!("Using filesystem storage at: {}", root.display());

            let fs_builder = services::Fs::default().root(&root.to_string_lossy());
            Ok(Operator::new(fs_builder)?.finish())
        }
        StorageBackend::S3 => {
            let s3 = storage
                .s3
                .as_ref()
                .ok_or_else(|| anyhow!("s3 config required for S3 backend"))?;
            info!(
                "Using S3 storage: bucket={}, region={}",
                container, s3.region
            );

            // Credentials come from OpenDAL's default chain (IAM role, env, profile)
            let mut s3_builder = services::S3::default().bucket(container).region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }

            Ok(Operator::new(s3_builder)?.finish())
        }
    }
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries command output such as the plan report
    match config.log.format() {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry.with(fmt::layer().with_writer(std::io::stderr)).init();
        }
    }
}
