// logrollup - roll small timestamped log objects up into time-bucketed aggregates
//
// Wires a resolved RuntimeConfig to the rollup engine. The CLI and Lambda
// binaries share these entry points; they differ only in how configuration
// and debug flags arrive.

use anyhow::{Context, Result};
use logrollup_config::RuntimeConfig;
use logrollup_core::{build_plan, execute_plan, ObjectStore, RollupPlan, RunSummary};
use tracing::info;

pub mod init;

pub use init::{build_operator, init_store, init_tracing, run_containers};

fn log_resolved_config(config: &RuntimeConfig) {
    info!(
        source = %config.rollup.source,
        dest = %config.rollup.dest,
        granularity = %config.rollup.granularity,
        concurrency = config.rollup.concurrency,
        on_parse_error = %config.rollup.on_parse_error,
        keep = config.policy.keep,
        dryrun = config.policy.dryrun,
        overwrite = config.policy.overwrite,
        backend = %config.storage.backend,
        "Resolved configuration"
    );
}

async fn plan(store: &dyn ObjectStore, config: &RuntimeConfig) -> Result<RollupPlan> {
    let plan = build_plan(
        store,
        config.rollup.granularity,
        &config.rollup.source,
        &config.rollup.dest,
        config.rollup.on_parse_error,
    )
    .await?;
    Ok(plan)
}

/// Plan and execute one rollup run.
///
/// Failed groups surface as a `RollupError::GroupsFailed` inside the returned
/// error; groups that succeeded stay committed.
pub async fn run_rollup(store: &dyn ObjectStore, config: &RuntimeConfig) -> Result<RunSummary> {
    log_resolved_config(config);

    let plan = plan(store, config).await?;
    let summary = execute_plan(store, &plan, config.policy, config.rollup.concurrency).await?;
    Ok(summary)
}

/// Build the plan without reading or modifying any object and render it as
/// pretty JSON: destination -> ordered source keys.
pub async fn plan_report(store: &dyn ObjectStore, config: &RuntimeConfig) -> Result<String> {
    log_resolved_config(config);

    let plan = plan(store, config).await?;
    serde_json::to_string_pretty(&plan.to_report()).context("Failed to render rollup plan")
}
