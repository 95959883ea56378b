//! Merge execution
//!
//! Each destination group runs ReadExisting -> ReadSources -> Write ->
//! DeleteSources to completion. Groups are independent: a failed group is
//! recorded and the remaining groups still run. Up to `concurrency` groups are
//! in flight at once; every destination key appears in exactly one group, so
//! no two in-flight groups write the same object.

use crate::error::{GroupFailure, Result, RollupError};
use crate::key::StoreLocation;
use crate::plan::{RollupGroup, RollupPlan};
use crate::policy::ExecutionPolicy;
use crate::storage::ObjectStore;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

/// What happened to one destination group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub destination: StoreLocation,
    /// Bytes of pre-existing destination content kept in the merge
    pub prior_bytes: usize,
    /// Bytes read from source objects
    pub source_bytes: usize,
    /// Size of the merged destination (intended size under dry run)
    pub merged_bytes: usize,
    pub written: bool,
    pub sources_deleted: usize,
    pub sources_kept: usize,
}

/// Totals for a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub objects_processed: usize,
    pub objects_deleted: usize,
    pub groups_processed: usize,
    pub groups_written: usize,
    /// Bytes actually written to destinations; zero under dry run
    pub bytes_written: usize,
    pub dryrun: bool,
    pub skipped_objects: Vec<String>,
    pub outcomes: Vec<GroupOutcome>,
}

/// Read existing destination content, or start empty.
async fn read_existing(
    store: &dyn ObjectStore,
    destination: &StoreLocation,
    policy: ExecutionPolicy,
) -> Result<Bytes> {
    if policy.overwrite {
        if policy.dryrun {
            info!(destination = %destination, "Debug: dryrun: not removing existing destination");
        } else {
            info!(destination = %destination, "Debug: overwrite: removing existing destination");
            store.delete(destination).await?;
        }
        return Ok(Bytes::new());
    }

    match store.get(destination).await {
        Ok(existing) => {
            info!(
                destination = %destination,
                bytes = existing.len(),
                "Read pre-existing destination"
            );
            Ok(existing)
        }
        Err(err) if err.is_not_found() => {
            info!(destination = %destination, "Destination does not exist yet, starting empty");
            Ok(Bytes::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// Roll one group up into its destination.
#[tracing::instrument(
    name = "rollup_group",
    skip_all,
    fields(destination = %group.destination, sources = group.sources.len())
)]
pub async fn rollup_group(
    store: &dyn ObjectStore,
    group: &RollupGroup,
    policy: ExecutionPolicy,
) -> Result<GroupOutcome> {
    let existing = read_existing(store, &group.destination, policy).await?;
    let prior_bytes = existing.len();

    let mut merged = BytesMut::from(existing.as_ref());
    for source in &group.sources {
        let content = store.get(source).await?;
        merged.extend_from_slice(&content);
        info!(
            source = %source,
            bytes = content.len(),
            total_bytes = merged.len(),
            "Read source object"
        );
    }
    let merged = merged.freeze();
    let merged_bytes = merged.len();

    info!(
        destination = %group.destination,
        bytes = merged_bytes,
        "Writing rollup"
    );
    let written = if policy.writes_destination() {
        store.put(&group.destination, merged).await?;
        true
    } else {
        info!(destination = %group.destination, "Debug: dryrun: not writing destination");
        false
    };

    let mut sources_deleted = 0;
    for source in &group.sources {
        if policy.deletes_sources() {
            info!(source = %source, "Removing source object");
            store.delete(source).await?;
            sources_deleted += 1;
        } else {
            info!(source = %source, "Debug: keep/dryrun: not removing source object");
        }
    }

    Ok(GroupOutcome {
        destination: group.destination.clone(),
        prior_bytes,
        source_bytes: merged_bytes - prior_bytes,
        merged_bytes,
        written,
        sources_deleted,
        sources_kept: group.sources.len() - sources_deleted,
    })
}

/// Execute every group of the plan.
///
/// Returns the run summary when all groups succeed. Otherwise the summary is
/// still logged, and the error lists every failed group.
pub async fn execute_plan(
    store: &dyn ObjectStore,
    plan: &RollupPlan,
    policy: ExecutionPolicy,
    concurrency: usize,
) -> Result<RunSummary> {
    let results: Vec<(&RollupGroup, Result<GroupOutcome>)> = stream::iter(plan.groups())
        .map(move |group| async move { (group, rollup_group(store, group, policy).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = RunSummary {
        dryrun: policy.dryrun,
        skipped_objects: plan.skipped().iter().map(|s| s.location.to_string()).collect(),
        ..Default::default()
    };
    let mut failures = Vec::new();

    for (group, result) in results {
        match result {
            Ok(outcome) => {
                summary.objects_processed += group.sources.len();
                summary.objects_deleted += outcome.sources_deleted;
                summary.groups_processed += 1;
                if outcome.written {
                    summary.groups_written += 1;
                    summary.bytes_written += outcome.merged_bytes;
                }
                summary.outcomes.push(outcome);
            }
            Err(err) => {
                error!(destination = %group.destination, error = %err, "Rollup group failed");
                failures.push(GroupFailure {
                    destination: group.destination.to_string(),
                    error: err,
                });
            }
        }
    }
    summary
        .outcomes
        .sort_by(|a, b| a.destination.cmp(&b.destination));
    failures.sort_by(|a, b| a.destination.cmp(&b.destination));

    for skipped in &summary.skipped_objects {
        warn!(source = %skipped, "Source object was skipped and left in place");
    }

    info!(
        objects_processed = summary.objects_processed,
        objects_deleted = summary.objects_deleted,
        groups_processed = summary.groups_processed,
        groups_written = summary.groups_written,
        bytes_written = summary.bytes_written,
        skipped_objects = summary.skipped_objects.len(),
        failed_groups = failures.len(),
        dryrun = policy.dryrun,
        "Num source files processed: {}, Num rollup files updated: {}",
        summary.objects_processed,
        summary.groups_written
    );

    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(RollupError::GroupsFailed {
            total: plan.len(),
            failures,
        })
    }
}
