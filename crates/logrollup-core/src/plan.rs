//! Rollup planning
//!
//! A single listing pass over the source prefix produces the full plan:
//! destination key -> source objects, in lexicographic key order. Sorting the
//! listing pins the concatenation order, so two runs over the same objects
//! produce byte-identical destinations regardless of the store's listing order.

use crate::bucket::{build_destination_key, format_destination_suffix, Granularity};
use crate::error::{KeyError, Result};
use crate::key::{
    check_disjoint, extract_time_bucket, parse_location, split_relative_path, BucketParts,
    StoreLocation,
};
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What to do with a source object whose key cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseFailurePolicy {
    /// Leave the object in place, record it, and keep planning
    #[default]
    Skip,
    /// Fail the whole plan on the first unparsable key
    Abort,
}

impl fmt::Display for ParseFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailurePolicy::Skip => f.write_str("skip"),
            ParseFailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for ParseFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ParseFailurePolicy::Skip),
            "abort" | "strict" => Ok(ParseFailurePolicy::Abort),
            other => Err(format!(
                "unknown parse failure policy '{}' (supported: skip, abort)",
                other
            )),
        }
    }
}

/// Source objects that roll up into one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupGroup {
    pub destination: StoreLocation,
    pub sources: Vec<StoreLocation>,
}

/// A source object left out of the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub location: StoreLocation,
    pub error: KeyError,
}

/// Everything one run will do, built once and consumed once
#[derive(Debug, Clone, Default)]
pub struct RollupPlan {
    groups: BTreeMap<String, RollupGroup>,
    source_count: usize,
    skipped: Vec<SkippedObject>,
}

impl RollupPlan {
    /// Groups ordered by destination key
    pub fn groups(&self) -> impl Iterator<Item = &RollupGroup> {
        self.groups.values()
    }

    pub fn group(&self, destination: &str) -> Option<&RollupGroup> {
        self.groups.get(destination)
    }

    /// Number of destination groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of source objects assigned to a group
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn skipped(&self) -> &[SkippedObject] {
        &self.skipped
    }

    /// Destination -> ordered source keys, both as `container/path`.
    pub fn to_report(&self) -> BTreeMap<String, Vec<String>> {
        self.groups
            .iter()
            .map(|(dest, group)| {
                let sources = group.sources.iter().map(ToString::to_string).collect();
                (dest.clone(), sources)
            })
            .collect()
    }

    fn push(&mut self, destination: StoreLocation, source: StoreLocation) {
        self.groups
            .entry(destination.to_string())
            .or_insert_with(|| RollupGroup {
                destination,
                sources: Vec::new(),
            })
            .sources
            .push(source);
        self.source_count += 1;
    }
}

/// Compute the destination for one source key.
pub fn assign_destination(
    granularity: Granularity,
    source: &BucketParts,
    dest: &BucketParts,
    key: &str,
) -> std::result::Result<StoreLocation, KeyError> {
    let (sub_prefix, filename) = split_relative_path(&source.prefix, key)?;
    let bucket = extract_time_bucket(&filename)?;
    let suffix = format_destination_suffix(granularity, &bucket);
    let path = build_destination_key(&dest.prefix, &sub_prefix, &suffix);
    Ok(StoreLocation::new(dest.container.clone(), path))
}

/// Build a plan from already-listed source keys.
///
/// Keys are sorted before grouping, so each group's sources are in
/// lexicographic order. A listed key that is itself one of the planned
/// destinations is never taken as a source.
pub fn plan_keys(
    granularity: Granularity,
    source: &BucketParts,
    dest: &BucketParts,
    mut keys: Vec<String>,
    on_parse_error: ParseFailurePolicy,
) -> Result<RollupPlan> {
    keys.sort();

    let mut plan = RollupPlan::default();
    let mut assigned = Vec::with_capacity(keys.len());
    for key in keys {
        let location = StoreLocation::new(source.container.clone(), key);
        match assign_destination(granularity, source, dest, &location.path) {
            Ok(destination) => assigned.push((destination, location)),
            Err(error) => match on_parse_error {
                ParseFailurePolicy::Abort => return Err(error.into()),
                ParseFailurePolicy::Skip => {
                    warn!(source = %location, error = %error, "Skipping object with unparsable key");
                    plan.skipped.push(SkippedObject { location, error });
                }
            },
        }
    }

    let destinations: HashSet<StoreLocation> =
        assigned.iter().map(|(destination, _)| destination.clone()).collect();
    for (destination, location) in assigned {
        if destinations.contains(&location) {
            warn!(source = %location, "Listed object is a rollup destination, not a source");
            continue;
        }
        plan.push(destination, location);
    }

    for group in plan.groups() {
        debug!(
            destination = %group.destination,
            sources = group.sources.len(),
            "Rollup group formed"
        );
    }

    Ok(plan)
}

/// List the source prefix and build the rollup plan.
pub async fn build_plan(
    store: &dyn ObjectStore,
    granularity: Granularity,
    source_location: &str,
    dest_location: &str,
    on_parse_error: ParseFailurePolicy,
) -> Result<RollupPlan> {
    let source = parse_location(source_location)?;
    let dest = parse_location(dest_location)?;
    check_disjoint(&source, &dest)?;
    info!(container = %source.container, prefix = %source.prefix, "Source parts");
    info!(container = %dest.container, prefix = %dest.prefix, "Dest parts");

    let keys = store.list(&source.container, &source.prefix).await?;
    info!(listed = keys.len(), "Listed source objects");

    let plan = plan_keys(granularity, &source, &dest, keys, on_parse_error)?;
    info!(
        granularity = %granularity,
        source_objects = plan.source_count(),
        rollup_groups = plan.len(),
        skipped_objects = plan.skipped().len(),
        "Rollup plan built"
    );

    Ok(plan)
}
