//! Store location and object key parsing
//!
//! Locations are written `[scheme://]container[/prefix]` (e.g. `s3://logs/raw/`).
//! Source object names must carry a `YYYY-MM-DD-HH-m` timestamp, where `m` is
//! the tens-of-minutes digit, as emitted by S3 server access logging.

use crate::error::KeyError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4})-([0-9]{2})-([0-9]{2})-([0-9]{2})-([0-9])")
        .expect("timestamp pattern is a valid regex")
});

/// Container name and normalized prefix of a configured location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketParts {
    pub container: String,
    /// No trailing slash; empty when the location names a whole container
    pub prefix: String,
}

/// One object in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StoreLocation {
    pub container: String,
    pub path: String,
}

impl StoreLocation {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }

    /// Parse a fully-qualified `[scheme://]container/key` string.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let parts = parse_location(raw)?;
        if parts.prefix.is_empty() {
            return Err(KeyError::MalformedLocation(raw.to_string()));
        }
        Ok(Self::new(parts.container, parts.prefix))
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

/// Time coordinates extracted from an object name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeBucket {
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    /// Single digit, tens of minutes
    pub ten_minute: String,
}

/// Split a configured location into container and prefix.
///
/// Any `scheme://` prefix is dropped. Trailing slashes are removed from the
/// prefix so that `bucket/logs/` and `bucket/logs` resolve identically.
pub fn parse_location(raw: &str) -> Result<BucketParts, KeyError> {
    let without_scheme = match raw.split_once("://") {
        Some((scheme, rest)) if !scheme.contains('/') => rest,
        _ => raw,
    };

    let (container, path) = without_scheme
        .split_once('/')
        .unwrap_or((without_scheme, ""));

    if container.is_empty() {
        return Err(KeyError::MalformedLocation(raw.to_string()));
    }

    Ok(BucketParts {
        container: container.to_string(),
        prefix: path.trim_end_matches('/').to_string(),
    })
}

/// Reject a destination whose keys the source listing would pick up.
///
/// Destination keys always start with `dest.prefix/` (or are anywhere in the
/// container for an empty prefix), and the source listing takes every key
/// starting with `source.prefix`.
pub fn check_disjoint(source: &BucketParts, dest: &BucketParts) -> Result<(), KeyError> {
    if source.container != dest.container {
        return Ok(());
    }
    let overlaps =
        dest.prefix.is_empty() || format!("{}/", dest.prefix).starts_with(&source.prefix);
    if overlaps {
        return Err(KeyError::OverlappingLocations {
            source_prefix: format!("{}/{}", source.container, source.prefix),
            dest_prefix: format!("{}/{}", dest.container, dest.prefix),
        });
    }
    Ok(())
}

/// Split an object key into the folders between `prefix` and the file name,
/// and the file name itself.
///
/// With prefix `logs` and key `logs/shard-1/2024-01-15-09-30-00-ABC` this
/// yields `("shard-1", "2024-01-15-09-30-00-ABC")`.
pub fn split_relative_path(prefix: &str, full_key: &str) -> Result<(String, String), KeyError> {
    let remainder = full_key
        .strip_prefix(prefix)
        .ok_or_else(|| KeyError::PrefixMismatch {
            prefix: prefix.to_string(),
            key: full_key.to_string(),
        })?;

    let (sub_prefix, filename) = match remainder.rfind('/') {
        Some(idx) => (&remainder[..idx], &remainder[idx + 1..]),
        None => ("", remainder),
    };

    Ok((sub_prefix.trim_matches('/').to_string(), filename.to_string()))
}

/// Extract the time bucket from the first timestamp match in `filename`.
pub fn extract_time_bucket(filename: &str) -> Result<TimeBucket, KeyError> {
    let caps = TIMESTAMP_PATTERN
        .captures(filename)
        .ok_or_else(|| KeyError::UnrecognizedTimestamp(filename.to_string()))?;

    Ok(TimeBucket {
        year: caps[1].to_string(),
        month: caps[2].to_string(),
        day: caps[3].to_string(),
        hour: caps[4].to_string(),
        ten_minute: caps[5].to_string(),
    })
}
