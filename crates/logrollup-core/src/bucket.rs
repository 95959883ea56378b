//! Destination key assignment by time granularity

use crate::key::TimeBucket;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time resolution used to group source objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    #[serde(rename = "10min")]
    TenMinute,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "month")]
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::TenMinute => "10min",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a granularity string is not one of `10min`, `hour`, `day`, `month`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rollup granularity '{0}' (supported: 10min, hour, day, month)")]
pub struct UnknownGranularity(pub String);

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "10min" => Ok(Granularity::TenMinute),
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            _ => Err(UnknownGranularity(s.to_string())),
        }
    }
}

/// Render the destination file name for a time bucket.
///
/// | granularity | suffix              |
/// |-------------|---------------------|
/// | 10min       | `YYYY-MM-DD-HH-D0`  |
/// | hour        | `YYYY-MM-DD-HH`     |
/// | day         | `YYYY-MM-DD`        |
/// | month       | `YYYY-MM`           |
pub fn format_destination_suffix(granularity: Granularity, bucket: &TimeBucket) -> String {
    match granularity {
        Granularity::TenMinute => format!(
            "{}-{}-{}-{}-{}0",
            bucket.year, bucket.month, bucket.day, bucket.hour, bucket.ten_minute
        ),
        Granularity::Hour => format!(
            "{}-{}-{}-{}",
            bucket.year, bucket.month, bucket.day, bucket.hour
        ),
        Granularity::Day => format!("{}-{}-{}", bucket.year, bucket.month, bucket.day),
        Granularity::Month => format!("{}-{}", bucket.year, bucket.month),
    }
}

/// Join destination prefix, the source's sub-prefix and the suffix.
///
/// Empty components are dropped, so an empty destination prefix never
/// produces a key with a leading slash.
pub fn build_destination_key(dest_prefix: &str, sub_prefix: &str, suffix: &str) -> String {
    [dest_prefix, sub_prefix, suffix]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
