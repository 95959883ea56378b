//! logrollup-core - consolidate small timestamped log objects
//!
//! Source objects named with a `YYYY-MM-DD-HH-m` timestamp are grouped into
//! one destination object per time bucket (ten minutes, hour, day or month),
//! appended to any previously rolled-up content, and then deleted.
//!
//! ```text
//! build_plan:   list source prefix -> parse keys -> destination -> [sources]
//! execute_plan: per group: read existing -> read sources -> write -> delete
//! ```

mod bucket;
mod error;
mod key;
mod merge;
mod plan;
mod policy;
mod retry;
mod storage;

pub use bucket::{build_destination_key, format_destination_suffix, Granularity, UnknownGranularity};
pub use error::{
    GroupFailure, KeyError, Result, RollupError, StoreError, StoreErrorKind, StoreOp,
};
pub use key::{
    check_disjoint, extract_time_bucket, parse_location, split_relative_path, BucketParts, StoreLocation,
    TimeBucket,
};
pub use merge::{execute_plan, rollup_group, GroupOutcome, RunSummary};
pub use plan::{
    assign_destination, build_plan, plan_keys, ParseFailurePolicy, RollupGroup, RollupPlan,
    SkippedObject,
};
pub use policy::ExecutionPolicy;
pub use retry::RetryPolicy;
pub use storage::{ObjectStore, OpenDalStore};

// Re-exported so callers can build operators without a direct dependency
pub use opendal;
