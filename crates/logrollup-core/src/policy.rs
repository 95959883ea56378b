//! Execution modes for a rollup run

use serde::{Deserialize, Serialize};

/// Independent flags controlling which side effects a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionPolicy {
    /// Write destinations but never delete source objects
    pub keep: bool,
    /// Read and compute everything, write and delete nothing
    pub dryrun: bool,
    /// Discard existing destination content instead of appending to it
    pub overwrite: bool,
}

impl ExecutionPolicy {
    /// Enable flags from a colon-separated list such as `keep:dryrun`.
    ///
    /// Flags are only ever switched on. Unknown entries are returned so the
    /// caller can report them.
    pub fn apply_flag_list(&mut self, list: &str) -> Vec<String> {
        let mut unknown = Vec::new();
        for flag in list.split(':').map(str::trim).filter(|f| !f.is_empty()) {
            match flag.to_lowercase().as_str() {
                "keep" => self.keep = true,
                "dryrun" | "dry-run" => self.dryrun = true,
                "overwrite" => self.overwrite = true,
                _ => unknown.push(flag.to_string()),
            }
        }
        unknown
    }

    pub fn writes_destination(&self) -> bool {
        !self.dryrun
    }

    pub fn deletes_sources(&self) -> bool {
        !self.keep && !self.dryrun
    }
}
