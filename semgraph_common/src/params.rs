//! Store initialization parameters.
//!
//! Parameters are a plain serde struct so deployments can keep them in a
//! TOML file next to the repo directory; every field has a default suitable
//! for tests.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters accepted by store initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreParams {
    /// Maximum number of segments the pool may allocate.
    pub max_segments: u32,
    /// Worker-thread ceiling, forwarded to the file-memory collaborator.
    pub max_threads: u32,
    /// Number of event-dispatch worker threads.
    pub dispatch_threads: u32,
    /// Snapshot save period in seconds; informational, forwarded to
    /// file-memory.
    pub save_period: u32,
    /// Index update period in seconds; informational, forwarded to
    /// file-memory.
    pub update_period: u32,
    /// When false, load the previous snapshot on startup.
    pub clear: bool,
    /// Repository directory for snapshots and the content index. `None`
    /// keeps everything in memory.
    pub repo_path: Option<PathBuf>,
}

impl Default for StoreParams {
    fn default() -> Self {
        Self {
            max_segments: 256,
            max_threads: 32,
            dispatch_threads: 2,
            save_period: 3600,
            update_period: 1800,
            clear: true,
            repo_path: None,
        }
    }
}

impl StoreParams {
    /// Parse parameters from a TOML document. Missing fields fall back to
    /// their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }
}
