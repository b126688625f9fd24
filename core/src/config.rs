use serde::{Deserialize, Serialize};

/// Settings shared by the front ends that build and query an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of workers scoring query terms in parallel.
    pub worker_threads: usize,
    /// File extension (without the dot) a directory source accepts.
    pub extension: String,
}

impl EngineConfig {
    pub const DEFAULT_WORKERS: usize = 4;
    pub const DEFAULT_EXTENSION: &'static str = "txt";
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: Self::DEFAULT_WORKERS,
            extension: Self::DEFAULT_EXTENSION.to_string(),
        }
    }
}
