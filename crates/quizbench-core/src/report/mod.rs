pub mod json;

use crate::model::{RunRecord, SkipRecord};
use serde::{Deserialize, Serialize};

/// How the execution ended. `Aborted` preserves whatever runs completed
/// before the fatal failure so partial results remain reportable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Aborted { reason: String, completed_runs: u32 },
}

impl ExecutionStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Everything one benchmark execution produced: the immutable result log
/// (grouped per run), the skip log, and identification for reproducibility
/// comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub benchmark_id: String,
    pub config_name: String,
    pub config_hash: String,
    pub status: ExecutionStatus,
    pub runs: Vec<RunRecord>,
    pub skips: Vec<SkipRecord>,
}

impl RunArtifacts {
    pub fn total_results(&self) -> usize {
        self.runs.iter().map(|r| r.results.len()).sum()
    }
}
