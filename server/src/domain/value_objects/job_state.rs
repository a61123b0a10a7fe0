//! Translation job status state machine (I3: pending -> running -> {success|failed|skipped},
//! or running -> pending on crash recovery).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl JobState {
    /// Terminal states release their dedupe reservation (I2) and are eligible for pruning (I4).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Skipped)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "success" => Ok(JobState::Success),
            "failed" => Ok(JobState::Failed),
            "skipped" => Ok(JobState::Skipped),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}
