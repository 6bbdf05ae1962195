//! Per-job outcomes and their aggregation into a batch result.

use std::path::PathBuf;

/// Why a job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The unit of work ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The batch was cancelled before this job finished.
    #[error("cancelled")]
    Cancelled,
}

/// The result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Position of the job in the submitted batch.
    pub index: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub result: Result<(), JobError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.result, Err(JobError::Cancelled))
    }
}

/// Outcomes of one batch, in submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    outcomes: Vec<JobOutcome>,
}

impl BatchResult {
    pub(crate) fn new(mut outcomes: Vec<JobOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        self.outcomes
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter()
    }

    /// Number of jobs that succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of jobs that failed, cancelled ones included.
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Number of jobs that were cancelled.
    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_cancelled()).count()
    }

    /// True when every job succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }
}

impl IntoIterator for BatchResult {
    type Item = JobOutcome;
    type IntoIter = std::vec::IntoIter<JobOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}
