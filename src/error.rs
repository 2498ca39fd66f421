use std::time::Duration;
use thiserror::Error;

use crate::diagnostics::DiagnosticReport;

/// Everything that can stop a scheduling run from producing a timetable.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid problem instance: {0}")]
    InvalidInstance(String),

    #[error("failed to parse problem instance: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("search timed out after {elapsed:.2?}")]
    Timeout {
        elapsed: Duration,
        diagnosis: Box<DiagnosticReport>,
    },

    #[error("no consistent timetable exists for this instance")]
    Unsatisfiable { diagnosis: Box<DiagnosticReport> },
}

impl ScheduleError {
    /// The failure analysis, for errors raised after a search ran.
    pub fn diagnosis(&self) -> Option<&DiagnosticReport> {
        match self {
            ScheduleError::Timeout { diagnosis, .. } | ScheduleError::Unsatisfiable { diagnosis } => {
                Some(&**diagnosis)
            }
            _ => None,
        }
    }
}
