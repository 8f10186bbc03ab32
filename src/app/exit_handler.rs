//! Exit code logic for the bibfetch process.
//!
//! The exit signal is binary: every stage for every identifier succeeded, or not.

use bibfetch_core::{BatchError, RunReport};

use crate::ProcessExit;

/// Determines the process exit outcome from a finished run.
pub(crate) fn determine_exit_outcome(result: &Result<RunReport, BatchError>) -> ProcessExit {
    match result {
        Ok(_) => ProcessExit::Success,
        Err(_) => ProcessExit::Failure,
    }
}

#[cfg(test)]
mod tests {
    use bibfetch_core::{Stage, StageError, StageFailure};

    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(
            determine_exit_outcome(&Ok(RunReport::default())),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_outcome_failure_on_any_stage_failure() {
        let result = Err(BatchError {
            failures: vec![StageFailure::new(
                "cake",
                Stage::Validation,
                StageError::validation("cake", "not a DOI or ISBN"),
            )],
            report: RunReport::default(),
        });
        assert_eq!(determine_exit_outcome(&result), ProcessExit::Failure);
    }
}
