use std::fmt;

/// Outcome of processing one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOutcome {
    /// Filesystem changes were applied (or simulated in dry-run mode).
    Ok,
    /// A step failed; every completed step for this application was undone.
    RolledBack,
    /// Nothing to do: symlinks already correct or symlinking disabled.
    Skipped,
    /// Stopped by a cancellation request; completed pairs are kept.
    Cancelled,
}

impl fmt::Display for AppOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppOutcome::Ok => write!(f, "ok"),
            AppOutcome::RolledBack => write!(f, "rolled back"),
            AppOutcome::Skipped => write!(f, "skipped"),
            AppOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a whole batch run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// All applications processed (or skipped) cleanly.
    Success,
    /// Some applications failed and were individually rolled back.
    Partial,
    /// Configuration could not be parsed or resolved before any application ran.
    HardFailure,
}

impl BatchOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            BatchOutcome::Success => 0,
            BatchOutcome::Partial => 1,
            BatchOutcome::HardFailure => 2,
        }
    }
}

/// Aggregated counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub applications_processed: usize,
    pub applications_failed: usize,
    pub applications_skipped: usize,
    pub applications_cancelled: usize,
    /// Rollback entries applied (and kept) across the batch.
    pub entries_applied: usize,
    /// Undo operations performed for failed applications.
    pub rollbacks_performed: usize,
}

impl StatusReport {
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} failed, {} skipped, {} cancelled ({} steps applied, {} rolled back)",
            self.applications_processed,
            self.applications_failed,
            self.applications_skipped,
            self.applications_cancelled,
            self.entries_applied,
            self.rollbacks_performed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BatchOutcome::Success.exit_code(), 0);
        assert_eq!(BatchOutcome::Partial.exit_code(), 1);
        assert_eq!(BatchOutcome::HardFailure.exit_code(), 2);
    }

    #[test]
    fn test_summary_format() {
        let report = StatusReport {
            applications_processed: 2,
            applications_failed: 1,
            applications_skipped: 1,
            applications_cancelled: 0,
            entries_applied: 4,
            rollbacks_performed: 2,
        };
        assert_eq!(
            report.summary(),
            "2 processed, 1 failed, 1 skipped, 0 cancelled (4 steps applied, 2 rolled back)"
        );
    }
}
