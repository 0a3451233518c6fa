//! Core logging types: step entries, status, and the [`Log`] trait.

/// Outcome of one provisioning step, kept for the run summary.
#[derive(Debug, Clone)]
pub struct StepEntry {
    /// Human-readable step name (e.g., `module 110-nvm`).
    pub name: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step completed successfully.
    Ok,
    /// Step was not attempted (missing script, phase aborted, nothing to do).
    Skipped,
    /// Step ran in dry-run mode; no changes were applied.
    DryRun,
    /// Step was attempted and failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// Every component logs through this trait so tests can substitute a
/// recording implementation for the console/file [`Logger`](super::Logger).
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Forward one line of child process output.
    fn output(&self, line: &str) {
        self.info(line);
    }
    /// Draw a separator line titled `title` (e.g., a module header).
    fn rule(&self, title: &str) {
        self.info(&format!("──── {title} ────"));
    }
    /// Record a step result for the summary.
    fn record(&self, name: &str, status: StepStatus, message: Option<&str>);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn step_status_equality() {
        assert_eq!(StepStatus::Ok, StepStatus::Ok);
        assert_ne!(StepStatus::Ok, StepStatus::Failed);
        assert_ne!(StepStatus::Skipped, StepStatus::DryRun);
    }

    #[test]
    fn step_entry_clone() {
        let entry = StepEntry {
            name: "module 110-nvm".to_string(),
            status: StepStatus::Failed,
            message: Some("exit 1".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
