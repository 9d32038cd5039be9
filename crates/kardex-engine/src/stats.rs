//! Run counters and failure details.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One recorded failure, with enough detail to diagnose a destination-side
/// rejection without rerunning with extra instrumentation.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    /// What failed: a VM name, a dependency name, or a chunk label.
    pub subject: String,
    /// The destination's own error detail, or the transport error.
    pub detail: String,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Source records seen (including anonymous and failed ones).
    pub processed: usize,
    /// VMs created in the destination.
    pub created: usize,
    /// VMs updated in the destination.
    pub updated: usize,
    /// Records skipped because they are not sync candidates (no name).
    pub skipped: usize,
    /// Records that failed at any step.
    pub failed: usize,
    /// Interfaces created during the attachment pass.
    pub interfaces_created: usize,
    /// IP addresses created during the attachment pass.
    pub ips_created: usize,
    /// Primary-IP pointers actually updated (no-ops are not counted).
    pub primary_ip_updates: usize,
    /// Whether the run was cut short by an interrupt.
    pub interrupted: bool,
    /// Per-failure details, in occurrence order.
    pub failures: Vec<FailureDetail>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            processed: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            interfaces_created: 0,
            ips_created: 0,
            primary_ip_updates: 0,
            interrupted: false,
            failures: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record one failure with its diagnostic detail.
    pub fn record_failure(&mut self, subject: impl Into<String>, detail: impl Into<String>) {
        self.failed += 1;
        self.failures.push(FailureDetail {
            subject: subject.into(),
            detail: detail.into(),
        });
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_summary_is_zeroed() {
        let summary = RunSummary::new();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.failed, 0);
        assert!(!summary.interrupted);
        assert!(summary.failures.is_empty());
        assert!(summary.completed_at.is_none());
    }

    #[test]
    fn test_record_failure_keeps_detail() {
        let mut summary = RunSummary::new();
        summary.record_failure("vm-7", "HTTP 400: name already exists");
        summary.record_failure("site DC West", "HTTP 403: forbidden");

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures[0].subject, "vm-7");
        assert!(summary.failures[1].detail.contains("403"));
    }
}
