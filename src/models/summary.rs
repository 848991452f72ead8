//! Aggregated outcome of one invocation.

use crate::models::scan_result::{ObjectScanResult, ScanVerdict};
use serde::Serialize;

/// Running counters plus the ordered detail list.
///
/// Built by folding results one at a time with [`ScanSummary::record`]. The
/// top-level `error` is only set when the invocation as a whole could not
/// proceed (nothing to scan, or the bucket listing failed); per-object faults
/// live in `details` and the `errors` counter.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ScanSummary {
    pub total_scanned: usize,
    pub clean: usize,
    pub infected: usize,
    pub errors: usize,
    pub skipped: usize,
    pub details: Vec<ObjectScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanSummary {
    /// Summary of an invocation that aborted before or during enumeration.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Fold one result into the counters and append it to `details`.
    pub fn record(&mut self, result: ObjectScanResult) {
        self.total_scanned += 1;
        match result.verdict {
            ScanVerdict::Clean => self.clean += 1,
            ScanVerdict::Infected { .. } => self.infected += 1,
            ScanVerdict::Error { .. } => self.errors += 1,
            ScanVerdict::Skipped { .. } => self.skipped += 1,
        }
        self.details.push(result);
    }

    /// Keys with an `infected` verdict, in detail order.
    pub fn infected_keys(&self) -> impl Iterator<Item = &str> {
        self.details
            .iter()
            .filter(|r| matches!(r.verdict, ScanVerdict::Infected { .. }))
            .map(|r| r.key.as_str())
    }
}

impl FromIterator<ObjectScanResult> for ScanSummary {
    fn from_iter<I: IntoIterator<Item = ObjectScanResult>>(iter: I) -> Self {
        let mut summary = Self::default();
        for result in iter {
            summary.record(result);
        }
        summary
    }
}
