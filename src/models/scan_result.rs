//! Per-object verdicts and results.

use serde::Serialize;
use std::fmt;

/// Category of a per-object failure. Callers branch on this instead of
/// matching on message text.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Scanner did not finish within its time bound.
    Timeout,
    /// Scanner executable could not be found.
    ScannerMissing,
    /// Scanner ran but reported an operational failure, or could not be run.
    ScannerFailed,
    /// Object store refused or failed a request for this object.
    StorageAccess,
    /// Downloaded file escaped the workspace or vanished before scanning.
    SecurityViolation,
    /// The per-object workspace could not be created.
    Workspace,
}

/// A per-object fault: a kind plus a human-readable diagnostic.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ScanFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of scanning (or declining to scan) one object.
///
/// Serialized with a `status` tag so an `infected` entry reads differently
/// from an `error` entry at a glance.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanVerdict {
    Clean,
    Infected {
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    Error {
        kind: FailureKind,
        error: String,
    },
    Skipped {
        reason: String,
    },
}

impl ScanVerdict {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            error: message.into(),
        }
    }

    /// Short status name, used as a structured log field.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected { .. } => "infected",
            Self::Error { .. } => "error",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl From<ScanFailure> for ScanVerdict {
    fn from(failure: ScanFailure) -> Self {
        Self::Error {
            kind: failure.kind,
            error: failure.message,
        }
    }
}

/// The single result produced for one object in one invocation.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ObjectScanResult {
    pub key: String,

    #[serde(flatten)]
    pub verdict: ScanVerdict,

    /// Size reported by the store, in MiB. Absent when the pipeline never got
    /// as far as probing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
}

impl ObjectScanResult {
    pub fn new(key: impl Into<String>, verdict: ScanVerdict, size_mb: Option<f64>) -> Self {
        Self {
            key: key.into(),
            verdict,
            size_mb,
        }
    }
}
