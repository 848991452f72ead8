//! Scanner capability and the clamscan-style subprocess adapter.

use crate::models::scan_result::{FailureKind, ScanVerdict};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, error};

/// Exit status meaning "no malware found".
const EXIT_CLEAN: i32 = 0;
/// Exit status meaning "malware found".
const EXIT_INFECTED: i32 = 1;

/// Longest diagnostic excerpt carried into a result.
const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Anything that can turn a local file into a verdict.
///
/// Implementations must not panic or return early with an error: every
/// failure is expressed as [`ScanVerdict::Error`].
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict;
}

/// Runs an external command-line scanner, passing the file path as the last
/// argument. Exit 0 is clean, exit 1 is infected, everything else is a
/// scanner failure.
#[derive(Debug, Clone)]
pub struct ClamScanner {
    program: PathBuf,
    args: Vec<String>,
}

impl ClamScanner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Scanner for ClamScanner {
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                error!(program = %self.program.display(), "scanner executable not found");
                return ScanVerdict::failed(
                    FailureKind::ScannerMissing,
                    format!("scanner not found: {}", self.program.display()),
                );
            }
            Err(err) => {
                error!(program = %self.program.display(), "failed to start scanner: {}", err);
                return ScanVerdict::failed(
                    FailureKind::ScannerFailed,
                    format!("scanner failed to start: {err}"),
                );
            }
        };

        // On timeout the future is dropped, which kills the child.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                error!(file = %path.display(), "scanner invocation failed: {}", err);
                return ScanVerdict::failed(
                    FailureKind::ScannerFailed,
                    format!("scanner failed: {err}"),
                );
            }
            Err(_) => {
                error!(
                    file = %path.display(),
                    timeout_secs = timeout.as_secs_f64(),
                    "scanner timed out"
                );
                return ScanVerdict::failed(
                    FailureKind::Timeout,
                    format!("scan timeout after {}s", timeout.as_secs_f64()),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(file = %path.display(), status = ?output.status, "scanner exited");

        match output.status.code() {
            Some(EXIT_CLEAN) => ScanVerdict::Clean,
            Some(EXIT_INFECTED) => ScanVerdict::Infected {
                signature: parse_signature(&stdout),
            },
            code => {
                let diagnostic = diagnostic(&stderr, &stdout);
                error!(
                    file = %path.display(),
                    exit_code = ?code,
                    stderr = %stderr.trim(),
                    "scanner reported failure"
                );
                let status = code
                    .map(|c| format!("exit code {c}"))
                    .unwrap_or_else(|| "terminated by signal".into());
                ScanVerdict::failed(
                    FailureKind::ScannerFailed,
                    format!("scanner failed ({status}): {diagnostic}"),
                )
            }
        }
    }
}

/// Extract the signature name from a `<path>: <Signature> FOUND` line.
fn parse_signature(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let rest = line.trim().strip_suffix(" FOUND")?;
        let (_, signature) = rest.rsplit_once(": ")?;
        let signature = signature.trim();
        (!signature.is_empty()).then(|| signature.to_string())
    })
}

fn diagnostic(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if text.is_empty() {
        return "no output".into();
    }
    let mut cut = text.len().min(MAX_DIAGNOSTIC_LEN);
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}
