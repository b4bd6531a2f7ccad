//! Transport abstraction for remote command execution
//!
//! This trait allows testing without real servers by supporting mock
//! implementations. Concrete SSH/WinRM transports live in `src/platform/`.

use crate::models::Target;
use crate::utils::TransportError;

/// Output markers that flag a remote command as failed when no exit code
/// was observed. Some transports (WinRM into a WSL guest) do not surface
/// the remote exit status reliably, so the router falls back to scanning
/// the combined output for these substrings.
const FAILURE_MARKERS: &[&str] = &[
    "error",
    "fatal",
    "permission denied",
    "access is denied",
    "command not found",
    "not recognized",
];

/// Result of running one command on a remote target.
///
/// `transport_error` is distinct from a non-zero `exit_code`: the former
/// means the channel itself failed (auth, timeout, unreachable), the latter
/// means the remote shell ran and reported failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Combined stdout/stderr of the remote command
    pub stdout: String,
    /// Remote exit status, when the transport surfaces one
    pub exit_code: Option<i32>,
    /// Set only when the channel itself failed
    pub transport_error: Option<TransportError>,
}

impl CommandResult {
    /// Successful transport, output captured, no exit code observed
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: None,
            transport_error: None,
        }
    }

    /// Successful transport with an observed exit status
    pub fn with_exit(stdout: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(exit_code),
            transport_error: None,
        }
    }

    /// The channel itself failed
    pub fn failed(error: TransportError) -> Self {
        Self {
            stdout: String::new(),
            exit_code: None,
            transport_error: Some(error),
        }
    }

    /// Structured success judgment.
    ///
    /// A real exit code always wins. Only when no exit code was observed do
    /// we fall back to the output heuristic: non-empty output containing no
    /// failure marker is treated as success. This is a deliberate
    /// precision/availability trade-off for transports that cannot surface
    /// the remote exit status.
    pub fn succeeded(&self) -> bool {
        if self.transport_error.is_some() {
            return false;
        }
        match self.exit_code {
            Some(code) => code == 0,
            None => !self.stdout.trim().is_empty() && !looks_like_failure(&self.stdout),
        }
    }
}

/// Scan output text for failure markers (case-insensitive)
pub fn looks_like_failure(output: &str) -> bool {
    let lowercase = output.to_lowercase();
    FAILURE_MARKERS
        .iter()
        .any(|marker| lowercase.contains(marker))
}

/// Command-execution backend for one transport family.
///
/// Implementations construct their own session per call and tear it down
/// before returning, on all exit paths. No mutable state is shared across
/// calls, so a single transport value may serve many targets concurrently.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs ("ssh", "winrm", ...)
    fn name(&self) -> &'static str;

    /// Execute a single non-interactive command on the target
    async fn exec(&self, target: &Target, command: &str) -> CommandResult;

    /// Execute a command inside the target's WSL guest (Windows targets only)
    async fn exec_in_guest(&self, target: &Target, command: &str, distro: &str) -> CommandResult {
        let _ = (target, command, distro);
        CommandResult::failed(TransportError::Unavailable("WSL guest execution"))
    }
}
