//! Error types for dockhand
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain passwords or sensitive data.
//!
//! Messages distinguish "retry later" conditions (host not reachable yet,
//! reboot pending) from "stop and fix manually" conditions (auth failure,
//! reboot budget exhausted).

use std::time::Duration;

/// Failures of the channel itself, as opposed to a remote command that ran
/// and reported a non-zero exit code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// No network signal at all. Surfaced immediately and never retried by
    /// the core; retry policy belongs to the caller.
    #[error("target unreachable: {0}")]
    Unreachable(String),

    /// Fingerprinting was inconclusive and no fallback transport applied.
    #[error("could not determine target operating system")]
    OsUndetermined,

    /// Credentials rejected. Fatal; retrying with the same credentials
    /// cannot succeed.
    #[error("{transport} authentication failed: check username and password")]
    AuthFailed { transport: &'static str },

    /// Required client tooling is missing on the calling host.
    #[error("{0} client tooling not found on this host")]
    Unavailable(&'static str),

    /// The WSL runtime on the target did not answer a status query.
    /// Routine bootstrap state, recoverable via `WslBootstrap::install`.
    #[error("WSL runtime not ready on target: {0}")]
    WslNotReady(String),

    /// No installed WSL distribution matches the requested name.
    #[error("no installed WSL distribution matches '{0}'")]
    DistributionMissing(String),

    /// A bounded wait elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The remote session failed for another reason (channel error,
    /// malformed response, session setup failure).
    #[error("remote session failed: {0}")]
    Session(String),
}

impl TransportError {
    /// True for conditions a caller may reasonably retry later, false for
    /// conditions that need operator attention first.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Unreachable(_)
            | TransportError::WslNotReady(_)
            | TransportError::Timeout(_) => true,
            TransportError::OsUndetermined
            | TransportError::AuthFailed { .. }
            | TransportError::Unavailable(_)
            | TransportError::DistributionMissing(_)
            | TransportError::Session(_) => false,
        }
    }
}

/// Terminal failures of the WSL bootstrap state machine.
///
/// Routine intermediate states (kernel missing, distribution missing, not
/// ready yet) are NOT errors; they come back as structured
/// [`InstallOutcome`](crate::wsl::InstallOutcome) /
/// [`WslReadinessReport`](crate::wsl::WslReadinessReport) values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BootstrapError {
    /// The per-target reboot budget was spent without reaching readiness.
    /// The bootstrap will not reboot this target again.
    #[error(
        "reboot budget exhausted for {address} after {attempts} reboot attempt(s); \
         manual intervention required (check that virtualization is available on the host)"
    )]
    RebootBudgetExhausted { address: String, attempts: u32 },

    /// The host never accepted a remote session again after a reboot.
    #[error("timed out waiting for {address} to come back online (waited {waited:?})")]
    TimeoutWaitingForHost { address: String, waited: Duration },

    /// Could not open a remote session at all.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from credential construction
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid username format: {0}")]
    InvalidUsername(String),
}
