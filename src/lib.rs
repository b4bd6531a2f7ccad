//! Dockhand - remote provisioning core for container deployments
//!
//! Classifies headless targets as Linux or Windows without credentials, routes
//! shell commands through the matching transport (SSH, or WinRM with a hop
//! into the WSL guest), and drives Windows hosts through WSL bootstrap with a
//! bounded number of reboot cycles.

pub mod constants;
pub mod core;
pub mod models;
pub mod platform;
pub mod utils;
pub mod wsl;

// Re-export commonly used types
pub use crate::core::{
    CommandResult, CommandRouter, Fingerprinter, NetFingerprinter, RouterConfig, Transport,
};
pub use crate::models::{Credentials, OsClass, SecureString, Target, Username};
pub use crate::platform::{SshTransport, WinRmTransport};
pub use crate::utils::{BootstrapError, TransportError};
pub use crate::wsl::{
    BootstrapConfig, BootstrapState, InstallOutcome, RebootBudget, WslBootstrap,
    WslReadinessReport,
};
