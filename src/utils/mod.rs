//! # Utilities Module
//!
//! Cross-cutting concerns shared throughout the crate.
//!
//! ## Modules
//!
//! - [`errors`]: Typed error hierarchy using `thiserror` for domain-specific errors
//! - [`retry`]: Bounded condition-polling for reboot wait loops
//!
//! ## Design Notes
//!
//! Error types are defined in this module to avoid circular dependencies
//! between the `core` and `platform` modules. Transport-level failures are
//! kept distinct from remote-command failures (a non-zero exit code is data,
//! not an error), and from the routine intermediate states of the WSL
//! bootstrap, which are reported as structured results.

pub mod errors;
pub mod retry;

pub use errors::{BootstrapError, CredentialError, TransportError};
pub use retry::{poll_until, PollConfig};
