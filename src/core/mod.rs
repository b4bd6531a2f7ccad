//! Core business logic (platform-agnostic)
//!
//! CRITICAL: This module MUST NOT import platform-specific code. Everything
//! here works against the [`Transport`] and [`Fingerprinter`] trait seams so
//! tests can run without real servers.

pub mod fingerprint;
pub mod router;
pub mod transport;

// Test utilities for mock transports (tests only)
#[cfg(test)]
pub mod mock_transport;

pub use fingerprint::{Fingerprinter, NetFingerprinter};
pub use router::{CommandRouter, RouterConfig};
pub use transport::{looks_like_failure, CommandResult, Transport};
