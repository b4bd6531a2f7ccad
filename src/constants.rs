//! # Crate-Wide Constants
//!
//! Centralized tunables and magic numbers used throughout dockhand.
//!
//! Constants are defined here (rather than scattered across modules) to keep a
//! single source of truth for timeouts and probe parameters, and to document
//! why each value was chosen.

use std::ops::RangeInclusive;

// ============================================================================
// Fingerprinting
// ============================================================================

/// WinRM HTTP listener port. An open 5985 is the strongest Windows signal.
pub const WINRM_PORT: u16 = 5985;

/// SSH port. Probed second; an open 22 classifies the target as Linux.
pub const SSH_PORT: u16 = 22;

/// Per-probe TCP connect timeout in seconds.
///
/// Each probe is attempted exactly once; a short bound keeps a full
/// fingerprint pass under ~10 seconds even against a silent host.
pub const PROBE_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Timeout for the single ICMP echo fallback, in seconds.
pub const PING_TIMEOUT_SECS: u64 = 3;

/// Reply TTLs observed from Windows hosts (default initial TTL 128, minus
/// a handful of routing hops).
pub const WINDOWS_TTL_RANGE: RangeInclusive<u8> = 120..=128;

/// Reply TTLs observed from Linux hosts (default initial TTL 64).
pub const LINUX_TTL_RANGE: RangeInclusive<u8> = 60..=64;

// ============================================================================
// Transports
// ============================================================================

/// TCP connect timeout for SSH sessions, in seconds.
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read/write timeout on the SSH channel, in seconds.
pub const SSH_IO_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single WinRM child-process invocation, in seconds.
/// Feature enablement and `wsl --install` are slow; five minutes covers them.
pub const WINRM_EXEC_TIMEOUT_SECS: u64 = 300;

/// Distribution used for WSL guest execution when the caller does not name one.
pub const DEFAULT_WSL_DISTRO: &str = "Ubuntu";

// ============================================================================
// WSL bootstrap reboot cycle
// ============================================================================

/// Maximum reboot-and-retry cycles per target before the bootstrap gives up
/// and demands manual intervention. Prevents an automation loop from
/// rebooting a host indefinitely when WSL activation never succeeds
/// (e.g. nested virtualization unavailable in a VM).
pub const DEFAULT_MAX_REBOOT_ATTEMPTS: u32 = 2;

/// How long to wait for a rebooting host to drop offline, in seconds.
/// If it never visibly drops (fast reboot), the cycle proceeds anyway.
pub const REBOOT_OFFLINE_WAIT_SECS: u64 = 120;

/// How long to wait for a rebooted host to accept a remote session again,
/// in seconds. Exceeding this is a terminal failure.
pub const REBOOT_ONLINE_WAIT_SECS: u64 = 600;

/// Interval between host-state polls during a reboot cycle, in seconds.
pub const REBOOT_POLL_INTERVAL_SECS: u64 = 5;

/// Grace period after the host answers again, in seconds. WinRM accepts
/// sessions before all services have settled post-boot.
pub const REBOOT_GRACE_SECS: u64 = 15;
