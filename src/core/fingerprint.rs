//! Credential-free OS fingerprinting
//!
//! Classifies a target as Linux or Windows before any authentication, so the
//! router can pick a transport. Three signals, in strict order, first
//! positive wins:
//!
//! 1. TCP connect to 5985 (WinRM) => Windows
//! 2. TCP connect to 22 (SSH)     => Linux
//! 3. One ICMP echo; reply TTL in [120,128] => Windows, [60,64] => Linux
//!
//! Each probe is attempted exactly once with a bounded timeout. A probe
//! failure (refused, timeout, unreachable) is a negative signal, not an
//! error. No retries, no side effects; safe to call concurrently for
//! different targets.

use crate::constants::{
    LINUX_TTL_RANGE, PING_TIMEOUT_SECS, PROBE_CONNECT_TIMEOUT_SECS, SSH_PORT, WINDOWS_TTL_RANGE,
    WINRM_PORT,
};
use crate::models::OsClass;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// OS classification seam, mockable for router tests
#[async_trait::async_trait]
pub trait Fingerprinter: Send + Sync {
    /// Classify the host at `address` (no port suffix)
    async fn classify(&self, address: &str) -> OsClass;
}

/// Network fingerprinter probing live TCP ports and ICMP TTL.
///
/// ICMP goes through the system `ping` binary rather than a raw socket, so
/// no elevated privileges are needed on the calling host.
pub struct NetFingerprinter {
    connect_timeout: Duration,
    ping_timeout: Duration,
}

impl Default for NetFingerprinter {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(PROBE_CONNECT_TIMEOUT_SECS),
            ping_timeout: Duration::from_secs(PING_TIMEOUT_SECS),
        }
    }
}

impl NetFingerprinter {
    pub fn new(connect_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ping_timeout,
        }
    }

    /// Single bounded TCP connect attempt; any failure is a negative signal
    async fn tcp_open(&self, host: &str, port: u16) -> bool {
        matches!(
            timeout(self.connect_timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }

    /// Send one ICMP echo via the system ping binary and extract the reply TTL
    async fn ping_ttl(&self, host: &str) -> Option<u8> {
        let mut cmd = tokio::process::Command::new("ping");
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w"])
                .arg(self.ping_timeout.as_millis().to_string());
        } else {
            cmd.args(["-c", "1", "-W"])
                .arg(self.ping_timeout.as_secs().max(1).to_string());
        }
        cmd.arg(host);

        // The binary enforces its own wait, but bound the child anyway
        let output = timeout(self.ping_timeout + Duration::from_secs(2), cmd.output())
            .await
            .ok()?
            .ok()?;

        if !output.status.success() {
            return None;
        }
        parse_ttl(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait::async_trait]
impl Fingerprinter for NetFingerprinter {
    async fn classify(&self, address: &str) -> OsClass {
        if self.tcp_open(address, WINRM_PORT).await {
            debug!(address, port = WINRM_PORT, "fingerprint: WinRM port open");
            return OsClass::Windows;
        }

        if self.tcp_open(address, SSH_PORT).await {
            debug!(address, port = SSH_PORT, "fingerprint: SSH port open");
            return OsClass::Linux;
        }

        if let Some(ttl) = self.ping_ttl(address).await {
            let verdict = classify_ttl(ttl);
            debug!(address, ttl, ?verdict, "fingerprint: ICMP TTL fallback");
            return verdict;
        }

        debug!(address, "fingerprint: no signal, OS unknown");
        OsClass::Unknown
    }
}

/// Map a reply TTL to an OS family using common default TTLs.
/// TTLs outside both ranges are inconclusive.
pub fn classify_ttl(ttl: u8) -> OsClass {
    if WINDOWS_TTL_RANGE.contains(&ttl) {
        OsClass::Windows
    } else if LINUX_TTL_RANGE.contains(&ttl) {
        OsClass::Linux
    } else {
        OsClass::Unknown
    }
}

/// Extract the TTL from ping output, tolerating both the Unix lowercase
/// `ttl=64` and the Windows uppercase `TTL=128` forms.
pub fn parse_ttl(output: &str) -> Option<u8> {
    let lowercase = output.to_lowercase();
    let idx = lowercase.find("ttl=")?;
    let digits: String = lowercase[idx + 4..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl_linux_ping() {
        let out = "64 bytes from 10.0.0.5: icmp_seq=1 ttl=64 time=0.482 ms";
        assert_eq!(parse_ttl(out), Some(64));
    }

    #[test]
    fn test_parse_ttl_windows_ping() {
        let out = "Reply from 10.0.0.7: bytes=32 time<1ms TTL=128";
        assert_eq!(parse_ttl(out), Some(128));
    }

    #[test]
    fn test_parse_ttl_absent() {
        assert_eq!(parse_ttl("Request timed out."), None);
        assert_eq!(parse_ttl(""), None);
    }

    #[test]
    fn test_classify_ttl_ranges() {
        assert_eq!(classify_ttl(128), OsClass::Windows);
        assert_eq!(classify_ttl(120), OsClass::Windows);
        assert_eq!(classify_ttl(64), OsClass::Linux);
        assert_eq!(classify_ttl(60), OsClass::Linux);
        // Outside both ranges: inconclusive
        assert_eq!(classify_ttl(255), OsClass::Unknown);
        assert_eq!(classify_ttl(48), OsClass::Unknown);
        assert_eq!(classify_ttl(100), OsClass::Unknown);
    }

    #[test]
    fn test_classify_ttl_deterministic() {
        for _ in 0..10 {
            assert_eq!(classify_ttl(64), OsClass::Linux);
            assert_eq!(classify_ttl(128), OsClass::Windows);
        }
    }

    #[tokio::test]
    async fn test_tcp_probe_refused_is_negative() {
        // Nothing listens on this port of localhost in the test environment;
        // a refused connect must read as "closed", not an error.
        let fp = NetFingerprinter::new(Duration::from_millis(500), Duration::from_millis(500));
        assert!(!fp.tcp_open("127.0.0.1", 1).await);
    }
}
