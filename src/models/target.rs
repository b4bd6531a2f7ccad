//! Target identity and OS classification verdicts
//!
//! A [`Target`] is the address + credentials pair every operation receives.
//! It is immutable per call and never persisted beyond process memory.

use crate::models::Credentials;
use serde::{Deserialize, Serialize};

/// Operating system family verdict for a target
///
/// Re-derived on every high-level operation rather than cached: a target's
/// live network state can change between calls (e.g. after a reboot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsClass {
    Linux,
    Windows,
    Unknown,
}

/// A remote host plus the credentials used to authenticate against it
#[derive(Clone, Debug)]
pub struct Target {
    address: String,
    credentials: Credentials,
}

impl Target {
    /// Create a new target. `address` is a hostname or IP, optionally with
    /// a `:port` suffix for non-default SSH ports.
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            address: address.into().trim().to_string(),
            credentials,
        }
    }

    /// The address as given (may include a port suffix)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The credentials for this target
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Host portion of the address, without any `:port` suffix
    pub fn host(&self) -> &str {
        match self.address.rsplit_once(':') {
            Some((host, port)) if port.parse::<u16>().is_ok() => host,
            _ => &self.address,
        }
    }

    /// Split the address into host and port, falling back to `default_port`
    /// when the address carries no port suffix
    pub fn host_port(&self, default_port: u16) -> (&str, u16) {
        if let Some((host, port)) = self.address.rsplit_once(':') {
            if let Ok(port_num) = port.parse::<u16>() {
                return (host, port_num);
            }
        }
        (&self.address, default_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SecureString, Username};

    fn target(address: &str) -> Target {
        let creds = Credentials::new(
            Username::new("admin").unwrap(),
            SecureString::new("hunter2"),
        );
        Target::new(address, creds)
    }

    #[test]
    fn test_host_port_default() {
        let t = target("10.0.0.5");
        assert_eq!(t.host_port(22), ("10.0.0.5", 22));
        assert_eq!(t.host(), "10.0.0.5");
    }

    #[test]
    fn test_host_port_explicit() {
        let t = target("10.0.0.5:2222");
        assert_eq!(t.host_port(22), ("10.0.0.5", 2222));
        assert_eq!(t.host(), "10.0.0.5");
    }

    #[test]
    fn test_host_port_non_numeric_suffix() {
        // Not a port; keep the whole address as host
        let t = target("server:alpha");
        assert_eq!(t.host_port(22), ("server:alpha", 22));
    }

    #[test]
    fn test_os_class_serde_round_trip() {
        let json = serde_json::to_string(&OsClass::Windows).unwrap();
        assert_eq!(json, "\"Windows\"");
        assert_eq!(
            serde_json::from_str::<OsClass>(&json).unwrap(),
            OsClass::Windows
        );
    }

    #[test]
    fn test_address_trimmed() {
        let t = target("  web01  ");
        assert_eq!(t.address(), "web01");
    }
}
