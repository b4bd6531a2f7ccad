//! Remote command router
//!
//! Single entry point for every higher-level collaborator (service
//! installers, health monitors): fingerprint the target, pick a transport,
//! run the command, and return a normalized [`CommandResult`].
//!
//! The router is stateless and may be invoked concurrently for independent
//! targets; each call constructs and tears down its own transport session.

use crate::core::fingerprint::Fingerprinter;
use crate::core::transport::{CommandResult, Transport};
use crate::models::{OsClass, Target};
use crate::utils::TransportError;
use std::sync::Arc;
use tracing::debug;

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// WSL distribution used when commands are routed into a Windows
    /// target's guest
    pub distro: String,
    /// Try SSH against targets whose OS could not be determined. With the
    /// fallback disabled, unclassifiable targets fail with `OsUndetermined`
    /// instead of a blind connection attempt.
    pub ssh_fallback: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            distro: crate::constants::DEFAULT_WSL_DISTRO.to_string(),
            ssh_fallback: true,
        }
    }
}

/// Routes a logical "run this shell command" request to the right transport.
///
/// Linux targets go over SSH. Windows targets go over WinRM, which
/// re-delegates into the WSL guest (the guest must have been made ready by
/// [`WslBootstrap`](crate::wsl::WslBootstrap), or the result degrades to a
/// `WslNotReady` transport error). Unknown targets fall back to SSH as a
/// documented best-effort policy, not a guarantee.
pub struct CommandRouter {
    fingerprinter: Arc<dyn Fingerprinter>,
    ssh: Arc<dyn Transport>,
    winrm: Arc<dyn Transport>,
    config: RouterConfig,
}

impl CommandRouter {
    pub fn new(
        fingerprinter: Arc<dyn Fingerprinter>,
        ssh: Arc<dyn Transport>,
        winrm: Arc<dyn Transport>,
        config: RouterConfig,
    ) -> Self {
        Self {
            fingerprinter,
            ssh,
            winrm,
            config,
        }
    }

    /// Fingerprint the target and run `command` over the matching transport
    pub async fn run_command(&self, target: &Target, command: &str) -> CommandResult {
        self.run_command_as(target, command, None).await
    }

    /// Like [`run_command`](Self::run_command), but a caller that already
    /// knows the target's OS can pass it to skip the network probe.
    /// Re-detection stays the default because a target's state can change
    /// between calls (e.g. after a reboot).
    pub async fn run_command_as(
        &self,
        target: &Target,
        command: &str,
        os_hint: Option<OsClass>,
    ) -> CommandResult {
        let os = match os_hint {
            Some(os) => os,
            None => self.fingerprinter.classify(target.host()).await,
        };

        match os {
            OsClass::Linux => {
                debug!(address = target.address(), "routing command over SSH");
                self.ssh.exec(target, command).await
            }
            OsClass::Windows => {
                debug!(
                    address = target.address(),
                    distro = self.config.distro.as_str(),
                    "routing command over WinRM into WSL guest"
                );
                self.winrm
                    .exec_in_guest(target, command, &self.config.distro)
                    .await
            }
            OsClass::Unknown if self.config.ssh_fallback => {
                // Best-effort fallback: SSH is the cheaper transport to try
                // blind, and most unclassifiable targets are firewalled
                // Linux hosts.
                debug!(
                    address = target.address(),
                    "OS undetermined, falling back to SSH"
                );
                self.ssh.exec(target, command).await
            }
            OsClass::Unknown => {
                debug!(
                    address = target.address(),
                    "OS undetermined and SSH fallback disabled"
                );
                CommandResult::failed(TransportError::OsUndetermined)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock_transport::{FixedFingerprinter, StaticTransport};
    use crate::models::{Credentials, SecureString, Username};
    use crate::utils::TransportError;

    fn target() -> Target {
        Target::new(
            "10.0.0.5",
            Credentials::new(Username::new("admin").unwrap(), SecureString::new("pw")),
        )
    }

    fn router(
        os: OsClass,
        ssh: Arc<StaticTransport>,
        winrm: Arc<StaticTransport>,
    ) -> (CommandRouter, Arc<FixedFingerprinter>) {
        let fp = Arc::new(FixedFingerprinter::new(os));
        let router = CommandRouter::new(
            fp.clone(),
            ssh.clone(),
            winrm.clone(),
            RouterConfig::default(),
        );
        (router, fp)
    }

    #[tokio::test]
    async fn test_linux_target_never_touches_winrm() {
        let ssh = Arc::new(StaticTransport::new(
            "ssh",
            CommandResult::with_exit("hi\n", 0),
        ));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("")));
        let (router, _) = router(OsClass::Linux, ssh.clone(), winrm.clone());

        let result = router.run_command(&target(), "echo hi").await;

        assert_eq!(result.stdout, "hi\n");
        assert!(result.succeeded());
        assert_eq!(ssh.exec_count(), 1);
        assert_eq!(winrm.exec_count(), 0);
        assert_eq!(winrm.guest_exec_count(), 0);
    }

    #[tokio::test]
    async fn test_windows_target_routes_into_guest() {
        let ssh = Arc::new(StaticTransport::new("ssh", CommandResult::ok("")));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("hi\n")));
        let (router, _) = router(OsClass::Windows, ssh.clone(), winrm.clone());

        let result = router.run_command(&target(), "echo hi").await;

        assert_eq!(result.stdout, "hi\n");
        assert_eq!(ssh.exec_count(), 0);
        assert_eq!(winrm.exec_count(), 0, "native exec not used for routing");
        assert_eq!(winrm.guest_exec_count(), 1);
        let (command, distro) = winrm.guest_calls.lock().unwrap()[0].clone();
        assert_eq!(command, "echo hi");
        assert_eq!(distro, crate::constants::DEFAULT_WSL_DISTRO);
    }

    #[tokio::test]
    async fn test_unknown_target_falls_back_to_ssh() {
        let ssh = Arc::new(StaticTransport::new(
            "ssh",
            CommandResult::failed(TransportError::Unreachable("no route to host".into())),
        ));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("")));
        let (router, _) = router(OsClass::Unknown, ssh.clone(), winrm.clone());

        let result = router.run_command(&target(), "echo hi").await;

        assert!(matches!(
            result.transport_error,
            Some(TransportError::Unreachable(_))
        ));
        assert_eq!(ssh.exec_count(), 1);
        assert_eq!(winrm.exec_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_without_fallback_reports_os_undetermined() {
        let ssh = Arc::new(StaticTransport::new(
            "ssh",
            CommandResult::with_exit("ok", 0),
        ));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("")));
        let fp = Arc::new(FixedFingerprinter::new(OsClass::Unknown));
        let config = RouterConfig {
            ssh_fallback: false,
            ..RouterConfig::default()
        };
        let router = CommandRouter::new(fp, ssh.clone(), winrm.clone(), config);

        let result = router.run_command(&target(), "echo hi").await;

        assert_eq!(
            result.transport_error,
            Some(TransportError::OsUndetermined)
        );
        assert_eq!(ssh.exec_count(), 0, "no blind connection attempt");
        assert_eq!(winrm.exec_count(), 0);
    }

    #[tokio::test]
    async fn test_wsl_not_ready_degrades_to_structured_error() {
        let ssh = Arc::new(StaticTransport::new("ssh", CommandResult::ok("")));
        let winrm = Arc::new(StaticTransport::new(
            "winrm",
            CommandResult::failed(TransportError::WslNotReady("no runtime".into())),
        ));
        let (router, _) = router(OsClass::Windows, ssh, winrm);

        let result = router.run_command(&target(), "docker ps").await;

        assert!(matches!(
            result.transport_error,
            Some(TransportError::WslNotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_os_hint_skips_fingerprint_probe() {
        let ssh = Arc::new(StaticTransport::new(
            "ssh",
            CommandResult::with_exit("ok", 0),
        ));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("")));
        let (router, fp) = router(OsClass::Windows, ssh.clone(), winrm);

        let result = router
            .run_command_as(&target(), "uptime", Some(OsClass::Linux))
            .await;

        assert!(result.succeeded());
        assert_eq!(fp.calls(), 0, "hint must skip the network probe");
        assert_eq!(ssh.exec_count(), 1);
    }

    #[tokio::test]
    async fn test_redetection_happens_per_call() {
        let ssh = Arc::new(StaticTransport::new(
            "ssh",
            CommandResult::with_exit("ok", 0),
        ));
        let winrm = Arc::new(StaticTransport::new("winrm", CommandResult::ok("")));
        let (router, fp) = router(OsClass::Linux, ssh, winrm);

        router.run_command(&target(), "true").await;
        router.run_command(&target(), "true").await;

        assert_eq!(fp.calls(), 2, "no hidden caching of the OS verdict");
    }
}
