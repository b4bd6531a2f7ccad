//! WSL readiness assessment
//!
//! One probe pass produces a [`WslReadinessReport`]: host-level feature and
//! pending-reboot state from a single PowerShell script, then functional
//! probes of the WSL runtime itself. Functional probes are skipped while a
//! reboot is pending, because wsl.exe answers are meaningless until the
//! optional-feature install completes.

use crate::core::transport::Transport;
use crate::models::Target;
use crate::utils::TransportError;
use crate::wsl::{clean_wsl_output, resolve_distro};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Host-level probe script. Checks both optional features and the three
/// registry locations Windows uses to signal a pending reboot. Signals are
/// joined into one string because ConvertTo-Json collapses single-element
/// arrays into bare values.
const READINESS_SCRIPT: &str = r#"$ErrorActionPreference = 'SilentlyContinue'
$wsl = Get-WindowsOptionalFeature -Online -FeatureName Microsoft-Windows-Subsystem-Linux
$vmp = Get-WindowsOptionalFeature -Online -FeatureName VirtualMachinePlatform
$signals = @()
if (Test-Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\Component Based Servicing\RebootPending') { $signals += 'component-servicing' }
if (Test-Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\WindowsUpdate\Auto Update\RebootRequired') { $signals += 'windows-update' }
$pfro = Get-ItemProperty 'HKLM:\SYSTEM\CurrentControlSet\Control\Session Manager' -Name PendingFileRenameOperations -ErrorAction SilentlyContinue
if ($pfro) { $signals += 'pending-file-rename' }
@{
    wsl_enabled = [bool]($wsl -and $wsl.State -eq 'Enabled')
    vm_platform_enabled = [bool]($vmp -and $vmp.State -eq 'Enabled')
    reboot_pending = [bool]($signals.Count -gt 0)
    signals = ($signals -join ',')
} | ConvertTo-Json -Compress"#;

/// Token echoed from inside the guest to prove end-to-end liveness
const LIVENESS_TOKEN: &str = "wsl-ready";

#[derive(Debug, Deserialize)]
struct HostFlags {
    wsl_enabled: bool,
    vm_platform_enabled: bool,
    reboot_pending: bool,
    #[serde(default)]
    signals: String,
}

/// Bootstrap state derived from a readiness report, in fix-first order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootstrapState {
    /// A reboot is pending; nothing else can be judged until it happens
    RebootPending,
    /// One or both required Windows optional features are disabled
    NotInstalled,
    /// Features are on but the WSL kernel/runtime does not answer
    KernelMissing,
    /// Runtime answers but the requested distribution is not installed
    DistributionMissing,
    /// Distribution installed but did not answer the liveness probe
    DistributionNotReady,
    /// Commands run end-to-end inside the guest
    Ready,
}

/// Snapshot of everything WSL needs on a target, from one probe pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WslReadinessReport {
    pub feature_enabled: bool,
    pub vm_platform_enabled: bool,
    pub kernel_installed: bool,
    pub distribution_installed: bool,
    pub distribution_ready: bool,
    pub reboot_pending: bool,
    /// Human-readable summary for operator-facing surfaces
    pub message: String,
}

impl WslReadinessReport {
    /// Collapse the flags into one state. Precedence mirrors the order an
    /// operator has to fix things in: a pending reboot masks everything,
    /// features before kernel, kernel before distribution.
    pub fn state(&self) -> BootstrapState {
        if self.reboot_pending {
            BootstrapState::RebootPending
        } else if !self.feature_enabled || !self.vm_platform_enabled {
            BootstrapState::NotInstalled
        } else if !self.kernel_installed {
            BootstrapState::KernelMissing
        } else if !self.distribution_installed {
            BootstrapState::DistributionMissing
        } else if !self.distribution_ready {
            BootstrapState::DistributionNotReady
        } else {
            BootstrapState::Ready
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BootstrapState::Ready
    }
}

/// Probes one target and assembles a readiness report
pub struct WslReadinessProbe {
    transport: Arc<dyn Transport>,
    distro: String,
}

impl WslReadinessProbe {
    pub fn new(transport: Arc<dyn Transport>, distro: impl Into<String>) -> Self {
        Self {
            transport,
            distro: distro.into(),
        }
    }

    /// Run one full probe pass against the target.
    ///
    /// Channel failures surface as errors; every WSL-level shortfall is a
    /// routine state reported inside the `Ok` report.
    pub async fn assess(&self, target: &Target) -> Result<WslReadinessReport, TransportError> {
        let result = self.transport.exec(target, READINESS_SCRIPT).await;
        if let Some(err) = result.transport_error {
            return Err(err);
        }

        let flags = parse_host_flags(&result.stdout)?;
        debug!(
            address = target.address(),
            wsl = flags.wsl_enabled,
            vm_platform = flags.vm_platform_enabled,
            reboot_pending = flags.reboot_pending,
            signals = flags.signals.as_str(),
            "host-level WSL flags"
        );

        if flags.reboot_pending {
            return Ok(self.build_report(&flags, false, false, false));
        }

        // Functional probes, short-circuiting down the dependency chain
        let kernel_installed = self
            .transport
            .exec(target, "wsl.exe --status")
            .await
            .succeeded();

        let resolved = if kernel_installed {
            let listed = self
                .transport
                .exec(target, "wsl.exe --list --quiet")
                .await;
            let installed: Vec<String> = clean_wsl_output(&listed.stdout)
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            resolve_distro(&self.distro, &installed)
        } else {
            None
        };

        // Probe liveness under the installed name, not the requested alias
        let distribution_ready = if let Some(name) = &resolved {
            let echo = self
                .transport
                .exec(
                    target,
                    &format!(
                        "wsl.exe --distribution {} --user root -- echo {}",
                        name, LIVENESS_TOKEN
                    ),
                )
                .await;
            echo.succeeded() && echo.stdout.contains(LIVENESS_TOKEN)
        } else {
            false
        };

        Ok(self.build_report(&flags, kernel_installed, resolved.is_some(), distribution_ready))
    }

    fn build_report(
        &self,
        flags: &HostFlags,
        kernel_installed: bool,
        distribution_installed: bool,
        distribution_ready: bool,
    ) -> WslReadinessReport {
        let mut report = WslReadinessReport {
            feature_enabled: flags.wsl_enabled,
            vm_platform_enabled: flags.vm_platform_enabled,
            kernel_installed,
            distribution_installed,
            distribution_ready,
            reboot_pending: flags.reboot_pending,
            message: String::new(),
        };
        report.message = describe(&report, &self.distro, &flags.signals);
        report
    }
}

fn describe(report: &WslReadinessReport, distro: &str, signals: &str) -> String {
    match report.state() {
        BootstrapState::RebootPending => {
            if signals.is_empty() {
                "reboot pending before WSL can be assessed".to_string()
            } else {
                format!("reboot pending ({signals}) before WSL can be assessed")
            }
        }
        BootstrapState::NotInstalled => {
            "required Windows features (WSL, Virtual Machine Platform) are not enabled".to_string()
        }
        BootstrapState::KernelMissing => {
            "WSL features enabled but the kernel/runtime is not responding".to_string()
        }
        BootstrapState::DistributionMissing => {
            format!("no installed WSL distribution matches '{distro}'")
        }
        BootstrapState::DistributionNotReady => {
            format!("distribution '{distro}' is installed but not answering commands")
        }
        BootstrapState::Ready => format!("WSL distribution '{distro}' is ready"),
    }
}

/// Pull the flag object out of the script's output. Tolerates banner noise
/// before the JSON but rejects output with no parseable object, since a
/// silent default would mask a broken probe as "nothing installed".
fn parse_host_flags(stdout: &str) -> Result<HostFlags, TransportError> {
    let cleaned = clean_wsl_output(stdout);
    let start = cleaned.find('{').ok_or_else(|| {
        TransportError::Session(format!(
            "readiness probe returned no JSON: {}",
            cleaned.trim()
        ))
    })?;
    serde_json::from_str(cleaned[start..].trim())
        .map_err(|e| TransportError::Session(format!("readiness probe returned bad JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(
        reboot_pending: bool,
        features: bool,
        kernel: bool,
        installed: bool,
        ready: bool,
    ) -> WslReadinessReport {
        WslReadinessReport {
            feature_enabled: features,
            vm_platform_enabled: features,
            kernel_installed: kernel,
            distribution_installed: installed,
            distribution_ready: ready,
            reboot_pending,
            message: String::new(),
        }
    }

    #[test]
    fn test_state_precedence() {
        // Reboot pending masks everything else
        assert_eq!(
            report(true, true, true, true, true).state(),
            BootstrapState::RebootPending
        );
        assert_eq!(
            report(false, false, false, false, false).state(),
            BootstrapState::NotInstalled
        );
        assert_eq!(
            report(false, true, false, false, false).state(),
            BootstrapState::KernelMissing
        );
        assert_eq!(
            report(false, true, true, false, false).state(),
            BootstrapState::DistributionMissing
        );
        assert_eq!(
            report(false, true, true, true, false).state(),
            BootstrapState::DistributionNotReady
        );
        assert_eq!(
            report(false, true, true, true, true).state(),
            BootstrapState::Ready
        );
    }

    #[test]
    fn test_parse_host_flags() {
        let json = r#"{"wsl_enabled":true,"vm_platform_enabled":false,"reboot_pending":true,"signals":"windows-update"}"#;
        let flags = parse_host_flags(json).unwrap();
        assert!(flags.wsl_enabled);
        assert!(!flags.vm_platform_enabled);
        assert!(flags.reboot_pending);
        assert_eq!(flags.signals, "windows-update");
    }

    #[test]
    fn test_parse_host_flags_with_banner_noise() {
        let out = "Windows PowerShell\r\n{\"wsl_enabled\":false,\"vm_platform_enabled\":false,\"reboot_pending\":false,\"signals\":\"\"}\r\n";
        let flags = parse_host_flags(out).unwrap();
        assert!(!flags.wsl_enabled);
        assert!(!flags.reboot_pending);
    }

    #[test]
    fn test_parse_host_flags_rejects_garbage() {
        assert!(matches!(
            parse_host_flags("Access is denied"),
            Err(TransportError::Session(_))
        ));
        assert!(matches!(
            parse_host_flags("{not json"),
            Err(TransportError::Session(_))
        ));
    }

    #[test]
    fn test_report_serializes_round_trip() {
        let r = report(false, true, true, true, true);
        let json = serde_json::to_string(&r).unwrap();
        let back: WslReadinessReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(back.is_ready());
    }
}
