//! WSL bootstrap state machine
//!
//! Drives a Windows target from any readiness state to a working WSL guest:
//! assess, run the missing install steps, reboot when Windows demands one,
//! wait the host back, and re-assess. Reboots are bounded by a per-target
//! budget that survives across `install` calls, so a host that keeps asking
//! for "one more reboot" can never put the orchestrator into a reboot loop.

use crate::constants::{
    DEFAULT_MAX_REBOOT_ATTEMPTS, DEFAULT_WSL_DISTRO, REBOOT_GRACE_SECS, REBOOT_OFFLINE_WAIT_SECS,
    REBOOT_ONLINE_WAIT_SECS, REBOOT_POLL_INTERVAL_SECS,
};
use crate::core::transport::Transport;
use crate::models::Target;
use crate::utils::errors::BootstrapError;
use crate::utils::retry::{poll_until, PollConfig};
use crate::wsl::readiness::{BootstrapState, WslReadinessProbe, WslReadinessReport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cheap remote probe used to detect the host going down and coming back
const LIVENESS_PROBE: &str = "$env:COMPUTERNAME";

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// WSL distribution to install and verify
    pub distro: String,
    /// Reboots allowed per target before giving up
    pub max_reboot_attempts: u32,
    /// Reboot the target ourselves when Windows requires it. When false,
    /// the outcome reports `needs_reboot` and leaves the host untouched.
    pub auto_reboot: bool,
    /// Block until the rebooted host is back and then continue the cycle.
    /// When false, the reboot is issued and the outcome reports `rebooting`
    /// so the caller can re-invoke `install` later.
    pub wait_for_reboot: bool,
    /// How long to wait for the host to drop off the network after a
    /// reboot command
    pub offline_wait: Duration,
    /// How long to wait for the host to accept sessions again
    pub online_wait: Duration,
    /// Pause between liveness probes while waiting
    pub poll_interval: Duration,
    /// Extra settle time after the host answers again; services that the
    /// next probe depends on lag behind the first successful session
    pub stabilization_grace: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            distro: DEFAULT_WSL_DISTRO.to_string(),
            max_reboot_attempts: DEFAULT_MAX_REBOOT_ATTEMPTS,
            auto_reboot: true,
            wait_for_reboot: true,
            offline_wait: Duration::from_secs(REBOOT_OFFLINE_WAIT_SECS),
            online_wait: Duration::from_secs(REBOOT_ONLINE_WAIT_SECS),
            poll_interval: Duration::from_secs(REBOOT_POLL_INTERVAL_SECS),
            stabilization_grace: Duration::from_secs(REBOOT_GRACE_SECS),
        }
    }
}

/// Per-target reboot counter, shared across `install` calls.
///
/// The count is keyed by target address and only ever grows within a
/// budget's lifetime; `reset` is for callers that know the target was
/// reprovisioned out of band.
#[derive(Default)]
pub struct RebootBudget {
    attempts: Mutex<HashMap<String, u32>>,
}

impl RebootBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self, address: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Record one reboot attempt and return the new count
    pub fn record_attempt(&self, address: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(address.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset(&self, address: &str) {
        self.attempts.lock().unwrap().remove(address);
    }
}

/// What one `install` call achieved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallOutcome {
    /// The call finished its work (possibly concluding "nothing to do")
    pub success: bool,
    /// The guest answers commands end-to-end
    pub ready: bool,
    /// Windows requires a reboot before progress can continue
    pub needs_reboot: bool,
    /// A reboot was issued and the caller should re-invoke `install` once
    /// the host is back
    pub rebooting: bool,
    pub message: String,
}

impl InstallOutcome {
    fn ready(message: impl Into<String>) -> Self {
        Self {
            success: true,
            ready: true,
            needs_reboot: false,
            rebooting: false,
            message: message.into(),
        }
    }

    fn needs_reboot(message: impl Into<String>) -> Self {
        Self {
            success: true,
            ready: false,
            needs_reboot: true,
            rebooting: false,
            message: message.into(),
        }
    }

    fn rebooting(message: impl Into<String>) -> Self {
        Self {
            success: true,
            ready: false,
            needs_reboot: true,
            rebooting: true,
            message: message.into(),
        }
    }

    fn stalled(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ready: false,
            needs_reboot: false,
            rebooting: false,
            message: message.into(),
        }
    }
}

/// The install / reboot / re-assess cycle for one transport
pub struct WslBootstrap {
    transport: Arc<dyn Transport>,
    config: BootstrapConfig,
    budget: Arc<RebootBudget>,
}

impl WslBootstrap {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: BootstrapConfig,
        budget: Arc<RebootBudget>,
    ) -> Self {
        Self {
            transport,
            config,
            budget,
        }
    }

    pub fn probe(&self) -> WslReadinessProbe {
        WslReadinessProbe::new(self.transport.clone(), self.config.distro.clone())
    }

    /// Drive the target toward a ready WSL guest.
    ///
    /// Idempotent: a target that is already ready returns immediately with
    /// no remote mutation and no budget consumed. Channel failures and a
    /// host that never returns from a reboot are errors; every other
    /// shortfall comes back as a structured [`InstallOutcome`].
    pub async fn install(&self, target: &Target) -> Result<InstallOutcome, BootstrapError> {
        let probe = self.probe();

        loop {
            let report = probe.assess(target).await?;
            debug!(
                address = target.address(),
                state = ?report.state(),
                "bootstrap assessment"
            );

            match report.state() {
                BootstrapState::Ready => {
                    return Ok(InstallOutcome::ready(report.message));
                }
                BootstrapState::RebootPending => {
                    if !self.config.auto_reboot {
                        return Ok(InstallOutcome::needs_reboot(report.message));
                    }
                    match self.reboot_cycle(target).await? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
                _ => {}
            }

            self.run_install_steps(target, &report).await?;

            let after = probe.assess(target).await?;
            match after.state() {
                BootstrapState::Ready => {
                    info!(address = target.address(), "WSL bootstrap complete");
                    return Ok(InstallOutcome::ready(after.message));
                }
                BootstrapState::RebootPending => {
                    if !self.config.auto_reboot {
                        return Ok(InstallOutcome::needs_reboot(after.message));
                    }
                    match self.reboot_cycle(target).await? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
                state => {
                    // Install steps ran but the target did not advance;
                    // looping again would repeat the same steps verbatim
                    warn!(
                        address = target.address(),
                        state = ?state,
                        "install steps did not reach readiness"
                    );
                    return Ok(InstallOutcome::stalled(after.message));
                }
            }
        }
    }

    /// Run whichever install steps the report says are missing. A step whose
    /// channel fails aborts the pass; a step that merely exits non-zero is
    /// logged and tolerated, the re-assessment decides what it meant.
    async fn run_install_steps(
        &self,
        target: &Target,
        report: &WslReadinessReport,
    ) -> Result<(), BootstrapError> {
        if !report.feature_enabled {
            self.step(
                target,
                "Enable-WindowsOptionalFeature -Online -FeatureName Microsoft-Windows-Subsystem-Linux -All -NoRestart",
            )
            .await?;
        }
        if !report.vm_platform_enabled {
            self.step(
                target,
                "Enable-WindowsOptionalFeature -Online -FeatureName VirtualMachinePlatform -All -NoRestart",
            )
            .await?;
        }

        self.step(target, "wsl.exe --update").await?;
        self.step(target, "wsl.exe --set-default-version 2").await?;

        if !report.distribution_installed {
            self.step(
                target,
                &format!(
                    "wsl.exe --install --distribution {} --no-launch",
                    self.config.distro
                ),
            )
            .await?;
        }

        Ok(())
    }

    async fn step(&self, target: &Target, command: &str) -> Result<(), BootstrapError> {
        debug!(address = target.address(), command, "install step");
        let result = self.transport.exec(target, command).await;
        if let Some(err) = result.transport_error {
            return Err(BootstrapError::Transport(err));
        }
        if !result.succeeded() {
            warn!(
                address = target.address(),
                command,
                output = result.stdout.trim(),
                "install step reported failure, continuing to re-assessment"
            );
        }
        Ok(())
    }

    /// One bounded reboot: spend budget, issue the reboot, optionally wait
    /// the host back. `Ok(None)` means the cycle may continue; `Ok(Some)`
    /// is a terminal outcome for this call.
    async fn reboot_cycle(&self, target: &Target) -> Result<Option<InstallOutcome>, BootstrapError> {
        let address = target.address();

        let spent = self.budget.attempts(address);
        if spent >= self.config.max_reboot_attempts {
            let err = BootstrapError::RebootBudgetExhausted {
                address: address.to_string(),
                attempts: spent,
            };
            warn!(address, attempts = spent, "reboot budget exhausted");
            return Ok(Some(InstallOutcome::stalled(err.to_string())));
        }

        let attempt = self.budget.record_attempt(address);
        info!(
            address,
            attempt,
            max = self.config.max_reboot_attempts,
            "rebooting target"
        );

        // The channel often dies mid-command when the reboot lands, so a
        // failure here is expected and not fatal
        let result = self.transport.exec(target, "Restart-Computer -Force").await;
        if !result.succeeded() {
            debug!(address, "reboot command did not confirm (host likely going down)");
        }

        if !self.config.wait_for_reboot {
            return Ok(Some(InstallOutcome::rebooting(format!(
                "reboot {attempt} of {} issued to {address}; re-run install once the host is back",
                self.config.max_reboot_attempts
            ))));
        }

        self.wait_for_host(target).await?;
        Ok(None)
    }

    /// Wait for the host to go down and come back. Missing the "down" phase
    /// is tolerated (a fast host can complete the reboot between probes);
    /// missing the "up" phase is a hard error.
    async fn wait_for_host(&self, target: &Target) -> Result<(), BootstrapError> {
        let offline = PollConfig::new(self.config.offline_wait, self.config.poll_interval);
        let went_down = poll_until(offline, || async move {
            !self.transport.exec(target, LIVENESS_PROBE).await.succeeded()
        })
        .await;
        if !went_down {
            debug!(
                address = target.address(),
                "host never observed offline; assuming the reboot was quick"
            );
        }

        let online = PollConfig::new(self.config.online_wait, self.config.poll_interval);
        let back = poll_until(online, || async move {
            self.transport.exec(target, LIVENESS_PROBE).await.succeeded()
        })
        .await;
        if !back {
            return Err(BootstrapError::TimeoutWaitingForHost {
                address: target.address().to_string(),
                waited: self.config.online_wait,
            });
        }

        // Sessions answer before WinRM and WSL fully settle
        tokio::time::sleep(self.config.stabilization_grace).await;
        Ok(())
    }
}
