//! Windows command execution over PowerShell Remoting
//!
//! Commands reach the target through a locally spawned PowerShell process
//! driving `New-PSSession` / `Invoke-Command`. Secrets travel to that child
//! over stdin as JSON, never on the process argument list, and the remote
//! command text is base64-encoded so quoting in the payload cannot break the
//! wrapper script.
//!
//! `exec_in_guest` layers WSL delegation on top: verify the WSL runtime,
//! resolve the requested distribution against what is installed, warm the
//! distribution up if it is not running, then run the command inside it.

use crate::constants::{DEFAULT_WSL_DISTRO, WINRM_EXEC_TIMEOUT_SECS};
use crate::core::transport::{looks_like_failure, CommandResult, Transport};
use crate::models::Target;
use crate::utils::TransportError;
use crate::wsl::{clean_wsl_output, resolve_distro};
use base64::engine::general_purpose;
use base64::Engine;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Wrapper script run by the local PowerShell child. Reads the JSON payload
/// from stdin, opens an explicit PSSession, runs the decoded command, and
/// always removes the session in `finally` so wsmprovhost.exe on the target
/// is freed immediately instead of waiting out the WinRM idle timeout.
const PS_REMOTING_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
$session = $null
try {
    $raw = [Console]::In.ReadToEnd()
    if ([string]::IsNullOrWhiteSpace($raw)) { throw 'No input provided' }
    $payload = $raw | ConvertFrom-Json

    $server = [string]$payload.server
    $username = [string]$payload.username
    $pwPlain = [string]$payload.password
    $commandTextBytes = [System.Convert]::FromBase64String([string]$payload.command_b64)
    $commandText = [System.Text.Encoding]::UTF8.GetString($commandTextBytes)

    # Build SecureString without relying on module load
    $pwSecure = New-Object System.Security.SecureString
    $pwPlain.ToCharArray() | ForEach-Object { $pwSecure.AppendChar($_) }
    $cred = New-Object System.Management.Automation.PSCredential($username, $pwSecure)

    $session = New-PSSession -ComputerName $server -Credential $cred -ErrorAction Stop

    Invoke-Command -Session $session -ErrorAction Stop -ScriptBlock {
        param($scriptText)
        $sb = [ScriptBlock]::Create($scriptText)
        & $sb
    } -ArgumentList $commandText
} catch {
    Write-Error $_.Exception.Message
    exit 1
} finally {
    if ($session) {
        Remove-PSSession -Session $session -ErrorAction SilentlyContinue
    }
}"#;

#[derive(Serialize)]
struct PsRemotingPayload {
    server: String,
    username: String,
    password: String,
    command_b64: String,
}

pub struct WinRmTransport {
    shell: Option<PathBuf>,
    exec_timeout: Duration,
}

impl Default for WinRmTransport {
    fn default() -> Self {
        Self {
            shell: find_powershell(),
            exec_timeout: Duration::from_secs(WINRM_EXEC_TIMEOUT_SECS),
        }
    }
}

impl WinRmTransport {
    /// Construct with an explicit PowerShell path (or `None` to mark the
    /// transport unavailable). Tests and callers that vendor their own
    /// pwsh use this; everyone else uses `Default`.
    pub fn with_shell(shell: Option<PathBuf>) -> Self {
        Self {
            shell,
            exec_timeout: Duration::from_secs(WINRM_EXEC_TIMEOUT_SECS),
        }
    }

    async fn execute_remote(
        &self,
        target: &Target,
        command: &str,
    ) -> Result<String, TransportError> {
        let shell = self
            .shell
            .clone()
            .ok_or(TransportError::Unavailable("WinRM (PowerShell not found)"))?;

        let server = target.host().to_string();
        let password = target.credentials().password().as_str().to_string();

        // Secrets go over stdin so the password never appears in process
        // arguments; the command is base64-encoded to survive quoting.
        let payload_json = serde_json::to_string(&PsRemotingPayload {
            server: server.clone(),
            username: target.credentials().username().as_str().to_string(),
            password: password.clone(),
            command_b64: general_purpose::STANDARD.encode(command.as_bytes()),
        })
        .map_err(|e| TransportError::Session(format!("payload serialization failed: {e}")))?;

        debug!(server = server.as_str(), "WinRM exec");

        let spawn = tokio::task::spawn_blocking(move || {
            use std::io::Write;

            let mut child = std::process::Command::new(&shell)
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg(PS_REMOTING_SCRIPT)
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .spawn()
                .map_err(|e| {
                    TransportError::Session(format!("failed to spawn {}: {}", shell.display(), e))
                })?;

            {
                let mut stdin = child
                    .stdin
                    .take()
                    .ok_or_else(|| TransportError::Session("failed to open stdin".into()))?;
                stdin
                    .write_all(payload_json.as_bytes())
                    .map_err(|e| TransportError::Session(format!("stdin write failed: {e}")))?;
            }

            child
                .wait_with_output()
                .map_err(|e| TransportError::Session(format!("PowerShell wait failed: {e}")))
        });

        let output = tokio::time::timeout(self.exec_timeout, spawn)
            .await
            .map_err(|_| TransportError::Timeout(self.exec_timeout))?
            .map_err(|e| TransportError::Session(format!("task failed: {e}")))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let raw_error = if !stderr.is_empty() {
                stderr.to_string()
            } else if !stdout.is_empty() {
                stdout.to_string()
            } else {
                "unknown error".to_string()
            };

            // Redact the password from any echoed error output before it
            // reaches logs or callers
            let redacted = raw_error.replace(&password, "<redacted>");
            warn!(server = server.as_str(), error = redacted.as_str(), "WinRM command failed");
            return Err(simplify_winrm_error(&redacted));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command inside the target's WSL distribution, verifying the
    /// runtime and the distribution first so the caller gets a structured
    /// error instead of wsl.exe's localized UTF-16 complaints.
    async fn run_in_guest(
        &self,
        target: &Target,
        command: &str,
        distro: &str,
    ) -> Result<CommandResult, TransportError> {
        let status = match self.execute_remote(target, "wsl.exe --status").await {
            Ok(out) => out,
            Err(TransportError::Session(msg)) => {
                return Err(TransportError::WslNotReady(msg));
            }
            Err(other) => return Err(other),
        };
        // wsl.exe reports its own failures (e.g. `Error: 0x80370102`) on
        // stdout with a clean exit, so the wrapper's status code alone does
        // not gate the guest path; judge the answer text like any other
        // codeless transport result
        let status_text = clean_wsl_output(&status);
        if status_text.trim().is_empty() {
            return Err(TransportError::WslNotReady(
                "status query returned no output".to_string(),
            ));
        }
        if looks_like_failure(&status_text) {
            return Err(TransportError::WslNotReady(snippet(&status_text)));
        }

        let listed = self
            .execute_remote(target, "wsl.exe --list --quiet")
            .await?;
        let installed: Vec<String> = clean_wsl_output(&listed)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let resolved = resolve_distro(distro, &installed)
            .ok_or_else(|| TransportError::DistributionMissing(distro.to_string()))?;

        // A stopped distribution answers the first command slowly or not at
        // all; poke it with a no-op before the real command
        let running = self
            .execute_remote(target, "wsl.exe --list --running --quiet")
            .await
            .map(|out| clean_wsl_output(&out))
            .unwrap_or_default();
        if !running.lines().any(|l| l.trim() == resolved) {
            debug!(distro = resolved.as_str(), "warming up stopped WSL distribution");
            let _ = self
                .execute_remote(
                    target,
                    &format!("wsl.exe --distribution {resolved} --user root -- /bin/true"),
                )
                .await;
        }

        let guest_command = format!(
            "wsl.exe --distribution {} --user root -- sh -c {}",
            resolved,
            shell_escape::escape(command.into())
        );
        let output = self.execute_remote(target, &guest_command).await?;

        // wsl.exe does not forward the guest exit status through the
        // remoting wrapper; callers fall back to the output heuristic
        Ok(CommandResult::ok(clean_wsl_output(&output)))
    }
}

#[async_trait::async_trait]
impl Transport for WinRmTransport {
    fn name(&self) -> &'static str {
        "winrm"
    }

    async fn exec(&self, target: &Target, command: &str) -> CommandResult {
        match self.execute_remote(target, command).await {
            Ok(stdout) => CommandResult::ok(stdout),
            Err(err) => CommandResult::failed(err),
        }
    }

    async fn exec_in_guest(&self, target: &Target, command: &str, distro: &str) -> CommandResult {
        let distro = if distro.is_empty() {
            DEFAULT_WSL_DISTRO
        } else {
            distro
        };
        match self.run_in_guest(target, command, distro).await {
            Ok(result) => result,
            Err(err) => CommandResult::failed(err),
        }
    }
}

/// Locate a PowerShell binary on PATH. Windows hosts have powershell.exe;
/// Linux/macOS orchestrators may carry pwsh.
fn find_powershell() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(windows) {
        &["powershell.exe", "pwsh.exe"]
    } else {
        &["pwsh", "powershell"]
    };

    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for candidate in candidates {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
        }
    }
    None
}

/// Map raw PowerShell remoting noise to a structured, operator-actionable
/// transport error
fn simplify_winrm_error(raw_error: &str) -> TransportError {
    let lower = raw_error.to_lowercase();

    if lower.contains("access is denied")
        || lower.contains("access denied")
        || lower.contains("the user name or password is incorrect")
        || lower.contains("logon failure")
    {
        return TransportError::AuthFailed { transport: "winrm" };
    }

    if lower.contains("trustedhosts") || lower.contains("authentication scheme") {
        return TransportError::Session(
            "WinRM authentication failed. The target must be in TrustedHosts.\n\
             Run as admin: Set-Item WSMan:\\localhost\\Client\\TrustedHosts -Value '*' -Force"
                .to_string(),
        );
    }

    if lower.contains("cannot find the computer")
        || lower.contains("cannot be resolved")
        || lower.contains("network path was not found")
        || lower.contains("connection refused")
        || lower.contains("actively refused")
        || lower.contains("winrm cannot complete the operation")
    {
        return TransportError::Unreachable(snippet(raw_error));
    }

    TransportError::Session(snippet(raw_error))
}

fn snippet(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "remote command failed".to_string();
    }
    let max_len = 4000;
    if trimmed.len() > max_len {
        let mut end = max_len;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}
