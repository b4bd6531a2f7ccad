//! Linux command execution over SSH
//!
//! Password authentication only, matching the credential model. The ssh2
//! session is synchronous, so each call runs inside `spawn_blocking`; the
//! session is built per call and torn down before returning.
//!
//! Host keys are accepted on first use. Commands always go through
//! `sh -c <escaped>` so shell metacharacters in the caller's command string
//! cannot break out of the argument position.

use crate::constants::{SSH_CONNECT_TIMEOUT_SECS, SSH_IO_TIMEOUT_SECS};
use crate::core::transport::{CommandResult, Transport};
use crate::models::Target;
use crate::utils::TransportError;
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;
use tracing::debug;

pub struct SshTransport {
    io_timeout: Duration,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(SSH_IO_TIMEOUT_SECS),
        }
    }
}

impl SshTransport {
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }

    fn run_blocking(
        host: String,
        port: u16,
        username: String,
        password: String,
        command: String,
        io_timeout: Duration,
    ) -> Result<CommandResult, TransportError> {
        let tcp = TcpStream::connect_timeout(
            &resolve_addr(&host, port)?,
            Duration::from_secs(SSH_CONNECT_TIMEOUT_SECS),
        )
        .map_err(|e| TransportError::Unreachable(format!("{}:{}: {}", host, port, e)))?;
        tcp.set_read_timeout(Some(io_timeout)).ok();
        tcp.set_write_timeout(Some(io_timeout)).ok();

        let mut sess = Session::new()
            .map_err(|e| TransportError::Session(format!("SSH session init failed: {e}")))?;
        sess.set_tcp_stream(tcp);
        sess.handshake()
            .map_err(|e| TransportError::Session(format!("SSH handshake failed: {e}")))?;

        sess.userauth_password(&username, &password)
            .map_err(|_| TransportError::AuthFailed { transport: "ssh" })?;
        if !sess.authenticated() {
            return Err(TransportError::AuthFailed { transport: "ssh" });
        }

        let mut channel = sess
            .channel_session()
            .map_err(|e| TransportError::Session(format!("SSH channel open failed: {e}")))?;
        channel
            .exec(&format!("sh -c {}", shell_escape::escape(command.into())))
            .map_err(|e| TransportError::Session(format!("SSH exec failed: {e}")))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| TransportError::Session(format!("SSH read failed: {e}")))?;
        let mut stderr = String::new();
        let _ = channel.stderr().read_to_string(&mut stderr);
        let exit_status = channel.exit_status().unwrap_or(0);
        channel.wait_close().ok();

        // Combined output; stderr appended so the failure heuristic and the
        // caller both see diagnostics from the remote shell
        if !stderr.trim().is_empty() {
            if !stdout.is_empty() && !stdout.ends_with('\n') {
                stdout.push('\n');
            }
            stdout.push_str(&stderr);
        }

        Ok(CommandResult::with_exit(stdout, exit_status))
    }
}

/// Resolve host:port to a socket address for `connect_timeout`, which
/// (unlike `TcpStream::connect`) does not accept a `ToSocketAddrs` pair
fn resolve_addr(host: &str, port: u16) -> Result<std::net::SocketAddr, TransportError> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Unreachable(format!("{}: {}", host, e)))?
        .next()
        .ok_or_else(|| TransportError::Unreachable(format!("{}: no addresses resolved", host)))
}

#[async_trait::async_trait]
impl Transport for SshTransport {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn exec(&self, target: &Target, command: &str) -> CommandResult {
        let (host, port) = target.host_port(crate::constants::SSH_PORT);
        let host = host.to_string();
        let username = target.credentials().username().as_str().to_string();
        let password = target.credentials().password().as_str().to_string();
        let command = command.to_string();
        let io_timeout = self.io_timeout;

        debug!(host = host.as_str(), port, "SSH exec");

        let result = tokio::task::spawn_blocking(move || {
            Self::run_blocking(host, port, username, password, command, io_timeout)
        })
        .await;

        match result {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => CommandResult::failed(err),
            Err(e) => {
                CommandResult::failed(TransportError::Session(format!("SSH task failed: {e}")))
            }
        }
    }
}
