//! Password-auth SSH plumbing for the interactive shell and the
//! post-provisioning access probe. Connections are short-lived: one per
//! executed command, torn down as soon as the output is drained.

pub mod command;

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys;
use russh::{ChannelMsg, Disconnect, Preferred};
use thiserror::Error;
use tokio::time::timeout;

use crate::models::RemoteSession;

pub use command::{prepare, PreparedCommand};

/// Outer budget for connect + password auth when running a command.
pub const EXEC_CONNECT_BUDGET: Duration = Duration::from_secs(10);

pub const PROBE_ATTEMPTS: u32 = 5;
pub const PROBE_CONNECT_BUDGET: Duration = Duration::from_secs(5);
pub const PROBE_EXEC_BUDGET: Duration = Duration::from_secs(10);
pub const PROBE_RETRY_PAUSE: Duration = Duration::from_secs(3);

/// Proves both login and sudo work for the freshly provisioned user.
pub const ELEVATION_PROBE: &str = "sudo su -c \"whoami\"";

/// Remote shell failures. None of these invalidate the stored session;
/// the next command simply opens a fresh connection.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Connection timeout to {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Authentication rejected for user {0}")]
    AuthRejected(String),
    #[error("Execution error: {0}")]
    ChannelSetup(String),
    #[error("Command execution timeout ({0}s)")]
    ExecTimeout(u64),
}

/// Accepts any server key; provisioned guests regenerate host keys on
/// first boot so there is nothing to pin against.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Captured streams and exit status of one remote command.
#[derive(Debug, Default)]
pub struct ExecCapture {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
}

/// A short-lived authenticated connection.
pub struct SshConnection {
    handle: client::Handle<SshHandler>,
}

fn client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: Some(Duration::from_secs(8)),
        keepalive_interval: Some(Duration::from_secs(1)),
        preferred: Preferred {
            kex: Cow::Borrowed(&[russh::kex::DH_G14_SHA256, russh::kex::DH_G14_SHA1]),
            cipher: Cow::Borrowed(&[
                russh::cipher::AES_128_CTR,
                russh::cipher::AES_192_CTR,
                russh::cipher::AES_256_CTR,
            ]),
            mac: Cow::Borrowed(&[russh::mac::HMAC_SHA256, russh::mac::HMAC_SHA1]),
            ..Default::default()
        },
        ..Default::default()
    })
}

impl SshConnection {
    /// Connect and authenticate with a password inside `budget`.
    pub async fn open(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        budget: Duration,
    ) -> Result<Self, ShellError> {
        let setup = async {
            let mut handle = client::connect(client_config(), (host, port), SshHandler)
                .await
                .map_err(|e| ShellError::Connect(e.to_string()))?;
            let auth = handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| ShellError::Connect(e.to_string()))?;
            if !auth.success() {
                return Err(ShellError::AuthRejected(username.to_string()));
            }
            Ok(handle)
        };
        let handle = timeout(budget, setup).await.map_err(|_| {
            ShellError::ConnectTimeout {
                host: host.to_string(),
                port,
            }
        })??;
        Ok(Self { handle })
    }

    /// Run one command and drain its output within `budget`.
    pub async fn exec(
        &self,
        wire: &str,
        budget: Duration,
        want_pty: bool,
    ) -> Result<ExecCapture, ShellError> {
        let secs = budget.as_secs();
        timeout(budget, self.exec_inner(wire, want_pty))
            .await
            .map_err(|_| ShellError::ExecTimeout(secs))?
    }

    async fn exec_inner(&self, wire: &str, want_pty: bool) -> Result<ExecCapture, ShellError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ShellError::ChannelSetup(e.to_string()))?;
        if want_pty {
            channel
                .request_pty(false, "xterm", 80, 24, 0, 0, &[])
                .await
                .map_err(|e| ShellError::ChannelSetup(e.to_string()))?;
        }
        channel
            .exec(true, wire)
            .await
            .map_err(|e| ShellError::ChannelSetup(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                _ => {}
            }
        }
        Ok(ExecCapture {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    pub async fn close(self) {
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}

/// Run one shell submission against the session's host. `sudo -i` is
/// handled locally; everything else opens a connection, executes, and
/// appends to history. Failures leave the session usable.
pub async fn execute(session: &mut RemoteSession, input: &str) -> Result<String, ShellError> {
    if command::is_elevation_request(input) {
        session.elevated = true;
        let notice = command::ELEVATION_NOTICE.to_string();
        session.push_history(input.trim(), &notice);
        return Ok(notice);
    }

    let prepared = command::prepare(input, session.elevated, &session.password);
    tracing::debug!(host = %session.host, timeout = ?prepared.timeout, "running remote command");

    let conn = SshConnection::open(
        &session.host,
        session.port,
        &session.username,
        &session.password,
        EXEC_CONNECT_BUDGET,
    )
    .await?;
    let result = conn.exec(&prepared.wire, prepared.timeout, true).await;
    conn.close().await;

    let capture = result?;
    let output = command::render_output(&capture.stdout, &capture.stderr, capture.exit_code);
    session.push_history(&prepared.recorded, &output);
    Ok(output)
}

/// Post-provisioning reachability report.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessReport {
    /// At least one attempt authenticated.
    pub reachable: bool,
    /// The elevation probe returned `root`.
    pub elevation_ok: bool,
    pub attempts: u32,
}

impl AccessReport {
    pub fn verified(&self) -> bool {
        self.reachable && self.elevation_ok
    }
}

/// Seam for the pipeline's SSH verification step.
#[allow(async_fn_in_trait)]
pub trait AccessProbe {
    async fn verify(&self, host: &str, port: u16, username: &str, password: &str) -> AccessReport;
}

/// Real prober: bounded attempts with a pause between them.
pub struct SshProber;

impl AccessProbe for SshProber {
    async fn verify(&self, host: &str, port: u16, username: &str, password: &str) -> AccessReport {
        let mut report = AccessReport::default();
        for attempt in 1..=PROBE_ATTEMPTS {
            report.attempts = attempt;
            match probe_once(host, port, username, password).await {
                Ok(elevated) => {
                    report.reachable = true;
                    if elevated {
                        report.elevation_ok = true;
                        return report;
                    }
                    tracing::warn!(host, attempt, "login succeeded but elevation probe failed");
                }
                Err(e) => {
                    tracing::warn!(host, attempt, error = %e, "SSH probe attempt failed");
                }
            }
            if attempt < PROBE_ATTEMPTS {
                tokio::time::sleep(PROBE_RETRY_PAUSE).await;
            }
        }
        report
    }
}

async fn probe_once(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<bool, ShellError> {
    let conn = SshConnection::open(host, port, username, password, PROBE_CONNECT_BUDGET).await?;
    let result = conn.exec(ELEVATION_PROBE, PROBE_EXEC_BUDGET, false).await;
    conn.close().await;
    let capture = result?;
    Ok(capture.exit_code == Some(0) && capture.stdout.trim() == "root")
}
