//! SSH / SFTP sessions backed by russh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use secrecy::ExposeSecret;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::errors::ManagerError;
use crate::models::deployment::CommandOutput;
use crate::remote::session::{
    CommandSession, ConnectionSpec, RemoteSession, SessionFactory, TransferSession,
};

/// SSH extended-data stream id for stderr
const STDERR_STREAM: u32 = 1;

/// Status recorded for a command the remote side killed with a signal
const SIGNAL_EXIT_STATUS: u32 = 255;

/// Client handler for the device.
///
/// The tablet regenerates its host key on OS updates, so any key is accepted
/// and only logged.
struct DeviceHandler {
    host: String,
}

impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!("Accepting host key presented by {}", self.host);
        Ok(true)
    }
}

/// Opens password-authenticated SSH sessions to the device
#[derive(Clone)]
pub struct SshSessionFactory {
    config: Arc<client::Config>,
}

impl SshSessionFactory {
    /// Create a factory with the default client configuration
    pub fn new() -> Self {
        let config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
        }
    }

    async fn connect(&self, spec: &ConnectionSpec) -> Result<Handle<DeviceHandler>, ManagerError> {
        let target = spec.target();
        debug!("Connecting to {}", target);

        let attempt = async {
            let handler = DeviceHandler {
                host: spec.host().to_string(),
            };
            let mut handle = client::connect(
                self.config.clone(),
                (spec.host().to_string(), spec.port()),
                handler,
            )
            .await?;

            let auth = handle
                .authenticate_password(spec.username(), spec.credential().expose_secret())
                .await?;
            if !auth.success() {
                return Err(ManagerError::ConnectError(format!(
                    "authentication rejected for {}",
                    target
                )));
            }
            Ok(handle)
        };

        match tokio::time::timeout(spec.connect_timeout(), attempt).await {
            Ok(Ok(handle)) => {
                info!("Connected to {}", target);
                Ok(handle)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ManagerError::ConnectError(format!(
                "timed out after {}s connecting to {}",
                spec.connect_timeout().as_secs(),
                target
            ))),
        }
    }
}

impl Default for SshSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionFactory for SshSessionFactory {
    async fn open_command_session(
        &self,
        spec: &ConnectionSpec,
    ) -> Result<Box<dyn CommandSession>, ManagerError> {
        let handle = self.connect(spec).await?;
        Ok(Box::new(SshCommandSession {
            handle,
            closed: false,
        }))
    }

    async fn open_transfer_session(
        &self,
        spec: &ConnectionSpec,
    ) -> Result<Box<dyn TransferSession>, ManagerError> {
        let handle = self.connect(spec).await?;

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        Ok(Box::new(SshTransferSession {
            handle,
            sftp,
            closed: false,
        }))
    }
}

async fn disconnect(handle: &Handle<DeviceHandler>) -> Result<(), ManagerError> {
    handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await?;
    Ok(())
}

/// Exec-channel session
pub struct SshCommandSession {
    handle: Handle<DeviceHandler>,
    closed: bool,
}

#[async_trait]
impl RemoteSession for SshCommandSession {
    async fn close(&mut self) -> Result<(), ManagerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        disconnect(&self.handle).await
    }
}

#[async_trait]
impl CommandSession for SshCommandSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ManagerError> {
        debug!("exec: {}", command);

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ManagerError::CommandError(format!("{}: {}", command, e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| ManagerError::CommandError(format!("{}: {}", command, e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        let mut killed = false;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                ChannelMsg::ExitSignal {
                    signal_name,
                    error_message,
                    ..
                } => {
                    warn!("{} terminated by signal {:?}", command, signal_name);
                    stderr.extend_from_slice(
                        format!("terminated by signal {:?} {}\n", signal_name, error_message)
                            .as_bytes(),
                    );
                    killed = true;
                }
                _ => {}
            }
        }
        let exit_status = settle_exit_status(exit_status, killed);

        let output = CommandOutput {
            command: command.to_string(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        };
        debug!("exit status {:?} for: {}", output.exit_status, command);
        Ok(output)
    }
}

/// A signal without an exit status still counts as a failure
fn settle_exit_status(exit_status: Option<u32>, killed: bool) -> Option<u32> {
    match exit_status {
        Some(code) => Some(code),
        None if killed => Some(SIGNAL_EXIT_STATUS),
        None => None,
    }
}

/// SFTP subsystem session
pub struct SshTransferSession {
    handle: Handle<DeviceHandler>,
    sftp: SftpSession,
    closed: bool,
}

#[async_trait]
impl RemoteSession for SshTransferSession {
    async fn close(&mut self) -> Result<(), ManagerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let sftp_result = self.sftp.close().await;
        disconnect(&self.handle).await?;
        sftp_result?;
        Ok(())
    }
}

#[async_trait]
impl TransferSession for SshTransferSession {
    async fn exists(&mut self, path: &str) -> Result<bool, ManagerError> {
        Ok(self.sftp.try_exists(path).await?)
    }

    async fn create_dir(&mut self, path: &str) -> Result<(), ManagerError> {
        debug!("mkdir: {}", path);
        self.sftp.create_dir(path).await?;
        Ok(())
    }

    async fn write(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ManagerError> {
        let mut file = self.sftp.create(path).await?;
        let written = tokio::io::copy(source, &mut file)
            .await
            .map_err(|e| ManagerError::TransferError(format!("{}: {}", path, e)))?;
        file.shutdown()
            .await
            .map_err(|e| ManagerError::TransferError(format!("{}: {}", path, e)))?;

        debug!("Wrote {} bytes to {}", written, path);
        Ok(written)
    }
}
