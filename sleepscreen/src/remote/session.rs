//! Session traits and connection parameters

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::errors::ManagerError;
use crate::models::deployment::CommandOutput;

/// SSH port of the device
pub const SSH_PORT: u16 = 22;

/// Connect + authenticate bound for every session
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for one workflow invocation.
///
/// Built once from user input and only ever borrowed afterwards, so every
/// session a workflow opens sees the same values.
pub struct ConnectionSpec {
    host: String,
    port: u16,
    username: String,
    credential: SecretString,
    connect_timeout: Duration,
}

impl ConnectionSpec {
    /// Create a spec for the standard SSH port and connect timeout
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        let host: String = host.into();
        let username: String = username.into();
        let credential: String = credential.into();

        Self {
            host: host.trim().to_string(),
            port: SSH_PORT,
            username: username.trim().to_string(),
            credential: SecretString::from(credential),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &SecretString {
        &self.credential
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// `user@host:port`, for logs and messages
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Reject blank host, username or password
    pub fn validate(&self) -> Result<(), ManagerError> {
        if self.host.is_empty() {
            return Err(ManagerError::ValidationError("device address is empty".into()));
        }
        if self.username.is_empty() {
            return Err(ManagerError::ValidationError("username is empty".into()));
        }
        if self.credential.expose_secret().trim().is_empty() {
            return Err(ManagerError::ValidationError("password is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("credential", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Behaviour shared by every open session
#[async_trait]
pub trait RemoteSession: Send {
    /// Close the underlying connection
    async fn close(&mut self) -> Result<(), ManagerError>;
}

/// A session that executes shell command lines on the device
#[async_trait]
pub trait CommandSession: RemoteSession {
    /// Run one command line to completion, capturing stdout, stderr and exit status
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ManagerError>;
}

/// A file-transfer session on the device filesystem
#[async_trait]
pub trait TransferSession: RemoteSession {
    /// Whether anything exists at `path`
    async fn exists(&mut self, path: &str) -> Result<bool, ManagerError>;

    /// Create a single directory; the parent must exist
    async fn create_dir(&mut self, path: &str) -> Result<(), ManagerError>;

    /// Stream `source` into `path`, replacing any existing file.
    /// Returns the number of bytes written.
    async fn write(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ManagerError>;
}

/// Opens sessions to the device described by a [`ConnectionSpec`].
///
/// Implementations fail fast with [`ManagerError::ConnectError`] and never retry.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_command_session(
        &self,
        spec: &ConnectionSpec,
    ) -> Result<Box<dyn CommandSession>, ManagerError>;

    async fn open_transfer_session(
        &self,
        spec: &ConnectionSpec,
    ) -> Result<Box<dyn TransferSession>, ManagerError>;
}

/// Close a session at the end of a workflow step. A failing close never
/// overrides the step's own outcome.
pub async fn release<S>(session: &mut S)
where
    S: RemoteSession + ?Sized,
{
    if let Err(e) = session.close().await {
        debug!("Ignoring error while closing session: {}", e);
    }
}
