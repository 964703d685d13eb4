//! In-memory stand-ins for the device and the local collaborators

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use rmsleep::assets::DefaultArtifactProvider;
use rmsleep::deploy::device::ACTIVE_IMAGE;
use rmsleep::errors::ManagerError;
use rmsleep::http::gallery::GalleryClient;
use rmsleep::imaging::ImagePipeline;
use rmsleep::models::deployment::CommandOutput;
use rmsleep::models::gallery::{GalleryCatalog, GalleryItem};
use rmsleep::remote::session::{
    CommandSession, ConnectionSpec, RemoteSession, SessionFactory, TransferSession,
};

/// Bytes of the image the fake device ships with
pub const STOCK_IMAGE: &[u8] = b"stock sleep screen";

/// Bytes every fake resize produces
pub const RESIZED_IMAGE: &[u8] = b"resized sleep screen";

/// Everything the fake device knows and everything done to it
#[derive(Debug, Default)]
pub struct DeviceState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,

    /// Command lines as received, compound lines unsplit
    pub commands: Vec<String>,

    /// Upload destinations in order
    pub uploads: Vec<String>,

    pub connects: usize,
    pub closes: usize,

    /// Clause -> exit status for clauses that should fail
    pub failing: HashMap<String, u32>,

    /// Command line -> (stdout, stderr)
    pub replies: HashMap<String, (String, String)>,

    pub refuse_connections: bool,

    /// Upload destinations that fail with a transfer error
    pub failing_writes: BTreeSet<String>,
}

impl DeviceState {
    fn exists(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path) || self.files.contains_key(path)
    }

    fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        self.dirs.retain(|d| d != path && !d.starts_with(&prefix));
        self.files.retain(|f, _| f != path && !f.starts_with(&prefix));
    }

    /// Apply one clause of a command line; returns its exit status
    fn apply(&mut self, clause: &str) -> u32 {
        if let Some(status) = self.failing.get(clause) {
            return *status;
        }

        let words: Vec<&str> = clause.split_whitespace().collect();
        match words.as_slice() {
            ["mv", src, dst] => match self.files.remove(*src) {
                Some(data) => {
                    self.files.insert(dst.to_string(), data);
                    0
                }
                None => 1,
            },
            ["rm", "-f", path] => {
                self.files.remove(*path);
                0
            }
            ["rm", "-rf", path] => {
                self.remove_tree(path);
                0
            }
            _ => 0,
        }
    }
}

/// A tablet that lives in memory. Clones share state.
#[derive(Clone)]
pub struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    /// A device with the stock directory tree and sleep screen
    pub fn new() -> Self {
        let mut state = DeviceState::default();
        for dir in [
            "/home",
            "/home/root",
            "/usr",
            "/usr/share",
            "/usr/share/remarkable",
            "/etc",
            "/etc/systemd",
            "/etc/systemd/system",
        ] {
            state.dirs.insert(dir.to_string());
        }
        state
            .files
            .insert(ACTIVE_IMAGE.to_string(), STOCK_IMAGE.to_vec());

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    pub fn fail_clause(&self, clause: &str, status: u32) {
        self.state().failing.insert(clause.to_string(), status);
    }

    pub fn reply(&self, command: &str, stdout: &str, stderr: &str) {
        self.state()
            .replies
            .insert(command.to_string(), (stdout.to_string(), stderr.to_string()));
    }

    pub fn fail_write(&self, path: &str) {
        self.state().failing_writes.insert(path.to_string());
    }

    pub fn refuse_connections(&self) {
        self.state().refuse_connections = true;
    }

    fn connect(&self) -> Result<(), ManagerError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(ManagerError::ConnectError(
                "connection refused by 10.11.99.1:22".into(),
            ));
        }
        state.connects += 1;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for FakeDevice {
    async fn open_command_session(
        &self,
        _spec: &ConnectionSpec,
    ) -> Result<Box<dyn CommandSession>, ManagerError> {
        self.connect()?;
        Ok(Box::new(FakeSession {
            device: self.clone(),
        }))
    }

    async fn open_transfer_session(
        &self,
        _spec: &ConnectionSpec,
    ) -> Result<Box<dyn TransferSession>, ManagerError> {
        self.connect()?;
        Ok(Box::new(FakeSession {
            device: self.clone(),
        }))
    }
}

struct FakeSession {
    device: FakeDevice,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn close(&mut self) -> Result<(), ManagerError> {
        self.device.state().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl CommandSession for FakeSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ManagerError> {
        let mut state = self.device.state();
        state.commands.push(command.to_string());

        // `&&` stops at the first failing clause like a real shell
        let mut status = 0;
        for clause in command.split(" && ") {
            status = state.apply(clause.trim());
            if status != 0 {
                break;
            }
        }

        let (stdout, stderr) = state.replies.get(command).cloned().unwrap_or_default();
        Ok(CommandOutput {
            command: command.to_string(),
            stdout,
            stderr,
            exit_status: Some(status),
        })
    }
}

#[async_trait]
impl TransferSession for FakeSession {
    async fn exists(&mut self, path: &str) -> Result<bool, ManagerError> {
        Ok(self.device.state().exists(path))
    }

    async fn create_dir(&mut self, path: &str) -> Result<(), ManagerError> {
        let mut state = self.device.state();
        let parent = parent_of(path);
        if !state.exists(&parent) {
            return Err(ManagerError::TransferError(format!("no such directory: {}", parent)));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn write(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ManagerError> {
        let mut data = Vec::new();
        source.read_to_end(&mut data).await?;

        let mut state = self.device.state();
        if state.failing_writes.contains(path) {
            return Err(ManagerError::TransferError(format!("{}: no space left on device", path)));
        }
        let parent = parent_of(path);
        if !state.exists(&parent) {
            return Err(ManagerError::TransferError(format!("no such directory: {}", parent)));
        }
        let written = data.len() as u64;
        state.files.insert(path.to_string(), data);
        state.uploads.push(path.to_string());
        Ok(written)
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// Records every resize and writes [`RESIZED_IMAGE`] to a fresh file
pub struct FakeResizer {
    output_dir: PathBuf,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeResizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImagePipeline for FakeResizer {
    async fn resize_to_target(&self, source: &Path) -> Result<PathBuf, ManagerError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(source.to_path_buf());
            calls.len()
        };
        let output = self.output_dir.join(format!("resized_{}.png", index));
        tokio::fs::write(&output, RESIZED_IMAGE).await?;
        Ok(output)
    }
}

/// Resizer that rejects every source
pub struct FailingResizer;

#[async_trait]
impl ImagePipeline for FailingResizer {
    async fn resize_to_target(&self, source: &Path) -> Result<PathBuf, ManagerError> {
        let cause = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("cannot decode {}", source.display()),
        );
        Err(ManagerError::ImageError(image::ImageError::IoError(cause)))
    }
}

/// Default image provider pointing at a fixed path, which may not exist
pub struct FixedDefault(pub PathBuf);

#[async_trait]
impl DefaultArtifactProvider for FixedDefault {
    async fn default_image(&self) -> Result<PathBuf, ManagerError> {
        Ok(self.0.clone())
    }
}

/// Gallery serving one catalog; every download yields `blob`
pub struct FakeGallery {
    pub catalog: GalleryCatalog,
    pub blob: Vec<u8>,
    pub download_dir: PathBuf,
}

#[async_trait]
impl GalleryClient for FakeGallery {
    async fn fetch_catalog(&self) -> Result<GalleryCatalog, ManagerError> {
        Ok(self.catalog.clone())
    }

    async fn download(&self, item: &GalleryItem) -> Result<PathBuf, ManagerError> {
        let path = self.download_dir.join(format!("{}.png", item.id));
        tokio::fs::write(&path, &self.blob).await?;
        Ok(path)
    }
}

/// The connection every test uses
pub fn spec() -> ConnectionSpec {
    ConnectionSpec::new("10.11.99.1", "root", "x")
}

/// Write a small file with the given name and bytes
pub fn local_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
