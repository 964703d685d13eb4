//! Deployment workflows
//!
//! Every workflow follows the same outline: stage artifacts over one transfer
//! session, then activate them with one command session. Sessions are opened
//! per step and closed on every exit path. Failures are never retried; they
//! end the run and are folded into the returned [`WorkflowReport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::assets::DefaultArtifactProvider;
use crate::deploy::device::{
    self, OVERRIDE_DIR, OVERRIDE_FILE, ROTATION_LOG, ROTATION_SCRIPT, SCREENS_DIR, STAGING_IMAGE,
};
use crate::deploy::executor::WorkflowRun;
use crate::deploy::fsm::WorkflowEvent;
use crate::deploy::scripts::{rotation_script, service_override};
use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::http::gallery::GalleryClient;
use crate::imaging::ImagePipeline;
use crate::models::deployment::{
    DeploymentResult, RotationStatus, WorkflowKind, WorkflowProgress, WorkflowReport,
};
use crate::models::gallery::{GalleryCatalog, GalleryItem};
use crate::remote::fs::{self, RemoteArtifact};
use crate::remote::sequencer::{run_sequence, CommandSequence};
use crate::remote::session::{release, ConnectionSpec, SessionFactory, TransferSession};

/// One step of the staging phase
#[derive(Debug, Clone)]
enum StagingStep {
    EnsureDirectory(String),
    Upload(RemoteArtifact),
}

/// Runs deployment workflows against one device at a time.
///
/// Cloning is cheap; clones share the collaborators and the progress channel,
/// so a workflow can be moved onto its own task.
#[derive(Clone)]
pub struct Orchestrator {
    sessions: Arc<dyn SessionFactory>,
    images: Arc<dyn ImagePipeline>,
    defaults: Arc<dyn DefaultArtifactProvider>,
    gallery: Option<Arc<dyn GalleryClient>>,
    events: Option<mpsc::UnboundedSender<WorkflowProgress>>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        images: Arc<dyn ImagePipeline>,
        defaults: Arc<dyn DefaultArtifactProvider>,
    ) -> Self {
        Self {
            sessions,
            images,
            defaults,
            gallery: None,
            events: None,
        }
    }

    pub fn with_gallery(mut self, gallery: Arc<dyn GalleryClient>) -> Self {
        self.gallery = Some(gallery);
        self
    }

    /// Send a [`WorkflowProgress`] on every state change
    pub fn with_events(mut self, events: mpsc::UnboundedSender<WorkflowProgress>) -> Self {
        self.events = Some(events);
        self
    }

    fn start(&self, kind: WorkflowKind) -> WorkflowRun {
        WorkflowRun::new(kind, self.events.clone())
    }

    /// Check that the device answers and accepts the credentials
    pub async fn test_connection(&self, spec: &ConnectionSpec) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::TestConnection);
        let outcome = self.probe_connection(&mut run, spec).await;
        run.finish(outcome)
    }

    async fn probe_connection(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
    ) -> Result<DeploymentResult, ManagerError> {
        spec.validate()?;
        run.transition(WorkflowEvent::Activate, "Connecting")?;

        let result = self
            .execute(run, spec, &CommandSequence::atomic(["uname -a"]))
            .await?;
        if result.succeeded && result.combined_output.trim().is_empty() {
            return Err(ManagerError::CommandError(
                "device returned no system information".into(),
            ));
        }

        run.note(format!("Connected to {}", spec.target()));
        Ok(result)
    }

    /// Upload a local image and make it the active sleep screen.
    ///
    /// With `auto_resize` the image is letterboxed to the Paper Pro resolution
    /// first and the resized copy is uploaded instead of the original.
    pub async fn apply_image(
        &self,
        spec: &ConnectionSpec,
        image: &Path,
        auto_resize: bool,
    ) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::ApplyImage);
        let outcome = match validate_image(image).await {
            Ok(()) => self.deploy_image(&mut run, spec, image, auto_resize).await,
            Err(err) => Err(err),
        };
        run.finish(outcome)
    }

    /// Put the stock sleep screen back
    pub async fn restore_default(&self, spec: &ConnectionSpec) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::RestoreDefault);
        let outcome = match self.locate_default_image().await {
            Ok(image) => self.deploy_image(&mut run, spec, &image, false).await,
            Err(err) => Err(err),
        };
        run.finish(outcome)
    }

    async fn locate_default_image(&self) -> Result<PathBuf, ManagerError> {
        let image = self.defaults.default_image().await?;
        if !File::new(&image).exists().await {
            return Err(ManagerError::ResourceError(format!(
                "default image not found at {}",
                image.display()
            )));
        }
        Ok(image)
    }

    async fn deploy_image(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
        image: &Path,
        resize: bool,
    ) -> Result<DeploymentResult, ManagerError> {
        spec.validate()?;
        run.transition(WorkflowEvent::Stage, "Uploading image")?;

        let resized = if resize {
            let resized = self.images.resize_to_target(image).await?;
            run.note(format!("Resized {} to 1620x2160", image.display()));
            Some(resized)
        } else {
            None
        };

        let upload = resized.clone().unwrap_or_else(|| image.to_path_buf());
        let staged = self
            .stage(
                run,
                spec,
                &[StagingStep::Upload(RemoteArtifact::file(upload, STAGING_IMAGE))],
            )
            .await;
        if let Some(resized) = resized {
            discard(&resized).await;
        }
        staged?;

        run.transition(WorkflowEvent::Activate, "Activating image")?;
        self.execute(run, spec, &device::activation_sequence()).await
    }

    /// Copy every PNG of `folder` into the rotation folder on the device
    pub async fn upload_screens(&self, spec: &ConnectionSpec, folder: &Path) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::UploadScreens);
        let outcome = self.upload_screen_folder(&mut run, spec, folder).await;
        run.finish(outcome)
    }

    async fn upload_screen_folder(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
        folder: &Path,
    ) -> Result<DeploymentResult, ManagerError> {
        let dir = Dir::new(folder);
        if !dir.exists().await {
            return Err(ManagerError::ValidationError(format!(
                "folder not found: {}",
                folder.display()
            )));
        }

        let screens = dir.list_files_with_extension("png").await?;
        if screens.is_empty() {
            run.transition(WorkflowEvent::Stage, "Nothing to upload")?;
            run.note(format!("No PNG files in {}", folder.display()));
            return Ok(DeploymentResult::empty_success());
        }

        spec.validate()?;
        run.transition(WorkflowEvent::Stage, "Uploading screens")?;

        let mut steps = vec![StagingStep::EnsureDirectory(SCREENS_DIR.to_string())];
        for screen in &screens {
            if let Some(name) = screen.name() {
                steps.push(StagingStep::Upload(RemoteArtifact::file(
                    screen.path(),
                    device::screen_path(name),
                )));
            }
        }
        self.stage(run, spec, &steps).await?;

        run.note(format!("Uploaded {} screens to {}", screens.len(), SCREENS_DIR));
        Ok(DeploymentResult::empty_success())
    }

    /// Install the script and service drop-in that rotate the sleep screen
    /// every time the display service starts
    pub async fn install_rotation(&self, spec: &ConnectionSpec) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::InstallRotation);
        let outcome = self.install_rotation_hook(&mut run, spec).await;
        run.finish(outcome)
    }

    async fn install_rotation_hook(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
    ) -> Result<DeploymentResult, ManagerError> {
        spec.validate()?;
        run.transition(WorkflowEvent::Stage, "Uploading rotation hook")?;

        self.stage(
            run,
            spec,
            &[
                StagingStep::Upload(RemoteArtifact::text(rotation_script(), ROTATION_SCRIPT)),
                StagingStep::EnsureDirectory(OVERRIDE_DIR.to_string()),
                StagingStep::Upload(RemoteArtifact::text(service_override(), OVERRIDE_FILE)),
            ],
        )
        .await?;

        run.transition(WorkflowEvent::Activate, "Enabling rotation hook")?;
        self.execute(run, spec, &device::install_rotation_sequence())
            .await
    }

    /// Remove everything the rotation hook installed
    pub async fn uninstall_rotation(&self, spec: &ConnectionSpec) -> WorkflowReport {
        self.run_commands(
            WorkflowKind::UninstallRotation,
            spec,
            "Removing rotation hook",
            device::uninstall_rotation_sequence(),
        )
        .await
    }

    /// Rotate to another screen right away
    pub async fn test_rotation(&self, spec: &ConnectionSpec) -> WorkflowReport {
        self.run_commands(
            WorkflowKind::TestRotation,
            spec,
            "Running rotation script",
            device::test_rotation_sequence(),
        )
        .await
    }

    async fn run_commands(
        &self,
        kind: WorkflowKind,
        spec: &ConnectionSpec,
        message: &str,
        sequence: CommandSequence,
    ) -> WorkflowReport {
        let mut run = self.start(kind);
        let outcome = match spec.validate() {
            Ok(()) => match run.transition(WorkflowEvent::Activate, message) {
                Ok(()) => self.execute(&mut run, spec, &sequence).await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };
        run.finish(outcome)
    }

    /// Report which parts of the rotation hook are present on the device
    pub async fn inspect_rotation(
        &self,
        spec: &ConnectionSpec,
    ) -> Result<RotationStatus, ManagerError> {
        spec.validate()?;
        let mut transfer = self.sessions.open_transfer_session(spec).await?;
        let status = probe_rotation(transfer.as_mut()).await;
        release(transfer.as_mut()).await;

        let status = status?;
        info!("Rotation hook status on {}: {:?}", spec.host(), status);
        Ok(status)
    }

    fn gallery(&self) -> Result<&Arc<dyn GalleryClient>, ManagerError> {
        self.gallery
            .as_ref()
            .ok_or_else(|| ManagerError::ConfigError("gallery is not configured".into()))
    }

    /// Fetch the online gallery index
    pub async fn load_gallery(&self) -> Result<GalleryCatalog, ManagerError> {
        self.gallery()?.fetch_catalog().await
    }

    /// Download a gallery image without touching the device
    pub async fn download_from_gallery(&self, item: &GalleryItem) -> Result<PathBuf, ManagerError> {
        self.gallery()?.download(item).await
    }

    /// Download a gallery image and activate it like a local one. Paper Pro
    /// images published at another resolution are resized first.
    pub async fn install_from_gallery(
        &self,
        spec: &ConnectionSpec,
        item: &GalleryItem,
    ) -> WorkflowReport {
        let mut run = self.start(WorkflowKind::InstallFromGallery);
        let outcome = self.install_gallery_item(&mut run, spec, item).await;
        run.finish(outcome)
    }

    async fn install_gallery_item(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
        item: &GalleryItem,
    ) -> Result<DeploymentResult, ManagerError> {
        spec.validate()?;
        let image = self.download_from_gallery(item).await?;
        run.note(format!("Downloaded {} ({})", item.title, item.id));

        let outcome = self
            .deploy_image(run, spec, &image, item.needs_resize())
            .await;
        discard(&image).await;
        outcome
    }

    /// Open a transfer session, apply `steps` in order, close the session
    async fn stage(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
        steps: &[StagingStep],
    ) -> Result<(), ManagerError> {
        let mut transfer = self.sessions.open_transfer_session(spec).await?;
        run.mark_contacted();
        let outcome = apply_steps(run, transfer.as_mut(), steps).await;
        release(transfer.as_mut()).await;
        outcome
    }

    /// Open a command session, run `sequence`, close the session
    async fn execute(
        &self,
        run: &mut WorkflowRun,
        spec: &ConnectionSpec,
        sequence: &CommandSequence,
    ) -> Result<DeploymentResult, ManagerError> {
        let mut session = self.sessions.open_command_session(spec).await?;
        run.mark_contacted();
        let outcome = run_sequence(session.as_mut(), sequence).await;
        release(session.as_mut()).await;

        let result = outcome?;
        if let (true, Some(index)) = (result.succeeded, result.failure_point) {
            let command = sequence.commands().get(index).map(String::as_str).unwrap_or("");
            warn!("{} continued past a failing command: {}", run.kind(), command);
            run.note(format!("Command failed, continued: {}", command));
        }
        Ok(result)
    }
}

async fn apply_steps(
    run: &mut WorkflowRun,
    transfer: &mut dyn TransferSession,
    steps: &[StagingStep],
) -> Result<(), ManagerError> {
    for step in steps {
        match step {
            StagingStep::EnsureDirectory(path) => fs::ensure_directory(transfer, path).await?,
            StagingStep::Upload(artifact) => {
                let written = fs::stage(transfer, artifact).await?;
                run.note(format!("Uploaded {} ({} bytes)", artifact.destination, written));
            }
        }
    }
    Ok(())
}

/// Remove a local intermediate file; failures are only logged
async fn discard(path: &Path) {
    if let Err(e) = File::new(path).delete().await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

async fn probe_rotation(transfer: &mut dyn TransferSession) -> Result<RotationStatus, ManagerError> {
    Ok(RotationStatus {
        override_installed: transfer.exists(OVERRIDE_FILE).await?,
        script_installed: transfer.exists(ROTATION_SCRIPT).await?,
        log_present: transfer.exists(ROTATION_LOG).await?,
        screens_present: transfer.exists(SCREENS_DIR).await?,
    })
}

/// A deployable image path: set, existing, with a png/jpg/jpeg extension
pub async fn validate_image(image: &Path) -> Result<(), ManagerError> {
    if image.as_os_str().is_empty() {
        return Err(ManagerError::ValidationError("no image selected".into()));
    }

    let file = File::new(image);
    if !file.exists().await {
        return Err(ManagerError::ValidationError(format!(
            "image not found: {}",
            image.display()
        )));
    }
    if !file.has_image_extension() {
        return Err(ManagerError::ValidationError(format!(
            "unsupported image format: {}",
            image.display()
        )));
    }
    Ok(())
}
