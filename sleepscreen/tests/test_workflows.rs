//! Workflow tests against an in-memory device

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use common::{
    local_file, spec, FailingResizer, FakeDevice, FakeGallery, FakeResizer, FixedDefault,
    RESIZED_IMAGE, STOCK_IMAGE,
};
use rmsleep::assets::EmbeddedDefaultImage;
use rmsleep::deploy::device::{
    self, ACTIVE_IMAGE, OVERRIDE_DIR, OVERRIDE_FILE, ROTATION_LOG, ROTATION_SCRIPT, SCREENS_DIR,
    STAGING_IMAGE,
};
use rmsleep::deploy::fsm::WorkflowState;
use rmsleep::deploy::scripts::{rotation_script, service_override};
use rmsleep::deploy::Orchestrator;
use rmsleep::errors::ManagerError;
use rmsleep::filesys::file::File;
use rmsleep::models::deployment::WorkflowKind;
use rmsleep::models::gallery::{GalleryCatalog, GalleryItem};

struct Harness {
    device: FakeDevice,
    resizer: Arc<FakeResizer>,
    dir: TempDir,
    orchestrator: Orchestrator,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice::new();
    let resizer = Arc::new(FakeResizer::new(dir.path()));
    let defaults = EmbeddedDefaultImage::new(File::new(dir.path().join("embedded.png")));

    let orchestrator = Orchestrator::new(
        Arc::new(device.clone()),
        resizer.clone(),
        Arc::new(defaults),
    );

    Harness {
        device,
        resizer,
        dir,
        orchestrator,
    }
}

fn activation_command() -> String {
    device::activation_sequence().commands()[0].clone()
}

#[tokio::test]
async fn test_apply_image_with_resize() {
    let h = harness();
    let image = local_file(h.dir.path(), "landscape.png", b"original image");
    h.device
        .reply(&activation_command(), "restarted\n", "mount: warning\n");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = h.orchestrator.clone().with_events(tx);
    let report = orchestrator.apply_image(&spec(), &image, true).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "Completed");
    assert_eq!(report.result.combined_output, "restarted\nmount: warning\n");

    // One resize of the original, one upload, one compound command
    assert_eq!(h.resizer.calls(), vec![image.clone()]);
    let state = h.device.state();
    assert_eq!(state.uploads, vec![STAGING_IMAGE.to_string()]);
    assert_eq!(state.commands, vec![activation_command()]);

    // The resized copy is active, never the original
    assert_eq!(state.files.get(ACTIVE_IMAGE).unwrap(), RESIZED_IMAGE);
    assert!(!state.files.contains_key(STAGING_IMAGE));

    // Every session was closed again
    assert_eq!(state.connects, 2);
    assert_eq!(state.closes, 2);
    drop(state);

    // The local resized copy is gone, the original stays
    assert!(!h.dir.path().join("resized_1.png").exists());
    assert!(image.exists());
    assert!(report.device_contacted);

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.workflow, WorkflowKind::ApplyImage);
        states.push(event.state);
    }
    assert_eq!(
        states,
        vec![
            WorkflowState::Staging,
            WorkflowState::Activating,
            WorkflowState::Succeeded
        ]
    );
}

#[tokio::test]
async fn test_apply_image_without_resize_uploads_original() {
    let h = harness();
    let image = local_file(h.dir.path(), "portrait.jpg", b"original image");

    let report = h.orchestrator.apply_image(&spec(), &image, false).await;

    assert!(report.succeeded());
    assert!(h.resizer.calls().is_empty());
    assert_eq!(
        h.device.state().files.get(ACTIVE_IMAGE).unwrap(),
        b"original image"
    );
}

#[tokio::test]
async fn test_apply_image_rejects_missing_file() {
    let h = harness();

    let report = h
        .orchestrator
        .apply_image(&spec(), &h.dir.path().join("nope.png"), true)
        .await;

    assert!(!report.succeeded());
    assert_eq!(report.status, "Blocked");
    assert!(report.error.unwrap().contains("image not found"));
    assert_eq!(h.device.state().connects, 0);
    assert!(h.resizer.calls().is_empty());
}

#[tokio::test]
async fn test_apply_image_stops_when_remount_fails() {
    let h = harness();
    let image = local_file(h.dir.path(), "screen.png", b"new image");
    h.device.fail_clause(&device::remount_rw(), 32);

    let report = h.orchestrator.apply_image(&spec(), &image, false).await;

    assert!(!report.succeeded());
    assert_eq!(report.status, "Error");
    assert_eq!(report.result.failure_point, Some(0));
    assert!(report.error.unwrap().contains("exited with status 32"));

    // Neither moved nor restarted: the stock image is still active
    let state = h.device.state();
    assert_eq!(state.files.get(ACTIVE_IMAGE).unwrap(), STOCK_IMAGE);
    assert_eq!(state.files.get(STAGING_IMAGE).unwrap(), b"new image");
    assert_eq!(state.closes, state.connects);
}

#[tokio::test]
async fn test_connection_failure_surfaces_message() {
    let h = harness();
    let image = local_file(h.dir.path(), "screen.png", b"new image");
    h.device.refuse_connections();

    let report = h.orchestrator.apply_image(&spec(), &image, false).await;

    assert_eq!(report.state, WorkflowState::Failed);
    assert_eq!(report.status, "Error");
    assert_eq!(
        report.error.as_deref(),
        Some("Connection error: connection refused by 10.11.99.1:22")
    );
    assert!(h.device.state().commands.is_empty());
}

#[tokio::test]
async fn test_blank_password_is_rejected_before_connecting() {
    let h = harness();

    let report = h
        .orchestrator
        .test_connection(&rmsleep::remote::ConnectionSpec::new("10.11.99.1", "root", ""))
        .await;

    assert_eq!(report.status, "Blocked");
    assert_eq!(h.device.state().connects, 0);
}

#[tokio::test]
async fn test_restore_default_uploads_embedded_image() {
    let h = harness();

    let report = h.orchestrator.restore_default(&spec()).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "Restored");
    assert!(h.resizer.calls().is_empty());

    let state = h.device.state();
    assert!(state
        .files
        .get(ACTIVE_IMAGE)
        .unwrap()
        .starts_with(b"\x89PNG\r\n\x1a\n"));
    assert_eq!(state.commands, vec![activation_command()]);
}

#[tokio::test]
async fn test_restore_default_without_image_opens_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice::new();
    let orchestrator = Orchestrator::new(
        Arc::new(device.clone()),
        Arc::new(FakeResizer::new(dir.path())),
        Arc::new(FixedDefault(dir.path().join("missing.png"))),
    );

    let report = orchestrator.restore_default(&spec()).await;

    assert!(!report.succeeded());
    assert_eq!(report.status, "Blocked");
    assert!(report.error.unwrap().starts_with("Resource error"));

    let state = device.state();
    assert_eq!(state.connects, 0);
    assert!(state.uploads.is_empty());
    assert_eq!(state.files.get(ACTIVE_IMAGE).unwrap(), STOCK_IMAGE);
}

#[tokio::test]
async fn test_install_rotation_uploads_hook_and_enables_it() {
    let h = harness();

    let report = h.orchestrator.install_rotation(&spec()).await;
    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "Rotation installed");

    let state = h.device.state();
    assert_eq!(
        state.uploads,
        vec![ROTATION_SCRIPT.to_string(), OVERRIDE_FILE.to_string()]
    );
    assert!(state.dirs.contains(OVERRIDE_DIR));
    assert_eq!(
        state.files.get(ROTATION_SCRIPT).unwrap(),
        rotation_script().as_bytes()
    );
    assert_eq!(
        state.files.get(OVERRIDE_FILE).unwrap(),
        service_override().as_bytes()
    );
    assert_eq!(
        state.commands,
        device::install_rotation_sequence().commands().to_vec()
    );
}

#[tokio::test]
async fn test_uninstall_runs_six_commands_despite_failures() {
    let h = harness();
    h.device
        .fail_clause(&device::remove_file(ROTATION_LOG), 1);

    let report = h.orchestrator.uninstall_rotation(&spec()).await;

    assert!(report.succeeded());
    assert_eq!(report.status, "Uninstalled");
    assert_eq!(report.result.failure_point, Some(2));
    assert!(report
        .notes
        .iter()
        .any(|note| note.contains("continued: rm -f /home/root/change-sleep.log")));

    let state = h.device.state();
    assert_eq!(state.commands.len(), 6);
    assert_eq!(
        state.commands,
        device::uninstall_rotation_sequence().commands().to_vec()
    );
    // One command session for the whole sequence
    assert_eq!(state.connects, 1);
}

#[tokio::test]
async fn test_install_rotation_continues_past_failing_chmod() {
    let h = harness();
    h.device
        .fail_clause(&device::make_executable(ROTATION_SCRIPT), 1);

    let report = h.orchestrator.install_rotation(&spec()).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "Rotation installed");
    assert_eq!(report.result.failure_point, Some(0));
    assert!(report
        .notes
        .iter()
        .any(|note| note.contains("continued: chmod +x /home/root/change-sleep.sh")));

    // The remaining steps still ran, in order
    assert_eq!(
        h.device.state().commands,
        device::install_rotation_sequence().commands().to_vec()
    );
}

#[tokio::test]
async fn test_upload_failure_surfaces_transfer_error() {
    let h = harness();
    let image = local_file(h.dir.path(), "screen.png", b"new image");
    h.device.fail_write(STAGING_IMAGE);

    let report = h.orchestrator.apply_image(&spec(), &image, false).await;

    assert_eq!(report.state, WorkflowState::Failed);
    assert_eq!(report.status, "Error");
    assert_eq!(
        report.error.as_deref(),
        Some("Transfer error: /home/root/suspended.png: no space left on device")
    );

    // Nothing was activated and the transfer session was closed
    let state = h.device.state();
    assert!(state.commands.is_empty());
    assert_eq!(state.files.get(ACTIVE_IMAGE).unwrap(), STOCK_IMAGE);
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_resize_failure_opens_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice::new();
    let orchestrator = Orchestrator::new(
        Arc::new(device.clone()),
        Arc::new(FailingResizer),
        Arc::new(FixedDefault(dir.path().join("missing.png"))),
    );
    let image = local_file(dir.path(), "photo.jpg", b"not really a jpeg");

    let report = orchestrator.apply_image(&spec(), &image, true).await;

    assert_eq!(report.state, WorkflowState::Failed);
    assert_eq!(report.status, "Error");
    assert!(report.error.unwrap().starts_with("Image error"));
    assert!(!report.device_contacted);
    assert_eq!(device.state().connects, 0);
}

#[tokio::test]
async fn test_restore_replaces_truncated_default_extraction() {
    let h = harness();
    let truncated = b"\x89PNG\r\n";
    local_file(h.dir.path(), "embedded.png", truncated);

    let report = h.orchestrator.restore_default(&spec()).await;

    assert!(report.succeeded(), "{:?}", report.error);
    let state = h.device.state();
    let active = state.files.get(ACTIVE_IMAGE).unwrap();
    assert!(active.starts_with(b"\x89PNG\r\n\x1a\n"));
    assert!(active.len() > truncated.len());
}

#[tokio::test]
async fn test_install_then_uninstall_leaves_device_clean() {
    let h = harness();
    let screens = h.dir.path().join("screens");
    std::fs::create_dir(&screens).unwrap();
    local_file(&screens, "b.png", b"second");
    local_file(&screens, "a.PNG", b"first");
    local_file(&screens, "notes.txt", b"ignored");

    assert!(h.orchestrator.install_rotation(&spec()).await.succeeded());
    let report = h.orchestrator.upload_screens(&spec(), &screens).await;
    assert!(report.succeeded(), "{:?}", report.error);

    {
        let state = h.device.state();
        assert!(state.dirs.contains(SCREENS_DIR));
        assert_eq!(
            state.uploads[2..],
            [
                device::screen_path("a.PNG"),
                device::screen_path("b.png")
            ]
        );
    }

    let installed = assert_ok!(h.orchestrator.inspect_rotation(&spec()).await);
    assert!(installed.is_installed());
    assert!(installed.screens_present);

    assert!(h.orchestrator.uninstall_rotation(&spec()).await.succeeded());

    let status = assert_ok!(h.orchestrator.inspect_rotation(&spec()).await);
    assert!(status.is_clean(), "{:?}", status);

    let state = h.device.state();
    assert!(!state.files.keys().any(|f| f.starts_with(SCREENS_DIR)));
    assert_eq!(state.closes, state.connects);
}

#[tokio::test]
async fn test_upload_screens_requires_existing_folder() {
    let h = harness();

    let report = h
        .orchestrator
        .upload_screens(&spec(), &h.dir.path().join("missing"))
        .await;

    assert_eq!(report.status, "Blocked");
    assert_eq!(h.device.state().connects, 0);
}

#[tokio::test]
async fn test_upload_screens_with_no_png_does_nothing() {
    let h = harness();
    let folder = h.dir.path().join("empty");
    std::fs::create_dir(&folder).unwrap();

    let report = h.orchestrator.upload_screens(&spec(), &folder).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "OK");
    assert!(report.notes.iter().any(|note| note.contains("No PNG files")));
    assert!(!report.device_contacted);
    assert_eq!(h.device.state().connects, 0);
}

#[tokio::test]
async fn test_rotation_runs_script_then_restarts() {
    let h = harness();

    let report = h.orchestrator.test_rotation(&spec()).await;

    assert!(report.succeeded());
    assert_eq!(
        h.device.state().commands,
        vec![ROTATION_SCRIPT.to_string(), device::restart_service()]
    );
}

#[tokio::test]
async fn test_connection_reports_uname() {
    let h = harness();
    h.device.reply("uname -a", "Linux reMarkable 5.4.70 armv7l\n", "");

    let report = h.orchestrator.test_connection(&spec()).await;

    assert!(report.succeeded());
    assert_eq!(report.status, "Connected");
    assert_eq!(report.result.combined_output, "Linux reMarkable 5.4.70 armv7l\n");
}

#[tokio::test]
async fn test_connection_without_output_fails() {
    let h = harness();

    let report = h.orchestrator.test_connection(&spec()).await;

    assert!(!report.succeeded());
    assert!(report.error.unwrap().starts_with("Command error"));
}

#[tokio::test]
async fn test_rotation_status_fails_when_unreachable() {
    let h = harness();
    h.device.refuse_connections();

    let result = h.orchestrator.inspect_rotation(&spec()).await;
    assert!(matches!(assert_err!(result), ManagerError::ConnectError(_)));
}

fn gallery_item(id: &str, resolution: &str) -> GalleryItem {
    GalleryItem {
        id: id.to_string(),
        title: "Lighthouse".to_string(),
        author: "someone".to_string(),
        license: "CC0".to_string(),
        device: "PaperPro".to_string(),
        resolution: resolution.to_string(),
        preview_url: String::new(),
        download_url: format!("https://example.org/{}.png", id),
        tags: vec![],
    }
}

fn with_gallery(h: &Harness, items: Vec<GalleryItem>) -> Orchestrator {
    h.orchestrator.clone().with_gallery(Arc::new(FakeGallery {
        catalog: GalleryCatalog {
            updated: Some("2025-01-01".to_string()),
            items,
        },
        blob: b"gallery image".to_vec(),
        download_dir: h.dir.path().to_path_buf(),
    }))
}

#[tokio::test]
async fn test_gallery_install_resizes_foreign_resolution() {
    let h = harness();
    let item = gallery_item("lighthouse", "1404x1872");
    let orchestrator = with_gallery(&h, vec![item.clone()]);

    let report = orchestrator.install_from_gallery(&spec(), &item).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.status, "Installed");
    assert_eq!(h.resizer.calls().len(), 1);
    assert_eq!(h.device.state().files.get(ACTIVE_IMAGE).unwrap(), RESIZED_IMAGE);

    // Neither the download nor its resized copy is left behind
    assert!(!h.dir.path().join("lighthouse.png").exists());
    assert!(!h.dir.path().join("resized_1.png").exists());
}

#[tokio::test]
async fn test_gallery_install_keeps_native_resolution() {
    let h = harness();
    let item = gallery_item("native", "2160X1620");
    let orchestrator = with_gallery(&h, vec![item.clone()]);

    let report = orchestrator.install_from_gallery(&spec(), &item).await;

    assert!(report.succeeded());
    assert!(h.resizer.calls().is_empty());
    assert_eq!(
        h.device.state().files.get(ACTIVE_IMAGE).unwrap(),
        b"gallery image"
    );
}

#[tokio::test]
async fn test_gallery_download_does_not_touch_device() {
    let h = harness();
    let item = gallery_item("lighthouse", "1404x1872");
    let orchestrator = with_gallery(&h, vec![item.clone()]);

    let catalog = assert_ok!(orchestrator.load_gallery().await);
    assert!(catalog.find("lighthouse").is_some());

    let path = assert_ok!(orchestrator.download_from_gallery(&item).await);
    assert_eq!(std::fs::read(path).unwrap(), b"gallery image");
    assert_eq!(h.device.state().connects, 0);
}

#[tokio::test]
async fn test_gallery_requires_configuration() {
    let h = harness();
    let result = h.orchestrator.load_gallery().await;
    assert!(matches!(assert_err!(result), ManagerError::ConfigError(_)));
}

#[tokio::test]
async fn test_workflow_runs_on_spawned_task() {
    let h = harness();
    let image = local_file(h.dir.path(), "screen.png", b"spawned");
    let orchestrator = h.orchestrator.clone();

    let handle = tokio::spawn(async move {
        let spec = spec();
        orchestrator.apply_image(&spec, &image, false).await
    });
    let report = handle.await.unwrap();

    assert!(report.succeeded());
    assert_eq!(h.device.state().files.get(ACTIVE_IMAGE).unwrap(), b"spawned");
}
