//! Command dispatch and report printing

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, Command};
use crate::assets::EmbeddedDefaultImage;
use crate::deploy::fsm::WorkflowState;
use crate::deploy::Orchestrator;
use crate::errors::ManagerError;
use crate::http::client::HttpClient;
use crate::http::gallery::HttpGalleryClient;
use crate::imaging::PaperProResizer;
use crate::models::deployment::{RotationStatus, WorkflowProgress, WorkflowReport};
use crate::models::gallery::{GalleryCatalog, GalleryItem};
use crate::remote::ssh::SshSessionFactory;

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: bool,

    /// A session to the device was opened
    pub device_contacted: bool,
}

/// Run the requested command and print its output
pub async fn run(options: AppOptions) -> Result<RunSummary, ManagerError> {
    options.layout.setup().await?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let progress = spawn_progress_printer(events_rx);

    let orchestrator = init_orchestrator(&options)?.with_events(events_tx);
    let output = dispatch(&orchestrator, &options).await;

    // Closing the last sender ends the printer
    drop(orchestrator);
    if let Err(e) = progress.await {
        error!("Progress printer stopped: {}", e);
    }

    let output = output?;
    Ok(RunSummary {
        succeeded: output.print(),
        device_contacted: output.device_contacted(),
    })
}

/// What a command produced
enum Output {
    Report(WorkflowReport),
    Status(RotationStatus),
    Catalog(GalleryCatalog),
    Downloaded(PathBuf),
}

impl Output {
    fn device_contacted(&self) -> bool {
        match self {
            Output::Report(report) => report.device_contacted,
            Output::Status(_) => true,
            Output::Catalog(_) | Output::Downloaded(_) => false,
        }
    }

    /// Print to stdout; returns whether the command succeeded
    fn print(&self) -> bool {
        match self {
            Output::Report(report) => {
                print_report(report);
                report.succeeded()
            }
            Output::Status(status) => {
                print_rotation_status(status);
                true
            }
            Output::Catalog(catalog) => {
                print_catalog(catalog);
                true
            }
            Output::Downloaded(path) => {
                println!("{} {}", "Downloaded".green().bold(), path.display());
                true
            }
        }
    }
}

fn init_orchestrator(options: &AppOptions) -> Result<Orchestrator, ManagerError> {
    let http = HttpClient::new(options.gallery.request_timeout)?;
    let gallery = HttpGalleryClient::new(
        http,
        options.gallery.index_url.clone(),
        options.layout.downloads_dir(),
    );

    Ok(Orchestrator::new(
        Arc::new(SshSessionFactory::new()),
        Arc::new(PaperProResizer::default()),
        Arc::new(EmbeddedDefaultImage::default()),
    )
    .with_gallery(Arc::new(gallery)))
}

fn spawn_progress_printer(mut events: mpsc::UnboundedReceiver<WorkflowProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event.state == WorkflowState::Failed {
                continue;
            }
            println!("{} {}", "::".dimmed(), event.message);
        }
    })
}

async fn dispatch(orchestrator: &Orchestrator, options: &AppOptions) -> Result<Output, ManagerError> {
    let spec = options.connection.spec();
    if options.command.needs_device() {
        info!("Target device: {}", spec.target());
    }

    let report = match &options.command {
        Command::TestConnection => orchestrator.test_connection(&spec).await,
        Command::Apply { image, resize } => orchestrator.apply_image(&spec, image, *resize).await,
        Command::Restore => orchestrator.restore_default(&spec).await,
        Command::UploadScreens { folder } => orchestrator.upload_screens(&spec, folder).await,
        Command::InstallRotation => orchestrator.install_rotation(&spec).await,
        Command::UninstallRotation => orchestrator.uninstall_rotation(&spec).await,
        Command::TestRotation => orchestrator.test_rotation(&spec).await,
        Command::GalleryInstall { id } => {
            let item = find_item(&orchestrator.load_gallery().await?, id)?;
            orchestrator.install_from_gallery(&spec, &item).await
        }
        Command::RotationStatus => {
            return Ok(Output::Status(orchestrator.inspect_rotation(&spec).await?));
        }
        Command::Gallery => {
            return Ok(Output::Catalog(orchestrator.load_gallery().await?));
        }
        Command::GalleryDownload { id } => {
            let item = find_item(&orchestrator.load_gallery().await?, id)?;
            let path = orchestrator.download_from_gallery(&item).await?;
            return Ok(Output::Downloaded(path));
        }
    };

    Ok(Output::Report(report))
}

fn find_item(catalog: &GalleryCatalog, id: &str) -> Result<GalleryItem, ManagerError> {
    catalog
        .find(id)
        .cloned()
        .ok_or_else(|| ManagerError::GalleryError(format!("no gallery item with id {}", id)))
}

// ================================= OUTPUT ===================================== //

fn print_report(report: &WorkflowReport) {
    let label = if report.succeeded() {
        report.status.green().bold()
    } else {
        report.status.red().bold()
    };
    println!("{} {}", label, report.workflow);

    for note in &report.notes {
        println!("  {}", note.dimmed());
    }

    let output = report.result.combined_output.trim_end();
    if !output.is_empty() {
        println!("{}", output);
    }

    if let Some(err) = &report.error {
        eprintln!("{} {}", "error:".red(), err);
    }
}

fn print_rotation_status(status: &RotationStatus) {
    let mark = |present: bool| if present { "present".yellow() } else { "absent".green() };

    println!("override file  {}", mark(status.override_installed));
    println!("script         {}", mark(status.script_installed));
    println!("log            {}", mark(status.log_present));
    println!("screens folder {}", mark(status.screens_present));

    if status.is_clean() {
        println!("{}", "Rotation hook not installed".green().bold());
    } else if status.is_installed() {
        println!("{}", "Rotation hook installed".cyan().bold());
    } else {
        println!("{}", "Rotation hook partially installed".yellow().bold());
    }
}

fn print_catalog(catalog: &GalleryCatalog) {
    if let Some(updated) = &catalog.updated {
        println!("{} {}", "Gallery updated".bold(), updated);
    }
    for item in &catalog.items {
        println!(
            "{:<24} {} by {} [{} {}]",
            item.id.cyan(),
            item.title,
            item.author,
            item.device,
            item.resolution
        );
    }
}
