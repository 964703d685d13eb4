//! rmsleep - Entry Point
//!
//! Deploys custom sleep screens to a reMarkable tablet over SSH and manages
//! the rotation hook that changes the screen on every wake.

use std::env;
use std::process::ExitCode;

use rmsleep::app::options::{parse_args, AppOptions, PASSWORD_ENV};
use rmsleep::app::run::run;
use rmsleep::logs::{init_logging, LogOptions};
use rmsleep::storage::layout::StorageLayout;
use rmsleep::storage::settings::Settings;
use rmsleep::utils::version_info;

use tracing::{debug, error, warn};

const USAGE: &str = "\
Usage: rmsleep --<command> [--host=<ip>] [--user=<name>] [--password=<pw>]

Commands:
  --test-connection          check SSH access to the tablet
  --apply=<image>            make <image> the sleep screen (add --no-resize to skip resizing)
  --restore                  put the stock sleep screen back
  --upload-screens=<dir>     copy every PNG of <dir> to the rotation folder
  --install-rotation         rotate the sleep screen on every restart of the display
  --uninstall-rotation       remove the rotation hook and its files
  --test-rotation            rotate once now
  --rotation-status          show what the rotation hook left on the tablet
  --gallery                  list the online gallery
  --gallery-install=<id>     download a gallery image and make it the sleep screen
  --gallery-download=<id>    download a gallery image only
  --version                  print version information

The password may also be given in the RMSLEEP_PASSWORD environment variable.";

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = parse_args(env::args().skip(1));

    // Print version and exit
    if cli_args.contains_key("version") {
        let version = version_info();
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    if cli_args.is_empty() || cli_args.contains_key("help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();
    let mut settings = Settings::load_or_default(&settings_file).await;

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        json_format: cli_args.contains_key("json-logs"),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let options = match AppOptions::resolve(&cli_args, &settings, env::var(PASSWORD_ENV).ok(), layout)
    {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    debug!("Running rmsleep with options: {:?}", options);
    let host = options.connection.host.clone();
    let username = options.connection.username.clone();

    match run(options).await {
        Ok(summary) if summary.succeeded => {
            // Remember the device that answered for the next invocation
            if summary.device_contacted && settings.remember_connection(&host, &username) {
                if let Err(e) = settings.save(&settings_file).await {
                    warn!("Failed to save settings: {}", e);
                }
            }
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
