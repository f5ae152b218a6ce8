//! SinkKV - storage host process
//!
//! This is the main entry point for a self-hosted deployment.
//! It opens the embedded database (creating the schema on first run), and in
//! service mode keeps the expiration reaper running until shutdown.

use sinkkv::config::{RunMode, StorageConfig};
use sinkkv::SharedStorage;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Parse configuration from command-line arguments, on top of the environment
fn config_from_args() -> StorageConfig {
    let mut config = StorageConfig::from_env();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    config.data_dir = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --data-dir requires a value");
                    std::process::exit(1);
                }
            }
            "--reap-interval" => {
                if i + 1 < args.len() {
                    let secs: u64 = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid reap interval");
                        std::process::exit(1);
                    });
                    if secs == 0 {
                        eprintln!("Error: reap interval must be positive");
                        std::process::exit(1);
                    }
                    config.reap_interval = Duration::from_secs(secs);
                    i += 2;
                } else {
                    eprintln!("Error: --reap-interval requires a value");
                    std::process::exit(1);
                }
            }
            "--service" => {
                config.mode = RunMode::Service;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("SinkKV version {}", sinkkv::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config
}

fn print_help() {
    println!(
        r#"
SinkKV - Managed-KV Compatible Storage on Embedded SQLite

USAGE:
    sinkkv [OPTIONS]

OPTIONS:
    -d, --data-dir <DIR>           Directory holding sink.db (default: $DATA_DIR or ./data)
        --reap-interval <SECS>     Seconds between expiry purges (default: 3600)
        --service                  Run as a long-lived service with the reaper active
                                   (also enabled by SINK_ENV=production)
    -v, --version                  Print version information
    -h, --help                     Print this help message

Without --service the database is opened, checked and the process exits.

ENVIRONMENT:
    DATA_DIR                   Data directory
    SINK_ENV                   "production" enables service mode
    SINK_REAP_INTERVAL_SECS    Reaper interval in seconds
    RUST_LOG                   Log filter (default: info)
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = config_from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("SinkKV v{} starting", sinkkv::VERSION);

    // Open storage up front: a deployment without storage must not come up
    let storage = SharedStorage::new(config.clone());
    let engine = storage.engine().await?;
    let records = {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || engine.record_count()).await??
    };
    info!(
        path = %config.db_path().display(),
        records,
        "Storage ready"
    );

    if !config.mode.is_service() {
        info!("One-shot mode, exiting");
        return Ok(());
    }

    // Start the background expiration reaper
    let reaper = storage.spawn_reaper().await?;

    // Wait for shutdown
    signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping...");

    if let Some(reaper) = reaper {
        reaper.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}
