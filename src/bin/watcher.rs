use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use watcher::checkers::CheckerRegistry;
use watcher::config::WatcherConfig;
use watcher::notifications::NotificationService;
use watcher::runner::Watcher;
use watcher::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Lightweight uptime monitor", long_about = None)]
struct Args {
    /// Run once and exit (good for cron usage)
    #[arg(short, long)]
    single_shot: bool,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Show detailed output for all checks
    #[arg(short, long)]
    verbose: bool,

    /// Announce every up target to status-page channels on the first cycle
    #[arg(long)]
    announce: bool,
}

fn init_logging(log_dir: &str, verbose: bool) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "watcher.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // RUST_LOG wins over --verbose.
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

fn spawn_shutdown_listener() -> watch::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Exiting watcher...");
        let _ = shutdown_tx.send(());
    });
    shutdown_rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl-C only.");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();

    // The log directory lives in the config, so a config failure is reported on stderr.
    let config = match WatcherConfig::load(&args.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir, args.verbose);
    info!(version = VERSION, targets = config.targets.len(), "Starting watcher...");

    let checkers = Arc::new(CheckerRegistry::with_defaults());
    let notifications = Arc::new(NotificationService::from_channels(&config.channels)?);
    let mut watcher = Watcher::new(config.clone(), checkers, notifications);
    if args.announce {
        watcher.announce_next_cycle();
    }

    if args.single_shot {
        let all_up = watcher.run_single_shot().await;
        return Ok(if all_up {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let shutdown_rx = spawn_shutdown_listener();
    watcher.run_forever(shutdown_rx).await;
    Ok(ExitCode::SUCCESS)
}
