//! Headless update shell: plan or run one update cycle from a terminal.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use launcher_updater::core::config::RemoteConfig;
use launcher_updater::core::downloader::format_size;
use launcher_updater::{AppState, CycleStage, EventSink, UpdateEvent, UpdateMode, UpdaterResult};

#[derive(Parser)]
#[command(name = "launcher-updater")]
#[command(about = "Keep a game client installation up to date", long_about = None)]
#[command(version)]
struct Cli {
    /// Launcher data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Read the remote config from a local file
    #[arg(long, global = true, conflicts_with = "config_url")]
    config: Option<PathBuf>,

    /// Fetch the remote config from this URL
    #[arg(long, global = true)]
    config_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what an update would do
    Plan,
    /// Run one update cycle
    Update,
}

#[tokio::main]
async fn main() -> ExitCode {
    launcher_updater::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> UpdaterResult<()> {
    let state = AppState::new(cli.base_dir.clone())?;
    let config = load_config(&state, &cli).await?;

    let plan = state.orchestrator.plan(&config).await;
    println!("{}", serde_json::to_string_pretty(&plan)?);

    if matches!(cli.command, Commands::Plan) {
        return Ok(());
    }
    if plan.mode == UpdateMode::None {
        println!("Client is up to date.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            on_interrupt.cancel();
        }
    });

    let (events, rx) = EventSink::channel();
    let renderer = tokio::spawn(render_progress(rx));

    let result = state
        .orchestrator
        .execute(&config, &plan, &events, &cancel)
        .await;
    drop(events);
    let _ = renderer.await;

    let result = result?;
    println!(
        "Installed {} ({})",
        result.installed_version_raw.as_deref().unwrap_or("unknown version"),
        result.installed_version_normalized.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// `--config`, then `--config-url`, then the configured URL, then the cached
/// copy from the last successful sync.
async fn load_config(state: &AppState, cli: &Cli) -> UpdaterResult<RemoteConfig> {
    if let Some(path) = &cli.config {
        return RemoteConfig::from_file(path).await;
    }
    if cli.config_url.is_some() || state.settings.launcher_config_url.is_some() {
        return state.fetch_remote_config(cli.config_url.as_deref()).await;
    }
    info!("No config source given, using the cached launcher config");
    state.cached_remote_config().await
}

async fn render_progress(mut rx: UnboundedReceiver<UpdateEvent>) {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{msg:32} [{bar:40}] {percent:>3}%") {
        bar.set_style(style.progress_chars("=> "));
    }
    let mut status = String::new();

    while let Some(event) = rx.recv().await {
        match event {
            UpdateEvent::Stage(CycleStage::Done) | UpdateEvent::Stage(CycleStage::Failed) => {
                bar.finish_and_clear();
            }
            UpdateEvent::Stage(_) => {}
            UpdateEvent::Status(text) => {
                bar.set_message(text.clone());
                status = text;
            }
            UpdateEvent::Download(progress) => match progress.total_bytes {
                Some(total) => {
                    bar.set_length(total);
                    bar.set_position(progress.bytes_received);
                }
                None => bar.set_message(format!(
                    "{} {}",
                    status,
                    format_size(progress.bytes_received)
                )),
            },
            UpdateEvent::Extraction(percent) => {
                bar.set_length(100);
                bar.set_position(u64::from(percent));
            }
        }
    }
}
