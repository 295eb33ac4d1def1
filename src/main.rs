//! Binary entrypoint for the zoom viewer.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use clap::{ArgAction, Parser};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use zoom_viewer::config::Configuration;
use zoom_viewer::events::ViewerCommand;
use zoom_viewer::tasks::viewer::{self, ContextSlot, ViewerLaunch};

#[derive(Debug, Parser)]
#[command(
    name = "zoom-viewer",
    version,
    about = "Image viewer with live, non-blocking rescaling"
)]
struct Args {
    /// Image to open at startup
    #[arg(value_name = "IMAGE")]
    image: Option<PathBuf>,
    /// Path to YAML config (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Zoom multiplier applied after the startup image opens (1.0 = 100%)
    #[arg(long, value_name = "FACTOR")]
    zoom: Option<f64>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins over -v
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "zoom_viewer={level},wgpu=warn,winit=warn,eframe=warn,egui=warn"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        image,
        config,
        zoom,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let cfg = Configuration::load(config.as_deref())?;
    tracing::debug!("configuration: {cfg:#?}");

    let (command_tx, command_rx) = crossbeam_channel::unbounded::<ViewerCommand>();
    let context: ContextSlot = Arc::new(OnceLock::new());
    let cancel = CancellationToken::new();
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    {
        let cancel = cancel.clone();
        let repaint = viewer::slot_repaint(&context);
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; closing viewer");
            cancel.cancel();
            repaint();
        });
    }

    match cfg.control_socket_path.clone() {
        #[cfg(unix)]
        Some(path) => {
            let to_viewer = command_tx.clone();
            let repaint = viewer::slot_repaint(&context);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                zoom_viewer::tasks::control::run(path, to_viewer, repaint, cancel).await
            });
        }
        #[cfg(not(unix))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "control sockets are only supported on unix; ignoring"
            );
        }
        None => {}
    }
    drop(command_tx);

    // The window owns the main thread until it closes.
    let launch = ViewerLaunch {
        image,
        zoom,
        commands: command_rx,
        context,
        cancel: cancel.clone(),
    };
    if let Err(e) = viewer::run_windowed(cfg, launch) {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
