//! Unix socket listener for the external zoom API.
//!
//! Each connection carries one or more JSON commands, for example
//! `{"command":"set-zoom","factor":1.5}`. Commands are forwarded to the
//! interactive thread; they never touch viewer state directly.
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use crossbeam_channel::Sender;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::select;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::ViewerCommand;
use crate::tasks::worker::Repaint;

/// A client has this long to send its payload and close its write half.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(
    socket_path: PathBuf,
    to_viewer: Sender<ViewerCommand>,
    repaint: Repaint,
    cancel: CancellationToken,
) -> Result<()> {
    remove_stale_socket(&socket_path)?;
    let listener = UnixListener::bind(&socket_path).with_context(|| {
        format!(
            "failed to bind control socket at {}",
            socket_path.display()
        )
    })?;
    info!(path = %socket_path.display(), "control socket listening");

    let mut connections = JoinSet::new();
    loop {
        select! {
            _ = cancel.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let to_viewer = to_viewer.clone();
                    let repaint = repaint.clone();
                    let cancel = cancel.clone();
                    connections.spawn(async move {
                        if let Err(err) =
                            handle_connection(stream, &to_viewer, &repaint, &cancel).await
                        {
                            warn!(error = %err, "control connection failed");
                        }
                    });
                }
                Err(err) => warn!(error = %err, "control socket accept failed"),
            },
        }
    }
    // connections watch the same token; this only waits for them to notice
    while connections.join_next().await.is_some() {}

    if let Err(err) = fs::remove_file(&socket_path) {
        debug!(error = %err, "could not remove control socket");
    }
    Ok(())
}

async fn handle_connection(
    mut stream: UnixStream,
    to_viewer: &Sender<ViewerCommand>,
    repaint: &Repaint,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut payload = Vec::new();
    select! {
        _ = cancel.cancelled() => {
            debug!("control connection dropped on shutdown");
            return Ok(());
        }
        read = timeout(READ_TIMEOUT, stream.read_to_end(&mut payload)) => {
            read.context("control client did not finish sending")?
                .context("failed to read control payload")?;
        }
    }

    let (commands, error) = parse_commands(&payload);
    for command in commands {
        debug!(?command, "control command received");
        to_viewer
            .send(command)
            .context("viewer is no longer accepting commands")?;
    }
    repaint();
    if let Some(err) = error {
        warn!(error = %err, "ignoring malformed control payload");
    }
    Ok(())
}

/// Parse a stream of JSON commands. Commands before the first malformed
/// value are kept; the rest of the payload is dropped.
pub fn parse_commands(payload: &[u8]) -> (Vec<ViewerCommand>, Option<serde_json::Error>) {
    let mut commands = Vec::new();
    for item in serde_json::Deserializer::from_slice(payload).into_iter::<ViewerCommand>() {
        match item {
            Ok(command) => commands.push(command),
            Err(err) => return (commands, Some(err)),
        }
    }
    (commands, None)
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display())),
        Ok(_) => bail!(
            "control socket path {} exists and is not a socket",
            path.display()
        ),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to inspect {}", path.display()))
        }
    }
}
