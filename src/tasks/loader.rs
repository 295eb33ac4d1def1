//! Request-driven background decoder.
//! Open requests (request id + path) are decoded off the interactive thread;
//! each one answers with a single `WorkerEvent::Opened`.
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::error::OpenError;
use crate::events::WorkerEvent;
use crate::source::load_source;
use crate::tasks::worker::Repaint;

struct LoadRequest {
    request: u64,
    path: PathBuf,
}

pub struct ImageLoader {
    tx: Option<Sender<LoadRequest>>,
    join: Option<thread::JoinHandle<()>>,
}

impl ImageLoader {
    /// `extensions` are the normalized `supported-extensions`.
    pub fn spawn(
        extensions: Vec<String>,
        events: Sender<WorkerEvent>,
        repaint: Repaint,
    ) -> Result<Self> {
        let (tx, rx) = unbounded::<LoadRequest>();
        let join = thread::Builder::new()
            .name("image-loader".into())
            .spawn(move || run(rx, &extensions, &events, &repaint))
            .context("failed to spawn image loader thread")?;
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
        })
    }

    /// Queue a decode. Never blocks; returns `false` if the loader is gone.
    pub fn submit(&self, request: u64, path: PathBuf) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        tx.send(LoadRequest { request, path }).is_ok()
    }

    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("image loader thread panicked");
            }
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    rx: Receiver<LoadRequest>,
    extensions: &[String],
    events: &Sender<WorkerEvent>,
    repaint: &Repaint,
) {
    info!("image loader started");
    while let Ok(LoadRequest { request, path }) = rx.recv() {
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| load_source(&path, extensions)))
            .unwrap_or_else(|_| Err(OpenError::DecoderPanicked(path.clone())))
            .map(Arc::new);
        match &result {
            Ok(image) => {
                let (width, height) = image.dimensions();
                debug!(
                    request,
                    width,
                    height,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "image decoded"
                );
            }
            Err(err) => debug!(request, error = %err, "image decode failed"),
        }
        if events.send(WorkerEvent::Opened { request, result }).is_err() {
            debug!(request, "viewer gone before decode finished");
            break;
        }
        repaint();
    }
    info!("image loader stopped");
}
