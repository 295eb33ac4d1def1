use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{Receiver, unbounded};
use tracing::{debug, info, warn};

use crate::config::{Configuration, ResampleFilter};
use crate::error::{OpenError, ZoomInputError};
use crate::events::{ViewerCommand, WorkerEvent};
use crate::source::{SourceImage, SourceImageHolder};
use crate::tasks::loader::ImageLoader;
use crate::tasks::rescale::{OutputLimits, RescaleTask};
use crate::tasks::viewer::sink::{Display, ResultSink};
use crate::tasks::worker::{Repaint, RescaleWorker};
use crate::zoom::{ZoomController, ZoomFactor};

/// All interactive-thread state of the viewer. Every user edge goes through
/// one of the transition methods here; nothing in it is touched by the worker.
pub struct ViewerCore {
    holder: SourceImageHolder,
    zoom: ZoomController,
    sink: ResultSink,
    worker: RescaleWorker,
    loader: ImageLoader,
    events: Receiver<WorkerEvent>,
    next_seq: u64,
    next_request: u64,
    /// Open request whose decode is still pending.
    loading: Option<u64>,
    filter: ResampleFilter,
    limits: OutputLimits,
    last_target: Option<(u32, u32)>,
}

impl ViewerCore {
    pub fn new(cfg: &Configuration, repaint: Repaint) -> Result<Self> {
        let (events_tx, events) = unbounded();
        let worker = RescaleWorker::spawn(events_tx.clone(), Arc::clone(&repaint))?;
        let loader = ImageLoader::spawn(cfg.supported_extensions.clone(), events_tx, repaint)?;
        Ok(Self {
            holder: SourceImageHolder::new(),
            zoom: ZoomController::default(),
            sink: ResultSink::new(cfg.stale_results),
            worker,
            loader,
            events,
            next_seq: 0,
            next_request: 0,
            loading: None,
            filter: cfg.resample_filter,
            limits: OutputLimits {
                max_pixels: cfg.max_output_pixels,
                max_side: u32::MAX,
            },
            last_target: None,
        })
    }

    /// Longest side the display surface accepts; larger targets fail in the task.
    pub fn set_max_texture_side(&mut self, side: u32) {
        if self.limits.max_side != side {
            info!(side, "display texture limit");
            self.limits.max_side = side;
        }
    }

    /// Replace the source image. The decode runs in the background; the
    /// result is applied by [`Self::pump`]. Success resets zoom to 100% and
    /// renders once, failure shows the error and leaves the zoom untouched.
    pub fn open(&mut self, path: &Path) {
        // anything still in flight belongs to the image being replaced
        self.sink.start_generation(self.next_seq + 1);
        self.holder.clear();
        self.last_target = None;
        self.next_request += 1;
        let request = self.next_request;
        if !self.loader.submit(request, path.to_path_buf()) {
            self.loading = None;
            self.open_failed(request, &OpenError::LoaderUnavailable);
            return;
        }
        self.loading = Some(request);
        self.sink.begin_load();
        info!(request, path = %path.display(), "open requested");
    }

    /// True while the most recent open is still decoding.
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn slider_moved(&mut self, percent: u32) {
        self.zoom.slider_moved(percent);
        self.display_pass();
    }

    pub fn commit_text(&mut self) -> Result<(), ZoomInputError> {
        let percent = self.zoom.commit_text()?.percent();
        self.slider_moved(percent);
        Ok(())
    }

    /// External zoom API: 1.0 = 100%, clamped to the slider range.
    pub fn set_zoom(&mut self, factor: f64) -> Result<(), ZoomInputError> {
        let percent = self.zoom.set_multiplier(factor)?.percent();
        self.slider_moved(percent);
        Ok(())
    }

    pub fn handle_command(&mut self, command: ViewerCommand) {
        info!(?command, "viewer command");
        match command {
            ViewerCommand::SetZoom { factor } => {
                if let Err(err) = self.set_zoom(factor) {
                    warn!(factor, error = %err, "rejected zoom command");
                }
            }
            ViewerCommand::Open { path } => self.open(&path),
        }
    }

    /// Single dispatch point for everything the background threads send
    /// back. Returns how many events were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            match event {
                WorkerEvent::Outcome { seq, outcome } => {
                    self.sink.apply_outcome(seq, outcome);
                }
                WorkerEvent::Finished { seq } => {
                    self.sink.apply_finished(seq);
                }
                WorkerEvent::Opened { request, result } => self.finish_open(request, result),
            }
            applied += 1;
        }
        applied
    }

    pub fn display(&self) -> &Display {
        self.sink.display()
    }

    pub fn controls_enabled(&self) -> bool {
        self.sink.controls_enabled()
    }

    pub fn outstanding(&self) -> usize {
        self.sink.outstanding()
    }

    pub fn zoom(&self) -> ZoomFactor {
        self.zoom.factor()
    }

    pub fn zoom_text(&self) -> &str {
        self.zoom.text()
    }

    pub fn zoom_text_mut(&mut self) -> &mut String {
        self.zoom.text_mut()
    }

    pub fn source_dimensions(&self) -> Option<(u32, u32)> {
        self.holder.current().map(|image| image.dimensions())
    }

    /// Target size of the most recent submission for the current image.
    pub fn last_target(&self) -> Option<(u32, u32)> {
        self.last_target
    }

    fn finish_open(&mut self, request: u64, result: Result<Arc<SourceImage>, OpenError>) {
        self.sink.end_load();
        if self.loading != Some(request) {
            debug!(request, "discarding decode of a superseded open");
            return;
        }
        self.loading = None;
        match result {
            Ok(image) => {
                let (width, height) = image.dimensions();
                info!(request, path = %image.path().display(), width, height, "image opened");
                self.holder.install(image);
                self.zoom.reset();
                self.display_pass();
            }
            Err(err) => self.open_failed(request, &err),
        }
    }

    fn open_failed(&mut self, request: u64, err: &OpenError) {
        warn!(request, error = %err, "failed to open image");
        self.sink.show_error(format!("Could not load image: {err}"));
    }

    fn display_pass(&mut self) {
        if self.loading.is_some() {
            // the finished decode runs its own pass
            return;
        }
        let Some(source) = self.holder.current() else {
            self.sink.show_prompt();
            return;
        };
        let (width, height) = source.dimensions();
        let factor = self.zoom.factor();
        let target = factor.target_size(width, height);

        self.next_seq += 1;
        let seq = self.next_seq;
        self.sink.begin(seq);
        self.last_target = Some(target);
        let task = RescaleTask::new(
            seq,
            Some(source),
            target,
            self.filter,
            self.limits,
        );
        if !self.worker.submit(task) {
            self.sink.abandon(seq, "rescale worker is not running");
            return;
        }
        info!(
            seq,
            zoom = factor.percent(),
            width = target.0,
            height = target.1,
            backlog = self.worker.queued(),
            "display pass"
        );
    }
}
