//! Windowed front end: the interactive thread of the viewer.
//!
//! egui drives the frame loop. Each frame drains control commands and worker
//! events into [`ViewerCore`] and then lays out the controls and image area.

pub mod sink;
pub mod state;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, TryRecvError};
use eframe::{App, egui};
use egui::{ImageData, TextureHandle, TextureOptions, ViewportCommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::events::ViewerCommand;
use crate::tasks::worker::Repaint;
use crate::zoom::{MAX_PERCENT, MIN_PERCENT};
use sink::Display;
use state::ViewerCore;

/// Lets threads outside the UI wake it once the window exists.
pub type ContextSlot = Arc<OnceLock<egui::Context>>;

/// Repaint callback that is a no-op until the window publishes its context.
pub fn slot_repaint(slot: &ContextSlot) -> Repaint {
    let slot = Arc::clone(slot);
    Arc::new(move || {
        if let Some(ctx) = slot.get() {
            ctx.request_repaint();
        }
    })
}

pub struct ViewerLaunch {
    /// Opened as soon as the window is up.
    pub image: Option<PathBuf>,
    /// Applied through the external zoom API after the startup open.
    pub zoom: Option<f64>,
    pub commands: Receiver<ViewerCommand>,
    pub context: ContextSlot,
    pub cancel: CancellationToken,
}

/// Run the viewer window on the current thread until it closes.
pub fn run_windowed(cfg: Configuration, launch: ViewerLaunch) -> Result<()> {
    let title = "Zoom Viewer";
    let viewport = egui::ViewportBuilder::default()
        .with_title(title)
        .with_inner_size(cfg.window_size)
        .with_drag_and_drop(true);
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    info!("launching viewer window");
    eframe::run_native(
        title,
        native_options,
        Box::new(move |cc| {
            let _ = launch.context.set(cc.egui_ctx.clone());
            let repaint = slot_repaint(&launch.context);
            let core = ViewerCore::new(&cfg, repaint)?;
            let zoom = launch.zoom.unwrap_or(cfg.initial_zoom);
            let startup = Startup {
                image: launch.image,
                zoom: (zoom != 1.0).then_some(zoom),
            };
            Ok(Box::new(ViewerApp::new(
                core,
                launch.commands,
                launch.cancel,
                startup,
            )))
        }),
    )
    .map_err(|err| anyhow!("viewer window failed: {err}"))
}

/// Work deferred to the first frame, once the texture limit is known.
struct Startup {
    image: Option<PathBuf>,
    zoom: Option<f64>,
}

struct ViewerApp {
    core: ViewerCore,
    commands: Receiver<ViewerCommand>,
    cancel: CancellationToken,
    startup: Option<Startup>,
    /// Applied once the startup decode has landed.
    startup_zoom: Option<f64>,
    path_input: String,
    texture: Option<(u64, TextureHandle)>,
}

impl ViewerApp {
    fn new(
        core: ViewerCore,
        commands: Receiver<ViewerCommand>,
        cancel: CancellationToken,
        startup: Startup,
    ) -> Self {
        Self {
            core,
            commands,
            cancel,
            startup: Some(startup),
            startup_zoom: None,
            path_input: String::new(),
            texture: None,
        }
    }

    fn start(&mut self, startup: Startup) {
        if let Some(path) = startup.image {
            self.open(path);
        }
        self.startup_zoom = startup.zoom;
    }

    fn apply_startup_zoom(&mut self) {
        if self.core.is_loading() {
            return;
        }
        let Some(zoom) = self.startup_zoom.take() else {
            return;
        };
        if matches!(self.core.display(), Display::Error(_)) {
            info!(zoom, "startup image failed; skipping startup zoom");
            return;
        }
        if let Err(err) = self.core.set_zoom(zoom) {
            warn!(zoom, error = %err, "ignoring startup zoom");
        }
    }

    fn open(&mut self, path: PathBuf) {
        self.path_input = path.display().to_string();
        self.core.open(&path);
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(ViewerCommand::Open { path }) => self.open(path),
                Ok(command) => self.core.handle_command(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn open_dropped(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        if let Some(path) = dropped.into_iter().last() {
            self.open(path);
        }
    }

    fn sync_texture(&mut self, ctx: &egui::Context, max_side: usize) {
        let Some(shown) = self.core.display().image() else {
            self.texture = None;
            return;
        };
        if self.texture.as_ref().map(|(seq, _)| *seq) == Some(shown.seq) {
            return;
        }
        if shown.image.size.iter().any(|side| *side > max_side) {
            // produced before the limit was known; egui would panic on upload
            warn!(seq = shown.seq, max_side, "rescaled image exceeds texture limit");
            self.texture = None;
            return;
        }
        let texture = ctx.load_texture(
            "zoomed-image",
            ImageData::Color(Arc::clone(&shown.image)),
            TextureOptions::LINEAR,
        );
        self.texture = Some((shown.seq, texture));
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.path_input)
                    .hint_text("Image path")
                    .desired_width(260.0),
            );
            if ui.button("Open").clicked() {
                let path = PathBuf::from(self.path_input.trim());
                self.open(path);
            }
            ui.separator();

            let enabled = self.core.controls_enabled();
            ui.label("Zoom:");
            let mut percent = self.core.zoom().percent();
            let slider = ui.add_enabled(
                enabled,
                egui::Slider::new(&mut percent, MIN_PERCENT..=MAX_PERCENT)
                    .show_value(false)
                    .step_by(1.0),
            );
            if slider.changed() {
                self.core.slider_moved(percent);
            }

            let text = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(self.core.zoom_text_mut()).desired_width(80.0),
            );
            if text.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                // rejected input has already been reverted
                let _ = self.core.commit_text();
            }
        });
    }

    fn image_area(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| match (self.core.display(), &self.texture) {
                (Display::Image(_), Some((_, texture))) => {
                    // one texel per physical pixel
                    let size = texture.size_vec2() / ui.ctx().pixels_per_point();
                    ui.image((texture.id(), size));
                }
                (display, _) => {
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            display
                                .status_text()
                                .unwrap_or("Image is larger than the display can show"),
                        );
                    });
                }
            });
    }
}

impl App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.cancel.is_cancelled() {
            ctx.send_viewport_cmd(ViewportCommand::Close);
            return;
        }

        let max_side = ctx.input(|i| i.max_texture_side);
        self.core
            .set_max_texture_side(u32::try_from(max_side).unwrap_or(u32::MAX));
        if let Some(startup) = self.startup.take() {
            self.start(startup);
        }

        self.drain_commands();
        self.core.pump();
        self.apply_startup_zoom();
        self.open_dropped(ctx);
        self.sync_texture(ctx, max_side);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| self.controls(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.image_area(ui));

        // the worker requests repaints itself; this only catches cancellation
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}
