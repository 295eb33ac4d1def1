use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::StaleResultPolicy;
use crate::events::{DisplayImage, TaskOutcome};

pub const PROMPT_TEXT: &str = "Click 'Open' or drop a file to load an image";
pub const PROCESSING_TEXT: &str = "Processing image, please wait...";
pub const LOADING_TEXT: &str = "Loading image, please wait...";

/// What the image area currently shows.
#[derive(Debug, Clone)]
pub enum Display {
    Prompt,
    Loading,
    Processing,
    Image(Shown),
    Error(String),
}

impl Display {
    /// Text shown in place of an image, if any.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            Self::Prompt => Some(PROMPT_TEXT),
            Self::Loading => Some(LOADING_TEXT),
            Self::Processing => Some(PROCESSING_TEXT),
            Self::Error(msg) => Some(msg),
            Self::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&Shown> {
        match self {
            Self::Image(shown) => Some(shown),
            _ => None,
        }
    }
}

/// A rescaled image on screen, tagged with the task that produced it.
#[derive(Debug, Clone)]
pub struct Shown {
    pub seq: u64,
    pub image: Arc<DisplayImage>,
}

impl Shown {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.size[0] as u32, self.image.size[1] as u32)
    }
}

/// Interactive-thread side of the pipeline: applies worker events to the
/// display and tracks how many submitted tasks and decodes have not
/// completed yet.
#[derive(Debug)]
pub struct ResultSink {
    policy: StaleResultPolicy,
    display: Display,
    outstanding: usize,
    last_submitted: u64,
    generation_start: u64,
}

impl ResultSink {
    pub fn new(policy: StaleResultPolicy) -> Self {
        Self {
            policy,
            display: Display::Prompt,
            outstanding: 0,
            last_submitted: 0,
            generation_start: 0,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Slider and text input are usable only while nothing is in flight,
    /// including a pending decode.
    pub fn controls_enabled(&self) -> bool {
        self.outstanding == 0
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Bracket opened right before task `seq` is submitted.
    pub fn begin(&mut self, seq: u64) {
        self.outstanding += 1;
        self.last_submitted = seq;
        self.display = Display::Processing;
    }

    /// Undo [`Self::begin`] for a task that never reached the worker.
    pub fn abandon(&mut self, seq: u64, reason: &str) {
        self.outstanding = self.outstanding.saturating_sub(1);
        warn!(seq, reason, "rescale abandoned");
        self.display = Display::Error(format!("Error: {reason}"));
    }

    /// Bracket opened when a decode is queued.
    pub fn begin_load(&mut self) {
        self.outstanding += 1;
        self.display = Display::Loading;
    }

    /// Closes [`Self::begin_load`], whether or not the result is still wanted.
    pub fn end_load(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Outcomes of tasks numbered below `first_seq` belong to a replaced image.
    pub fn start_generation(&mut self, first_seq: u64) {
        self.generation_start = first_seq;
    }

    pub fn show_prompt(&mut self) {
        self.display = Display::Prompt;
    }

    pub fn show_error(&mut self, message: String) {
        self.display = Display::Error(message);
    }

    /// Completion notice of task `seq`. Returns `true` when the display changed.
    pub fn apply_finished(&mut self, seq: u64) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);
        debug!(seq, outstanding = self.outstanding, "rescale completed");
        if self.outstanding == 0 && matches!(self.display, Display::Processing) {
            warn!(seq, "last rescale completed without a displayable result");
            self.display = Display::Error("Error: rescale produced no result".into());
            return true;
        }
        false
    }

    /// Outcome of task `seq`. Returns `true` when the display changed.
    pub fn apply_outcome(&mut self, seq: u64, outcome: TaskOutcome) -> bool {
        if seq < self.generation_start {
            debug!(seq, "discarding outcome for a replaced image");
            return false;
        }
        if self.policy == StaleResultPolicy::LatestOnly && seq != self.last_submitted {
            debug!(seq, latest = self.last_submitted, "discarding superseded outcome");
            return false;
        }
        self.display = match outcome {
            TaskOutcome::Success(image) => Display::Image(Shown { seq, image }),
            TaskOutcome::Failure(message) => Display::Error(format!("Error: {message}")),
        };
        true
    }
}
