use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::OpenError;
use crate::source::SourceImage;

/// Image in the display surface's native format, ready for texture upload.
pub type DisplayImage = egui::ColorImage;

/// Terminal result of one rescale task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(Arc<DisplayImage>),
    Failure(String),
}

/// Messages sent from the background threads back to the interactive thread.
///
/// Every rescale task produces exactly one `Outcome` followed by exactly one
/// `Finished`. Every open request produces exactly one `Opened`.
#[derive(Debug)]
pub enum WorkerEvent {
    Outcome {
        seq: u64,
        outcome: TaskOutcome,
    },
    Finished {
        seq: u64,
    },
    Opened {
        request: u64,
        result: Result<Arc<SourceImage>, OpenError>,
    },
}

/// Commands that drive the viewer from outside the window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ViewerCommand {
    /// Programmatic zoom, 1.0 = 100%.
    SetZoom { factor: f64 },
    Open { path: PathBuf },
}
