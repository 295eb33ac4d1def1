use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a path into a [`crate::source::SourceImage`].
#[derive(Debug, Error)]
pub enum OpenError {
    /// The path has no extension or one outside the configured set.
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The codec panicked while decoding.
    #[error("decoder crashed on {}", .0.display())]
    DecoderPanicked(PathBuf),

    /// The background decoder is not running.
    #[error("image loader is not running")]
    LoaderUnavailable,

    /// The file was read but the codec rejected it.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Failure inside a rescale task. Always reported as a failed outcome,
/// never propagated out of the worker.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("no image loaded")]
    NoImage,

    #[error("invalid target size {width}x{height}")]
    DegenerateSize { width: u32, height: u32 },

    #[error("target size {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },

    /// The display surface cannot upload a texture this wide or tall.
    #[error("target size {width}x{height} exceeds the {limit}px display limit per side")]
    SideTooLong { width: u32, height: u32, limit: u32 },

    /// Skipped because the worker is shutting down.
    #[error("rescale cancelled: viewer is shutting down")]
    Cancelled,

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("conversion to display image failed: {0}")]
    Conversion(String),

    /// The resample primitive panicked; the payload message is kept.
    #[error("rescale panicked: {0}")]
    Panicked(String),
}

/// Rejected zoom input. The controller reverts the text field and submits nothing.
#[derive(Debug, Error, PartialEq)]
pub enum ZoomInputError {
    #[error("cannot parse zoom value {0:?}")]
    Unparsable(String),

    #[error("zoom {0}% is outside 10%..=500%")]
    OutOfRange(f64),

    #[error("zoom factor must be finite")]
    NonFinite,
}
