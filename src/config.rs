use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use fast_image_resize as fir;
use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::zoom::{MAX_PERCENT, MIN_PERCENT};

/// Smooth resampling filters offered for rescaling. Nearest-neighbour is
/// deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Mitchell,
    Bilinear,
    Gaussian,
}

impl ResampleFilter {
    const ALL: &'static [Self] = &[
        Self::Lanczos3,
        Self::CatmullRom,
        Self::Mitchell,
        Self::Bilinear,
        Self::Gaussian,
    ];
    const NAMES: &'static [&'static str] =
        &["lanczos3", "catmull-rom", "mitchell", "bilinear", "gaussian"];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Lanczos3 => "lanczos3",
            Self::CatmullRom => "catmull-rom",
            Self::Mitchell => "mitchell",
            Self::Bilinear => "bilinear",
            Self::Gaussian => "gaussian",
        }
    }

    pub fn to_fir(self) -> fir::FilterType {
        match self {
            Self::Lanczos3 => fir::FilterType::Lanczos3,
            Self::CatmullRom => fir::FilterType::CatmullRom,
            Self::Mitchell => fir::FilterType::Mitchell,
            Self::Bilinear => fir::FilterType::Bilinear,
            Self::Gaussian => fir::FilterType::Gaussian,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResampleFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        for filter in Self::ALL {
            if raw == filter.as_str() {
                return Ok(*filter);
            }
        }
        Err(de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

/// What the viewer does with outcomes of tasks that a newer submission superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleResultPolicy {
    /// Only the most recently submitted task's outcome reaches the display.
    #[default]
    LatestOnly,
    /// Every outcome is displayed in submission order.
    ShowAll,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Initial window size in logical points.
    pub window_size: [f32; 2],
    /// Zoom multiplier applied after the startup image opens.
    pub initial_zoom: f64,
    /// Filter used by the resample primitive.
    pub resample_filter: ResampleFilter,
    /// Handling of superseded rescale outcomes.
    pub stale_results: StaleResultPolicy,
    /// Rescale targets above this many pixels fail instead of allocating.
    pub max_output_pixels: u64,
    /// File extensions accepted by open, compared case-insensitively.
    pub supported_extensions: Vec<String>,
    /// Unix domain socket accepting JSON zoom/open commands.
    pub control_socket_path: Option<PathBuf>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.window_size.iter().all(|v| v.is_finite() && *v > 0.0),
            "window-size entries must be positive"
        );
        let min = f64::from(MIN_PERCENT) / 100.0;
        let max = f64::from(MAX_PERCENT) / 100.0;
        ensure!(
            self.initial_zoom.is_finite() && (min..=max).contains(&self.initial_zoom),
            "initial-zoom must be between {min} and {max}"
        );
        ensure!(
            self.max_output_pixels > 0,
            "max-output-pixels must be greater than zero"
        );
        self.supported_extensions = self
            .supported_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        ensure!(
            !self.supported_extensions.is_empty(),
            "supported-extensions must include at least one entry"
        );
        if let Some(path) = &self.control_socket_path {
            ensure!(
                path.file_name().is_some(),
                "control-socket-path must include a socket file name"
            );
        }
        Ok(self)
    }

    /// Load `path` if given, otherwise fall back to defaults; validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(path) => Self::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => Self::default(),
        };
        cfg.validated().context("invalid configuration values")
    }

    fn default_supported_extensions() -> Vec<String> {
        ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"]
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            window_size: [1000.0, 700.0],
            initial_zoom: 1.0,
            resample_filter: ResampleFilter::default(),
            stale_results: StaleResultPolicy::default(),
            max_output_pixels: 150_000_000,
            supported_extensions: Self::default_supported_extensions(),
            control_socket_path: None,
        }
    }
}
