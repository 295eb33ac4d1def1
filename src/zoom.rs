//! Zoom state shared by the slider, the text field and the external zoom API.
//!
//! The slider edge is the only place the factor changes. Text and external
//! input are normalized to an integer percent and routed through it, so a
//! single code path derives the target size.

use crate::error::ZoomInputError;

pub const MIN_PERCENT: u32 = 10;
pub const MAX_PERCENT: u32 = 500;
pub const DEFAULT_PERCENT: u32 = 100;

/// Zoom factor stored as an integer percent in `MIN_PERCENT..=MAX_PERCENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomFactor(u32);

impl ZoomFactor {
    /// Clamp `percent` into the valid domain.
    pub fn from_percent(percent: u32) -> Self {
        Self(percent.clamp(MIN_PERCENT, MAX_PERCENT))
    }

    /// Clamp a multiplier (1.0 = 100%) into the valid domain.
    pub fn from_multiplier(factor: f64) -> Result<Self, ZoomInputError> {
        if !factor.is_finite() {
            return Err(ZoomInputError::NonFinite);
        }
        let percent = truncate_percent(factor * 100.0)
            .clamp(f64::from(MIN_PERCENT), f64::from(MAX_PERCENT));
        Ok(Self(percent as u32))
    }

    pub fn percent(self) -> u32 {
        self.0
    }

    pub fn multiplier(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Text shown in the zoom field, e.g. `"150%"`.
    pub fn label(self) -> String {
        format!("{}%", self.0)
    }

    /// Pixel size of a `width`x`height` image at this zoom, each side at least 1.
    pub fn target_size(self, width: u32, height: u32) -> (u32, u32) {
        let scale = |side: u32| -> u32 {
            let scaled = (f64::from(side) * f64::from(self.0) / 100.0).round();
            (scaled as u32).max(1)
        };
        (scale(width), scale(height))
    }
}

impl Default for ZoomFactor {
    fn default() -> Self {
        Self(DEFAULT_PERCENT)
    }
}

/// Parse zoom text into an integer percent.
///
/// `"150%"` is a percent, a bare `"1.5"` is a multiplier. Values outside
/// `MIN_PERCENT..=MAX_PERCENT` are rejected rather than clamped; accepted
/// fractions are truncated (`"150.6%"` is 150).
pub fn parse_zoom_text(text: &str) -> Result<u32, ZoomInputError> {
    let trimmed = text.trim();
    let percent = match trimmed.strip_suffix('%') {
        Some(number) => parse_number(number)?,
        None => parse_number(trimmed)? * 100.0,
    };
    if !(f64::from(MIN_PERCENT)..=f64::from(MAX_PERCENT)).contains(&percent) {
        return Err(ZoomInputError::OutOfRange(percent));
    }
    Ok(truncate_percent(percent) as u32)
}

// Drops the fractional part, tolerating representation error so that
// `1.15 * 100.0` (114.99999999999999) still lands on 115.
fn truncate_percent(percent: f64) -> f64 {
    (percent + 1e-9).trunc()
}

fn parse_number(raw: &str) -> Result<f64, ZoomInputError> {
    let raw = raw.trim();
    let value: f64 = raw
        .parse()
        .map_err(|_| ZoomInputError::Unparsable(raw.to_string()))?;
    if value.is_nan() {
        return Err(ZoomInputError::Unparsable(raw.to_string()));
    }
    Ok(value)
}

/// Owns the current zoom factor and the contents of the zoom text field.
#[derive(Debug, Clone)]
pub struct ZoomController {
    factor: ZoomFactor,
    text: String,
}

impl Default for ZoomController {
    fn default() -> Self {
        let factor = ZoomFactor::default();
        Self {
            factor,
            text: factor.label(),
        }
    }
}

impl ZoomController {
    pub fn factor(&self) -> ZoomFactor {
        self.factor
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Editable buffer backing the text field. Edits take effect on [`Self::commit_text`].
    pub fn text_mut(&mut self) -> &mut String {
        &mut self.text
    }

    /// Slider edge: sets the factor and mirrors it into the text field.
    pub fn slider_moved(&mut self, percent: u32) -> ZoomFactor {
        self.factor = ZoomFactor::from_percent(percent);
        self.text = self.factor.label();
        self.factor
    }

    /// Text edge. On rejection the text field is restored and the factor kept.
    pub fn commit_text(&mut self) -> Result<ZoomFactor, ZoomInputError> {
        match parse_zoom_text(&self.text) {
            Ok(percent) => Ok(self.slider_moved(percent)),
            Err(err) => {
                self.text = self.factor.label();
                Err(err)
            }
        }
    }

    /// External API edge: clamps and routes through the slider.
    pub fn set_multiplier(&mut self, factor: f64) -> Result<ZoomFactor, ZoomInputError> {
        let zoom = ZoomFactor::from_multiplier(factor)?;
        Ok(self.slider_moved(zoom.percent()))
    }

    /// Back to 100% without triggering anything.
    pub fn reset(&mut self) {
        self.factor = ZoomFactor::default();
        self.text = self.factor.label();
    }
}
