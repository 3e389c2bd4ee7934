//! Signal conditioning: blink handling, jump rejection and calibration.

use crate::config::SignalConfig;
use crate::constants::NO_DETECTION_MM;
use crate::{Error, Result};

/// Linear pixel-to-millimeter calibration scale
#[derive(Debug, Clone, Copy)]
pub struct CalibrationScale {
    pixels_per_mm: f64,
}

impl CalibrationScale {
    /// Create a scale; the factor must be positive
    pub fn new(pixels_per_mm: f64) -> Result<Self> {
        if !pixels_per_mm.is_finite() || pixels_per_mm <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Calibration scale must be positive, got {pixels_per_mm}"
            )));
        }
        Ok(Self { pixels_per_mm })
    }

    /// Set the scale from a measured reference pair.
    ///
    /// Non-positive or non-finite references are rejected and the previous
    /// scale is retained.
    pub fn set_reference(&mut self, reference_px: f64, reference_mm: f64) -> Result<f64> {
        if !reference_px.is_finite() || !reference_mm.is_finite() || reference_px <= 0.0 || reference_mm <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Calibration references must be positive, got {reference_px}px / {reference_mm}mm"
            )));
        }
        self.pixels_per_mm = reference_px / reference_mm;
        Ok(self.pixels_per_mm)
    }

    /// Current scale factor
    #[must_use]
    pub fn pixels_per_mm(&self) -> f64 {
        self.pixels_per_mm
    }

    /// Convert a pixel diameter to millimeters
    #[must_use]
    pub fn mm_from_px(&self, diameter_px: f64) -> f64 {
        diameter_px / self.pixels_per_mm
    }
}

impl Default for CalibrationScale {
    fn default() -> Self {
        Self {
            pixels_per_mm: crate::constants::DEFAULT_PIXELS_PER_MM,
        }
    }
}

/// Per-frame diameter conditioning state
///
/// Holds the last valid reading through blinks and, when filtering is
/// enabled, through single-frame jumps beyond `max_jump_mm`. Blink runs are
/// counted once per contiguous run.
pub struct SignalConditioner {
    last_valid_mm: f64,
    last_valid_px: f64,
    in_blink: bool,
    blink_count: u32,
    filter_on: bool,
    max_jump_mm: f64,
    min_plausible_mm: f64,
}

impl SignalConditioner {
    /// Create a conditioner from configuration
    #[must_use]
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            last_valid_mm: 0.0,
            last_valid_px: 0.0,
            in_blink: false,
            blink_count: 0,
            filter_on: config.filter_on,
            max_jump_mm: config.max_jump_mm,
            min_plausible_mm: config.min_plausible_mm,
        }
    }

    /// Condition one raw reading; returns the (mm, px) pair to publish.
    pub fn process(&mut self, raw_mm: f64, raw_px: f64) -> (f64, f64) {
        // No detection, or too small to be an open pupil: hold the last
        // valid reading and count the run as one blink
        if raw_mm <= NO_DETECTION_MM || raw_mm < self.min_plausible_mm {
            if !self.in_blink {
                self.in_blink = true;
                self.blink_count += 1;
            }
            return (self.last_valid_mm, self.last_valid_px);
        }

        self.in_blink = false;

        if !self.filter_on {
            self.last_valid_mm = raw_mm;
            self.last_valid_px = raw_px;
            return (raw_mm, raw_px);
        }

        if self.last_valid_mm > 0.0 && (raw_mm - self.last_valid_mm).abs() > self.max_jump_mm {
            return (self.last_valid_mm, self.last_valid_px);
        }

        self.last_valid_mm = raw_mm;
        self.last_valid_px = raw_px;
        (raw_mm, raw_px)
    }

    /// Enable or disable jump rejection
    pub fn set_filter_on(&mut self, enabled: bool) {
        self.filter_on = enabled;
    }

    /// Whether jump rejection is enabled
    #[must_use]
    pub fn filter_on(&self) -> bool {
        self.filter_on
    }

    /// Blinks counted since the last reset
    #[must_use]
    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    /// Clear measurement state; the filter toggle persists
    pub fn reset(&mut self) {
        self.last_valid_mm = 0.0;
        self.last_valid_px = 0.0;
        self.in_blink = false;
        self.blink_count = 0;
    }
}
