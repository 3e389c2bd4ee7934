//! Configuration management for the pupilometer application

use crate::{constants, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame normalization configuration
    pub frame: FrameConfig,

    /// Pupil detection configuration
    pub detection: DetectionConfig,

    /// Search window / auto-tracking configuration
    pub window: WindowConfig,

    /// Signal conditioning configuration
    pub signal: SignalConfig,

    /// Playback loop configuration
    pub playback: PlaybackConfig,
}

/// Frame normalization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Normalized frame width
    pub width: i32,

    /// Normalized frame height
    pub height: i32,
}

/// Pupil detection parameters
///
/// These are empirically chosen constants; tune offline against labeled
/// footage rather than adjusting ad hoc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Box filter side used when seeding the darkest region
    pub seed_box_size: i32,

    /// Border margin ignored during seeding (px)
    pub seed_border_margin: i32,

    /// Threshold offsets above the seed intensity, strict to relaxed
    pub threshold_offsets: Vec<i32>,

    /// Side of the square mask centered on the seed (px)
    pub search_mask_size: i32,

    /// Minimum contour area accepted as a candidate (px^2)
    pub min_contour_area: f64,

    /// Maximum bounding-box long/short side ratio
    pub max_aspect_ratio: f64,

    /// Angle filter threshold for contour refinement (degrees)
    pub angle_filter_degrees: f64,
}

/// Search window parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Default window x position
    pub default_x: i32,

    /// Default window y position
    pub default_y: i32,

    /// Default window edge length
    pub default_size: i32,

    /// Smallest accepted window edge length
    pub min_size: i32,

    /// Auto-tracking deadzone (px)
    pub deadzone_px: f64,

    /// Fraction of the detected offset applied per frame
    pub tracking_gain: f64,

    /// Seconds a manual control suppresses auto-tracking
    pub manual_override_secs: f64,

    /// Manual move step (px)
    pub move_step: i32,

    /// Manual move step with turbo (px)
    pub turbo_step: i32,
}

/// Signal conditioning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Enable jump rejection at startup
    pub filter_on: bool,

    /// Maximum accepted frame-to-frame change (mm)
    pub max_jump_mm: f64,

    /// Diameters below this count as a blink (mm)
    pub min_plausible_mm: f64,

    /// Initial pixels-per-millimeter calibration scale
    pub pixels_per_mm: f64,
}

/// Playback loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Idle sleep while paused (ms)
    pub paused_idle_millis: u64,

    /// Idle sleep once ended (ms)
    pub ended_idle_millis: u64,

    /// Base per-frame delay scaled by 1/speed below 1.0x (seconds)
    pub base_frame_delay_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            detection: DetectionConfig::default(),
            window: WindowConfig::default(),
            signal: SignalConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: constants::FRAME_WIDTH,
            height: constants::FRAME_HEIGHT,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            seed_box_size: constants::SEED_BOX_SIZE,
            seed_border_margin: constants::SEED_BORDER_MARGIN,
            threshold_offsets: constants::THRESHOLD_OFFSETS.to_vec(),
            search_mask_size: constants::SEARCH_MASK_SIZE,
            min_contour_area: constants::MIN_CONTOUR_AREA,
            max_aspect_ratio: constants::MAX_ASPECT_RATIO,
            angle_filter_degrees: constants::ANGLE_FILTER_DEGREES,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_x: constants::DEFAULT_WINDOW_X,
            default_y: constants::DEFAULT_WINDOW_Y,
            default_size: constants::DEFAULT_WINDOW_SIZE,
            min_size: constants::MIN_WINDOW_SIZE,
            deadzone_px: constants::TRACKING_DEADZONE_PX,
            tracking_gain: constants::TRACKING_GAIN,
            manual_override_secs: constants::MANUAL_OVERRIDE_SECS,
            move_step: constants::MOVE_STEP_PX,
            turbo_step: constants::TURBO_STEP_PX,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            filter_on: true,
            max_jump_mm: constants::DEFAULT_MAX_JUMP_MM,
            min_plausible_mm: constants::MIN_PLAUSIBLE_DIAMETER_MM,
            pixels_per_mm: constants::DEFAULT_PIXELS_PER_MM,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            paused_idle_millis: constants::PAUSED_IDLE_MILLIS,
            ended_idle_millis: constants::ENDED_IDLE_MILLIS,
            base_frame_delay_secs: constants::BASE_FRAME_DELAY_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.frame.width <= 0 || self.frame.height <= 0 {
            return Err(Error::Config("Frame dimensions must be positive".to_string()));
        }

        if self.detection.threshold_offsets.is_empty() {
            return Err(Error::Config("At least one threshold offset is required".to_string()));
        }
        if self.detection.seed_box_size <= 0 || self.detection.seed_border_margin < 0 {
            return Err(Error::Config("Invalid darkest-region seeding parameters".to_string()));
        }
        if self.detection.min_contour_area <= 0.0 {
            return Err(Error::Config("Minimum contour area must be positive".to_string()));
        }
        if self.detection.max_aspect_ratio < 1.0 {
            return Err(Error::Config("Maximum aspect ratio must be at least 1.0".to_string()));
        }

        if self.window.min_size <= 0 || self.window.default_size < self.window.min_size {
            return Err(Error::Config("Window sizes must be positive and ordered".to_string()));
        }
        if self.window.default_size > self.frame.width.min(self.frame.height) {
            return Err(Error::Config("Default window must fit inside the frame".to_string()));
        }
        if !(0.0..=1.0).contains(&self.window.tracking_gain) {
            return Err(Error::Config("Tracking gain must be between 0.0 and 1.0".to_string()));
        }
        if self.window.deadzone_px < 0.0 {
            return Err(Error::Config("Deadzone must not be negative".to_string()));
        }

        if self.signal.pixels_per_mm <= 0.0 {
            return Err(Error::Config("Calibration scale must be positive".to_string()));
        }
        if self.signal.max_jump_mm <= 0.0 {
            return Err(Error::Config("Maximum jump must be positive".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Pupilometer Configuration

# Frame normalization
frame:
  width: 640
  height: 480

# Pupil detection
detection:
  seed_box_size: 15
  seed_border_margin: 10
  threshold_offsets: [5, 15, 25]
  search_mask_size: 250
  min_contour_area: 200.0
  max_aspect_ratio: 3.0
  angle_filter_degrees: 60.0

# Search window and auto-tracking
window:
  default_x: 170
  default_y: 90
  default_size: 300
  min_size: 100
  deadzone_px: 15.0
  tracking_gain: 0.1
  manual_override_secs: 2.0
  move_step: 20
  turbo_step: 50

# Signal conditioning
signal:
  filter_on: true
  max_jump_mm: 2.0
  min_plausible_mm: 1.0
  pixels_per_mm: 18.0

# Playback loop
playback:
  paused_idle_millis: 50
  ended_idle_millis: 100
  base_frame_delay_secs: 0.03
"#;
