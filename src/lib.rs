//! Pupilometer library for measuring pupil diameter over time from video.
//!
//! This library provides:
//! - `OpenCV`-based pupil localization: multi-threshold contour search with
//!   geometric scoring and angle-based contour refinement
//! - A self-centering search window with manual override
//! - Blink-aware signal conditioning and linear pixel-to-millimeter
//!   calibration
//! - A background playback loop with pause/speed/reset/end semantics that
//!   publishes encoded frames and live metrics
//! - Session history with an interpolated statistical report
//!
//! # Examples
//!
//! ## Running a headless session
//!
//! ```no_run
//! use pupilometer::{config::Config, session::PupilSession, video::VideoFile};
//!
//! # fn main() -> pupilometer::Result<()> {
//! let source = VideoFile::open("session.mp4")?;
//! let session = PupilSession::open(Box::new(source), Config::default())?;
//!
//! session.play();
//! while !session.metrics().ended {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//!
//! let report = session.report();
//! println!("mean diameter: {:.2} mm over {} frames", report.stats.avg, report.stats.count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Detecting in a single frame
//!
//! ```no_run
//! use pupilometer::config::DetectionConfig;
//! use pupilometer::pupil_detection::{Detection, PupilDetector};
//! use opencv::imgcodecs;
//!
//! # fn main() -> pupilometer::Result<()> {
//! let detector = PupilDetector::new(DetectionConfig::default());
//! let frame = imgcodecs::imread("eye.png", imgcodecs::IMREAD_COLOR)?;
//! if let Detection::Detected(ellipse) = detector.detect(&frame)? {
//!     println!("pupil diameter: {:.1} px", ellipse.diameter_px());
//! }
//! # Ok(())
//! # }
//! ```

/// Frame normalization to a fixed aspect ratio and resolution
pub mod preprocess;

/// Pupil localization via multi-threshold contour search
pub mod pupil_detection;

/// Search window state and auto-centering
pub mod roi_tracker;

/// Blink handling, jump rejection and calibration
pub mod signal_filter;

/// Per-frame history and the statistical report
pub mod history;

/// Playback state machine
pub mod playback;

/// Video source contract and file-backed implementation
pub mod video;

/// Session context and the background frame loop
pub mod session;

/// Utility functions for formatting and numeric conversions
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
