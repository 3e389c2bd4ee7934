//! Session context and the background frame loop.
//!
//! A session owns one video source and a dedicated worker thread running the
//! per-frame pipeline: normalize, locate the pupil inside the active search
//! window, update auto-tracking, condition the signal, draw the overlay and
//! publish the encoded frame plus live metrics. Control commands mutate the
//! shared state and return immediately; the worker picks them up on its next
//! cycle.

use crate::config::Config;
use crate::history::{ExportRow, History, SessionReport};
use crate::playback::{PlaybackControl, PlaybackPhase};
use crate::preprocess;
use crate::pupil_detection::{Detection, PupilDetector, PupilEllipse};
use crate::roi_tracker::{MoveDirection, RoiTracker, WindowState};
use crate::signal_filter::{CalibrationScale, SignalConditioner};
use crate::utils::{format_duration, round_decimals};
use crate::video::FrameSource;
use crate::Result;
use log::{debug, info, warn};
use opencv::core::{Mat, Point, Rect, Scalar, Size, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Live telemetry snapshot polled by the serving layer
#[derive(Debug, Clone, Serialize)]
pub struct LiveMetrics {
    pub diameter_mm: f64,
    pub diameter_px: f64,
    pub fps: u32,
    pub blinks: u32,
    pub paused: bool,
    pub ended: bool,
    pub elapsed_time: f64,
    pub total_duration: String,
}

/// Measurement fields written by the worker each cycle
#[derive(Debug, Clone, Copy, Default)]
struct Measurement {
    diameter_mm: f64,
    diameter_px: f64,
    fps: u32,
    blinks: u32,
}

/// State shared between the worker thread and request handlers.
///
/// Each block has its own lock; no code path holds two locks at once.
struct SessionShared {
    roi: Mutex<RoiTracker>,
    playback: Mutex<PlaybackControl>,
    signal: Mutex<SignalConditioner>,
    calibration: Mutex<CalibrationScale>,
    measurement: Mutex<Measurement>,
    history: Mutex<History>,
    latest_jpeg: Mutex<Option<Vec<u8>>>,
    stop: AtomicBool,
}

impl SessionShared {
    fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            roi: Mutex::new(RoiTracker::new(config.window.clone())),
            playback: Mutex::new(PlaybackControl::new()),
            signal: Mutex::new(SignalConditioner::new(&config.signal)),
            calibration: Mutex::new(CalibrationScale::new(config.signal.pixels_per_mm)?),
            measurement: Mutex::new(Measurement::default()),
            history: Mutex::new(History::new()),
            latest_jpeg: Mutex::new(None),
            stop: AtomicBool::new(false),
        })
    }
}

/// Lock a shared block, recovering the data from a poisoned mutex
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A measurement session over one video source
///
/// Dropping the session signals the worker thread, joins it and releases the
/// source handle.
pub struct PupilSession {
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
    total_duration: String,
    frame_width: i32,
    frame_height: i32,
}

impl PupilSession {
    /// Open a session and start its frame loop.
    pub fn open(source: Box<dyn FrameSource>, config: Config) -> Result<Self> {
        config.validate()?;

        let duration = source.duration_seconds();
        let total_duration = if duration > 0.0 {
            format_duration(duration)
        } else {
            "--:--".to_string()
        };
        info!("Starting session, duration {total_duration}");

        let shared = Arc::new(SessionShared::new(&config)?);
        let frame_width = config.frame.width;
        let frame_height = config.frame.height;

        let worker_shared = Arc::clone(&shared);
        let worker = FrameWorker {
            source,
            shared: worker_shared,
            detector: PupilDetector::new(config.detection.clone()),
            config,
            cached: None,
            prev_tick: None,
        };
        let handle = thread::Builder::new()
            .name("pupil-frame-loop".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            worker: Some(handle),
            total_duration,
            frame_width,
            frame_height,
        })
    }

    /// Resume playback
    pub fn play(&self) {
        lock(&self.shared.playback).play();
    }

    /// Pause playback; the preview keeps refreshing on the cached frame
    pub fn pause(&self) {
        lock(&self.shared.playback).pause();
    }

    /// End the session
    pub fn end(&self) {
        lock(&self.shared.playback).end();
    }

    /// Request a reset back to frame 0 in the paused state
    pub fn reset(&self) {
        lock(&self.shared.playback).request_reset();
    }

    /// Set the playback speed multiplier
    pub fn set_speed(&self, speed: f64) {
        lock(&self.shared.playback).set_speed(speed);
    }

    /// Manually move the search window
    pub fn move_window(&self, direction: MoveDirection, turbo: bool) {
        lock(&self.shared.roi).nudge(direction, turbo, self.frame_width, self.frame_height);
    }

    /// Manually resize the search window
    pub fn resize_window(&self, size: i32) {
        lock(&self.shared.roi).resize(size, self.frame_width, self.frame_height);
    }

    /// Show or hide the search window; hidden searches the full frame
    pub fn set_window_visible(&self, visible: bool) {
        lock(&self.shared.roi).set_visible(visible);
    }

    /// Current search window state
    #[must_use]
    pub fn window_state(&self) -> WindowState {
        lock(&self.shared.roi).state()
    }

    /// Enable or disable jump rejection
    pub fn set_filter_enabled(&self, enabled: bool) {
        lock(&self.shared.signal).set_filter_on(enabled);
    }

    /// Update the calibration scale from a measured reference pair
    pub fn calibrate(&self, reference_px: f64, reference_mm: f64) -> Result<f64> {
        lock(&self.shared.calibration).set_reference(reference_px, reference_mm)
    }

    /// Current pixels-per-millimeter scale
    #[must_use]
    pub fn pixels_per_mm(&self) -> f64 {
        lock(&self.shared.calibration).pixels_per_mm()
    }

    /// Live telemetry snapshot
    #[must_use]
    pub fn metrics(&self) -> LiveMetrics {
        let measurement = *lock(&self.shared.measurement);
        let (paused, ended, elapsed) = {
            let playback = lock(&self.shared.playback);
            (
                playback.phase() == PlaybackPhase::Paused,
                playback.phase() == PlaybackPhase::Ended,
                playback.elapsed().as_secs_f64(),
            )
        };
        LiveMetrics {
            diameter_mm: measurement.diameter_mm,
            diameter_px: measurement.diameter_px,
            fps: measurement.fps,
            blinks: measurement.blinks,
            paused,
            ended,
            elapsed_time: elapsed,
            total_duration: self.total_duration.clone(),
        }
    }

    /// Latest encoded frame, if one has been published yet
    #[must_use]
    pub fn latest_frame_jpeg(&self) -> Option<Vec<u8>> {
        lock(&self.shared.latest_jpeg).clone()
    }

    /// Number of history samples recorded so far
    #[must_use]
    pub fn history_len(&self) -> usize {
        lock(&self.shared.history).len()
    }

    /// Build the interpolated statistical report over the history so far
    #[must_use]
    pub fn report(&self) -> SessionReport {
        let blinks = lock(&self.shared.signal).blink_count();
        let scale = lock(&self.shared.calibration).pixels_per_mm();
        lock(&self.shared.history).build_report(blinks, scale)
    }

    /// Rows for the tabular export collaborator
    #[must_use]
    pub fn export_rows(&self) -> Vec<ExportRow> {
        let blinks = lock(&self.shared.signal).blink_count();
        let scale = lock(&self.shared.calibration).pixels_per_mm();
        lock(&self.shared.history).export_rows(blinks, scale)
    }

    /// Stop the frame loop and release the video source
    pub fn close(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("frame loop thread panicked");
            }
        }
    }
}

impl Drop for PupilSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// The background frame loop
struct FrameWorker {
    source: Box<dyn FrameSource>,
    shared: Arc<SessionShared>,
    detector: PupilDetector,
    config: Config,
    cached: Option<Mat>,
    prev_tick: Option<Instant>,
}

impl FrameWorker {
    fn run(mut self) {
        info!("Frame loop started");
        if let Err(e) = self.prime_preview() {
            warn!("preview priming failed: {e}");
        }
        while !self.shared.stop.load(Ordering::Relaxed) {
            // A bad frame degrades to "no new measurement", never a dead loop
            if let Err(e) = self.step() {
                warn!("frame loop recovered from error: {e}");
            }
        }
        info!("Frame loop stopped");
    }

    /// Process frame 0 once in paused mode and rewind, so a preview frame
    /// and initial metrics are published before playback starts.
    fn prime_preview(&mut self) -> Result<()> {
        if let Some(frame) = self.source.read()? {
            self.cached = Some(frame.try_clone()?);
            self.process_frame(&frame, true)?;
            self.source.rewind()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        if lock(&self.shared.playback).take_reset_request() {
            return self.handle_reset();
        }

        let (phase, delay) = {
            let playback = lock(&self.shared.playback);
            (
                playback.phase(),
                playback.frame_delay(self.config.playback.base_frame_delay_secs),
            )
        };

        match phase {
            PlaybackPhase::Paused => {
                // Re-process the cached frame so overlay and telemetry stay
                // live while ROI or calibration controls change
                let cached = match self.cached.as_ref() {
                    Some(frame) => Some(frame.try_clone()?),
                    None => None,
                };
                if let Some(frame) = cached {
                    self.process_frame(&frame, true)?;
                }
                thread::sleep(Duration::from_millis(self.config.playback.paused_idle_millis));
            }
            PlaybackPhase::Ended => {
                thread::sleep(Duration::from_millis(self.config.playback.ended_idle_millis));
            }
            PlaybackPhase::Playing => {
                lock(&self.shared.playback).tick_playing(Instant::now());
                if let Some(delay) = delay {
                    thread::sleep(delay);
                }
                match self.source.read()? {
                    None => {
                        info!("Video source exhausted");
                        lock(&self.shared.playback).mark_exhausted();
                    }
                    Some(frame) => {
                        self.cached = Some(frame.try_clone()?);
                        self.process_frame(&frame, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_reset(&mut self) -> Result<()> {
        info!("Resetting session");
        self.source.rewind()?;
        lock(&self.shared.playback).apply_reset();
        lock(&self.shared.signal).reset();
        lock(&self.shared.history).clear();
        lock(&self.shared.roi).reset();
        *lock(&self.shared.measurement) = Measurement::default();
        self.prev_tick = None;
        self.prime_preview()
    }

    /// One full pipeline pass over a source frame.
    fn process_frame(&mut self, frame: &Mat, paused: bool) -> Result<()> {
        let Some(mut canvas) = preprocess::normalize_frame(frame, self.config.frame.width, self.config.frame.height)?
        else {
            debug!("skipping empty source frame");
            return Ok(());
        };
        let (width, height) = (canvas.cols(), canvas.rows());

        let fps = self.tick_fps(paused);

        let search_rect = {
            let mut roi = lock(&self.shared.roi);
            roi.clamp_to(width, height);
            roi.search_rect(width, height)
        };

        let region = Mat::roi(&canvas, search_rect)?.try_clone()?;
        let detection = self.detector.detect(&region)?;

        let mut raw_px = 0.0;
        match detection {
            Detection::InvalidFrame => {
                // Unsearchable region: publish the frame, skip metrics and
                // history for this cycle
                debug!("search region invalid, frame skipped");
                self.publish_frame(&canvas)?;
                return Ok(());
            }
            Detection::NotFound => {}
            Detection::Detected(ellipse) => {
                raw_px = ellipse.diameter_px();
                let global_x = f64::from(ellipse.center.x) + f64::from(search_rect.x);
                let global_y = f64::from(ellipse.center.y) + f64::from(search_rect.y);
                lock(&self.shared.roi).track(global_x, global_y, width, height);
                draw_pupil(&mut canvas, &ellipse, global_x, global_y)?;
            }
        }

        let window = lock(&self.shared.roi).state();
        if window.visible {
            imgproc::rectangle(
                &mut canvas,
                Rect::new(window.x, window.y, window.size, window.size),
                Scalar::new(0.0, 255.0, 0.0, 0.0),
                2,
                imgproc::LINE_8,
                0,
            )?;
        }

        let raw_mm = lock(&self.shared.calibration).mm_from_px(raw_px);
        let (final_mm, final_px, blinks) = {
            let mut signal = lock(&self.shared.signal);
            let (mm, px) = signal.process(raw_mm, raw_px);
            (mm, px, signal.blink_count())
        };

        imgproc::put_text(
            &mut canvas,
            &format!("{final_mm:.2} mm"),
            Point::new(10, 30),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.9,
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;

        {
            let mut measurement = lock(&self.shared.measurement);
            measurement.diameter_mm = round_decimals(final_mm, 2);
            measurement.diameter_px = round_decimals(final_px, 1);
            measurement.fps = fps;
            measurement.blinks = blinks;
        }

        if !paused {
            lock(&self.shared.history).push(
                round_decimals(raw_mm, 2),
                round_decimals(final_mm, 2),
                round_decimals(final_px, 1),
            );
        }

        self.publish_frame(&canvas)
    }

    /// Instantaneous fps from the wall-clock delta between processed frames
    fn tick_fps(&mut self, paused: bool) -> u32 {
        if paused {
            return 0;
        }
        let now = Instant::now();
        let fps = match self.prev_tick {
            Some(prev) => {
                let delta = now.duration_since(prev).as_secs_f64();
                if delta > 0.0 {
                    (1.0 / delta) as u32
                } else {
                    0
                }
            }
            None => 0,
        };
        self.prev_tick = Some(now);
        fps
    }

    fn publish_frame(&self, frame: &Mat) -> Result<()> {
        let mut encoded: Vector<u8> = Vector::new();
        if imgcodecs::imencode(".jpg", frame, &mut encoded, &Vector::new())? {
            *lock(&self.shared.latest_jpeg) = Some(encoded.to_vec());
        }
        Ok(())
    }
}

/// Draw the detected ellipse and its center dot in frame coordinates
fn draw_pupil(canvas: &mut Mat, ellipse: &PupilEllipse, global_x: f64, global_y: f64) -> Result<()> {
    let center = Point::new(global_x.round() as i32, global_y.round() as i32);
    let half_axes = Size::new(
        (ellipse.axes.width / 2.0).round() as i32,
        (ellipse.axes.height / 2.0).round() as i32,
    );
    imgproc::ellipse(
        canvas,
        center,
        half_axes,
        f64::from(ellipse.angle),
        0.0,
        360.0,
        Scalar::new(0.0, 255.0, 255.0, 0.0),
        2,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::circle(
        canvas,
        center,
        3,
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}
