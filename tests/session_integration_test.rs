//! End-to-end tests for the session frame loop


use opencv::core::Mat;
use pupilometer::config::Config;
use pupilometer::roi_tracker::MoveDirection;
use pupilometer::session::PupilSession;
use pupilometer::video::FrameSource;
use pupilometer::Result;
use std::time::Duration;
use test_helpers::{wait_until, SyntheticEyeSource};

const ENDED_TIMEOUT: Duration = Duration::from_secs(60);

fn open_session(total_frames: i32) -> PupilSession {
    PupilSession::open(Box::new(SyntheticEyeSource::new(total_frames)), Config::default())
        .expect("session must open")
}

#[test]
fn test_play_to_end_records_every_frame() {
    let session = open_session(40);
    session.play();

    assert!(
        wait_until(ENDED_TIMEOUT, || session.metrics().ended),
        "session did not end in time"
    );

    assert_eq!(session.history_len(), 40);

    let report = session.report();
    assert_eq!(report.stats.count, 40);
    assert_eq!(report.stats.blinks, 0);
    // The synthetic pupil is ~78px across at the default 18 px/mm scale
    assert!(report.stats.avg > 3.0 && report.stats.avg < 6.0, "avg {}", report.stats.avg);
    assert!(report.comparison.delta_mm.abs() < 0.5);

    let metrics = session.metrics();
    assert!(metrics.ended);
    assert!(!metrics.paused);
    assert_eq!(metrics.total_duration, "00:01");
}

#[test]
fn test_reset_is_idempotent() {
    let session = open_session(10);
    session.play();
    assert!(wait_until(ENDED_TIMEOUT, || session.metrics().ended));
    assert!(session.history_len() > 0);

    let mut states = Vec::new();
    for _ in 0..2 {
        session.reset();
        assert!(
            wait_until(Duration::from_secs(10), || {
                let metrics = session.metrics();
                metrics.paused && session.history_len() == 0
            }),
            "reset did not settle"
        );
        let metrics = session.metrics();
        states.push((
            session.window_state(),
            session.history_len(),
            metrics.blinks,
            metrics.elapsed_time.to_bits(),
        ));
    }

    assert_eq!(states[0], states[1]);
    let (window, history_len, blinks, elapsed) = states[0];
    assert_eq!((window.x, window.y, window.size, window.visible), (170, 90, 300, true));
    assert_eq!(history_len, 0);
    assert_eq!(blinks, 0);
    assert_eq!(elapsed, 0.0_f64.to_bits());
}

#[test]
fn test_pause_stops_history_growth() {
    let session = open_session(5000);
    session.play();

    assert!(wait_until(Duration::from_secs(30), || session.history_len() > 3));
    session.pause();
    // Let any in-flight frame finish
    std::thread::sleep(Duration::from_millis(300));

    let frozen = session.history_len();
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(session.history_len(), frozen);

    let metrics = session.metrics();
    assert!(metrics.paused);
    assert_eq!(metrics.fps, 0);
    // The preview keeps publishing a measurement while paused
    assert!(metrics.diameter_mm > 0.0);

    session.end();
    assert!(wait_until(Duration::from_secs(10), || session.metrics().ended));
}

#[test]
fn test_explicit_end_stops_pulling() {
    let session = open_session(5000);
    session.play();
    assert!(wait_until(Duration::from_secs(30), || session.history_len() > 3));

    session.end();
    std::thread::sleep(Duration::from_millis(300));
    let frozen = session.history_len();
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(session.history_len(), frozen);
    assert!(session.metrics().ended);
}

#[test]
fn test_calibration_controls() {
    let session = open_session(5);

    let scale = session.calibrate(36.0, 2.0).expect("valid calibration");
    assert!((scale - 18.0).abs() < 1e-9);

    assert!(session.calibrate(0.0, 2.0).is_err());
    assert!(session.calibrate(36.0, -1.0).is_err());
    assert!((session.pixels_per_mm() - 18.0).abs() < 1e-9);

    let updated = session.calibrate(45.0, 3.0).expect("valid calibration");
    assert!((updated - 15.0).abs() < 1e-9);
}

#[test]
fn test_manual_window_controls() {
    let session = open_session(5);

    session.move_window(MoveDirection::Right, false);
    assert_eq!(session.window_state().x, 190);

    session.move_window(MoveDirection::Down, true);
    assert_eq!(session.window_state().y, 140);

    session.move_window(MoveDirection::Reset, false);
    let state = session.window_state();
    assert_eq!((state.x, state.y), (170, 90));

    session.resize_window(900);
    let state = session.window_state();
    assert_eq!(state.size, 480);
    assert!(state.x <= 640 - state.size && state.y <= 480 - state.size);

    session.resize_window(10);
    assert_eq!(session.window_state().size, 100);

    session.set_window_visible(false);
    assert!(!session.window_state().visible);
    session.set_window_visible(true);
    assert!(session.window_state().visible);
}

#[test]
fn test_preview_frame_published_while_paused() {
    let session = open_session(5);

    assert!(
        wait_until(Duration::from_secs(20), || session.latest_frame_jpeg().is_some()),
        "no preview frame published"
    );
    let jpeg = session.latest_frame_jpeg().unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG payload");

    // Paused preview publishes a measurement but records no history
    assert!(wait_until(Duration::from_secs(10), || session.metrics().diameter_mm > 0.0));
    assert_eq!(session.history_len(), 0);
    assert!(session.metrics().paused);
}

#[test]
fn test_empty_source_ends_immediately() {
    let session = open_session(0);
    session.play();

    assert!(wait_until(Duration::from_secs(10), || session.metrics().ended));
    assert_eq!(session.history_len(), 0);

    let report = session.report();
    assert_eq!(report.stats.count, 0);
    assert!((report.stats.avg - 0.0).abs() < 1e-9);
}

/// Source that intersperses undecodable (empty) frames with good ones
struct GlitchySource {
    inner: SyntheticEyeSource,
    served: i32,
}

impl FrameSource for GlitchySource {
    fn read(&mut self) -> Result<Option<Mat>> {
        self.served += 1;
        // Every third pull yields a malformed frame
        if self.served % 3 == 0 {
            return Ok(Some(Mat::default()));
        }
        self.inner.read()
    }

    fn rewind(&mut self) -> Result<()> {
        self.served = 0;
        self.inner.rewind()
    }

    fn frames_per_second(&self) -> f64 {
        self.inner.frames_per_second()
    }

    fn frame_count(&self) -> f64 {
        self.inner.frame_count()
    }
}

#[test]
fn test_malformed_frames_are_skipped_not_fatal() {
    let source = GlitchySource {
        inner: SyntheticEyeSource::new(12),
        served: 0,
    };
    let session = PupilSession::open(Box::new(source), Config::default()).expect("session must open");
    session.play();

    assert!(wait_until(ENDED_TIMEOUT, || session.metrics().ended));
    // Only decodable frames leave a history entry
    assert_eq!(session.history_len(), 12);
}
