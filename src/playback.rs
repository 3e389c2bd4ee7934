//! Playback state machine: phases, speed control and the elapsed clock.

use std::time::{Duration, Instant};

/// Playback phase
///
/// Sessions start paused. Reset is a transient request consumed by the frame
/// loop, which seeks the source, clears session state and lands back in
/// `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Paused,
    Playing,
    Ended,
}

/// Shared playback control block
///
/// Mutated by control commands from request handlers and once per cycle by
/// the frame loop; always accessed under the session lock.
pub struct PlaybackControl {
    phase: PlaybackPhase,
    speed: f64,
    reset_requested: bool,
    started_at: Option<Instant>,
    elapsed: Duration,
}

impl PlaybackControl {
    /// New control block in the initial paused state
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: PlaybackPhase::Paused,
            speed: 1.0,
            reset_requested: false,
            started_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Resume playback; only valid from `Paused`
    pub fn play(&mut self) {
        if self.phase == PlaybackPhase::Paused {
            self.phase = PlaybackPhase::Playing;
        }
    }

    /// Pause playback; only valid from `Playing`
    pub fn pause(&mut self) {
        if self.phase == PlaybackPhase::Playing {
            self.phase = PlaybackPhase::Paused;
        }
    }

    /// End the session, from any phase
    pub fn end(&mut self) {
        self.phase = PlaybackPhase::Ended;
    }

    /// Mark the source as exhausted
    pub fn mark_exhausted(&mut self) {
        self.phase = PlaybackPhase::Ended;
    }

    /// Request a reset; the frame loop performs it
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Consume a pending reset request
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    /// Return to the initial paused state after a reset
    pub fn apply_reset(&mut self) {
        self.phase = PlaybackPhase::Paused;
        self.started_at = None;
        self.elapsed = Duration::ZERO;
    }

    /// Set the playback speed multiplier; non-positive values are ignored
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Current speed multiplier
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Advance the elapsed clock while playing.
    ///
    /// The first tick after a reset records the start timestamp.
    pub fn tick_playing(&mut self, now: Instant) {
        let started = *self.started_at.get_or_insert(now);
        self.elapsed = now.duration_since(started);
    }

    /// Elapsed processing time since playback first started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Inter-frame delay slowing playback below 1.0x; `None` at full speed
    /// and above
    #[must_use]
    pub fn frame_delay(&self, base_delay_secs: f64) -> Option<Duration> {
        if self.speed < 1.0 {
            Some(Duration::from_secs_f64(base_delay_secs / self.speed))
        } else {
            None
        }
    }
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}
