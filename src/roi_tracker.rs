//! Search window state and deadzone-controlled auto-centering.

use crate::config::WindowConfig;
use crate::utils::f64_to_i32_clamp;
use opencv::core::Rect;
use serde::Serialize;
use std::time::Instant;

/// Manual move directions for the search window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
    /// Return the window to its default position
    Reset,
}

/// Read-only snapshot of the window for telemetry and tests
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub visible: bool,
}

/// Search window tracker
///
/// Auto-centering nudges the window toward the detected pupil center by a
/// fraction of the offset whenever the offset leaves the deadzone, unless a
/// manual control was used within the override period. Position and size are
/// re-clamped to the frame after every mutation.
pub struct RoiTracker {
    x: i32,
    y: i32,
    size: i32,
    visible: bool,
    last_manual: Option<Instant>,
    config: WindowConfig,
}

impl RoiTracker {
    /// Create a tracker at the configured default position
    #[must_use]
    pub fn new(config: WindowConfig) -> Self {
        Self {
            x: config.default_x,
            y: config.default_y,
            size: config.default_size,
            visible: true,
            last_manual: None,
            config,
        }
    }

    /// Current window state
    #[must_use]
    pub fn state(&self) -> WindowState {
        WindowState {
            x: self.x,
            y: self.y,
            size: self.size,
            visible: self.visible,
        }
    }

    /// Whether the window restricts the search and is drawn
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Enable or disable the window without losing position/size state
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Active search rectangle: the window when visible, else the full frame
    #[must_use]
    pub fn search_rect(&self, frame_width: i32, frame_height: i32) -> Rect {
        if self.visible {
            Rect::new(self.x, self.y, self.size.min(frame_width), self.size.min(frame_height))
        } else {
            Rect::new(0, 0, frame_width, frame_height)
        }
    }

    /// Re-clamp the window into the frame
    pub fn clamp_to(&mut self, frame_width: i32, frame_height: i32) {
        self.size = self.size.clamp(self.config.min_size, frame_width.min(frame_height));
        self.x = self.x.clamp(0, frame_width - self.size);
        self.y = self.y.clamp(0, frame_height - self.size);
    }

    /// Apply a manual move command; starts the auto-tracking override period
    pub fn nudge(&mut self, direction: MoveDirection, turbo: bool, frame_width: i32, frame_height: i32) {
        let step = if turbo { self.config.turbo_step } else { self.config.move_step };
        match direction {
            MoveDirection::Up => self.y -= step,
            MoveDirection::Down => self.y += step,
            MoveDirection::Left => self.x -= step,
            MoveDirection::Right => self.x += step,
            MoveDirection::Reset => {
                self.x = self.config.default_x;
                self.y = self.config.default_y;
            }
        }
        self.last_manual = Some(Instant::now());
        self.clamp_to(frame_width, frame_height);
    }

    /// Apply a manual resize; starts the auto-tracking override period
    pub fn resize(&mut self, size: i32, frame_width: i32, frame_height: i32) {
        self.size = size;
        self.last_manual = Some(Instant::now());
        self.clamp_to(frame_width, frame_height);
    }

    /// True while manual controls suppress auto-tracking
    #[must_use]
    pub fn manual_override_active(&self) -> bool {
        self.last_manual
            .is_some_and(|at| at.elapsed().as_secs_f64() < self.config.manual_override_secs)
    }

    /// Auto-center on a detected pupil center (frame coordinates).
    ///
    /// No-op while hidden or under manual override, or when both axis
    /// offsets are within the deadzone.
    pub fn track(&mut self, center_x: f64, center_y: f64, frame_width: i32, frame_height: i32) {
        if !self.visible || self.manual_override_active() {
            return;
        }

        let window_center_x = f64::from(self.x) + f64::from(self.size) / 2.0;
        let window_center_y = f64::from(self.y) + f64::from(self.size) / 2.0;
        let offset_x = center_x - window_center_x;
        let offset_y = center_y - window_center_y;

        if offset_x.abs() > self.config.deadzone_px || offset_y.abs() > self.config.deadzone_px {
            self.x += f64_to_i32_clamp(offset_x * self.config.tracking_gain, -frame_width, frame_width);
            self.y += f64_to_i32_clamp(offset_y * self.config.tracking_gain, -frame_height, frame_height);
            self.clamp_to(frame_width, frame_height);
        }
    }

    /// Restore every field to its configured default (session reset)
    pub fn reset(&mut self) {
        self.x = self.config.default_x;
        self.y = self.config.default_y;
        self.size = self.config.default_size;
        self.visible = true;
        self.last_manual = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    const W: i32 = 640;
    const H: i32 = 480;

    fn tracker() -> RoiTracker {
        RoiTracker::new(WindowConfig::default())
    }

    #[test]
    fn test_defaults() {
        let state = tracker().state();
        assert_eq!(state, WindowState { x: 170, y: 90, size: 300, visible: true });
    }

    #[test]
    fn test_nudge_steps() {
        let mut roi = tracker();
        roi.nudge(MoveDirection::Right, false, W, H);
        assert_eq!(roi.state().x, 190);
        roi.nudge(MoveDirection::Left, true, W, H);
        assert_eq!(roi.state().x, 140);
        roi.nudge(MoveDirection::Reset, false, W, H);
        assert_eq!((roi.state().x, roi.state().y), (170, 90));
    }

    #[test]
    fn test_clamping_after_moves() {
        let mut roi = tracker();
        for _ in 0..40 {
            roi.nudge(MoveDirection::Right, true, W, H);
        }
        assert_eq!(roi.state().x, W - roi.state().size);
        for _ in 0..40 {
            roi.nudge(MoveDirection::Up, true, W, H);
        }
        assert_eq!(roi.state().y, 0);
    }

    #[test]
    fn test_resize_clamps_range() {
        let mut roi = tracker();
        roi.resize(10, W, H);
        assert_eq!(roi.state().size, 100);
        roi.resize(500, W, H);
        assert_eq!(roi.state().size, 480);
        assert!(roi.state().y <= H - roi.state().size);
    }

    #[test]
    fn test_deadzone_suppresses_small_offsets() {
        let mut roi = tracker();
        let before = roi.state();
        // Window center is (320, 240); 10px off on both axes stays inside
        // the 15px deadzone
        roi.track(330.0, 250.0, W, H);
        assert_eq!(roi.state(), before);
    }

    #[test]
    fn test_tracking_moves_proportionally() {
        let mut roi = tracker();
        // 50px off on x only: expect a ~10% nudge
        roi.track(370.0, 240.0, W, H);
        assert_eq!(roi.state().x, 175);
        assert_eq!(roi.state().y, 90);
    }

    #[test]
    fn test_manual_override_suppresses_tracking() {
        let mut roi = tracker();
        roi.nudge(MoveDirection::Right, false, W, H);
        let before = roi.state();
        roi.track(400.0, 300.0, W, H);
        assert_eq!(roi.state(), before);
    }

    #[test]
    fn test_override_expires() {
        let mut roi = tracker();
        roi.nudge(MoveDirection::Right, false, W, H);
        roi.last_manual = Some(Instant::now() - Duration::from_secs(3));
        assert!(!roi.manual_override_active());
        let before_x = roi.state().x;
        roi.track(420.0, 240.0, W, H);
        assert!(roi.state().x > before_x);
    }

    #[test]
    fn test_hidden_window_searches_full_frame() {
        let mut roi = tracker();
        roi.set_visible(false);
        assert_eq!(roi.search_rect(W, H), Rect::new(0, 0, W, H));
        // Position and size survive the round trip
        roi.set_visible(true);
        assert_eq!(roi.search_rect(W, H), Rect::new(170, 90, 300, 300));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut roi = tracker();
        roi.nudge(MoveDirection::Down, true, W, H);
        roi.resize(200, W, H);
        roi.set_visible(false);
        roi.reset();
        assert_eq!(roi.state(), WindowState { x: 170, y: 90, size: 300, visible: true });
        assert!(!roi.manual_override_active());
    }

    proptest! {
        #[test]
        fn prop_window_always_inside_frame(
            moves in prop::collection::vec((0u8..5, any::<bool>()), 0..60),
            sizes in prop::collection::vec(0i32..1000, 0..10)
        ) {
            let mut roi = tracker();
            for size in sizes {
                roi.resize(size, W, H);
            }
            for (dir, turbo) in moves {
                let direction = match dir {
                    0 => MoveDirection::Up,
                    1 => MoveDirection::Down,
                    2 => MoveDirection::Left,
                    3 => MoveDirection::Right,
                    _ => MoveDirection::Reset,
                };
                roi.nudge(direction, turbo, W, H);
                let state = roi.state();
                prop_assert!(state.x >= 0 && state.x <= W - state.size);
                prop_assert!(state.y >= 0 && state.y <= H - state.size);
            }
        }
    }
}
