//! Constants used throughout the application

/// Normalized frame width every source frame is resized to
pub const FRAME_WIDTH: i32 = 640;

/// Normalized frame height every source frame is resized to
pub const FRAME_HEIGHT: i32 = 480;

/// Default pixel-to-millimeter calibration scale
pub const DEFAULT_PIXELS_PER_MM: f64 = 18.0;

/// Default maximum accepted frame-to-frame diameter change (mm)
pub const DEFAULT_MAX_JUMP_MM: f64 = 2.0;

/// Diameters below this are treated as eyelid occlusion (mm)
pub const MIN_PLAUSIBLE_DIAMETER_MM: f64 = 1.0;

/// Raw readings at or below this count as "no detection" (mm)
pub const NO_DETECTION_MM: f64 = 0.1;

/// Default search window position and size
pub const DEFAULT_WINDOW_X: i32 = 170;
pub const DEFAULT_WINDOW_Y: i32 = 90;
pub const DEFAULT_WINDOW_SIZE: i32 = 300;

/// Smallest accepted search window edge length
pub const MIN_WINDOW_SIZE: i32 = 100;

/// Detected-center offsets within this band do not move the window (px)
pub const TRACKING_DEADZONE_PX: f64 = 15.0;

/// Fraction of the center offset applied per frame while auto-tracking
pub const TRACKING_GAIN: f64 = 0.1;

/// Seconds a manual move/resize suppresses auto-tracking
pub const MANUAL_OVERRIDE_SECS: f64 = 2.0;

/// Manual window move step sizes (px)
pub const MOVE_STEP_PX: i32 = 20;
pub const TURBO_STEP_PX: i32 = 50;

/// Box filter side used to find the darkest local region
pub const SEED_BOX_SIZE: i32 = 15;

/// Border margin ignored when seeding the darkest region (px)
pub const SEED_BORDER_MARGIN: i32 = 10;

/// Threshold offsets above the seed intensity, strict to relaxed
pub const THRESHOLD_OFFSETS: [i32; 3] = [5, 15, 25];

/// Side of the square around the seed the binary masks are limited to (px)
pub const SEARCH_MASK_SIZE: i32 = 250;

/// Dilation kernel side and iteration count used to bridge contour gaps
pub const DILATE_KERNEL_SIZE: i32 = 5;
pub const DILATE_ITERATIONS: i32 = 2;

/// Smallest contour area considered a pupil candidate (px^2)
pub const MIN_CONTOUR_AREA: f64 = 200.0;

/// Largest accepted bounding-box long/short side ratio
pub const MAX_ASPECT_RATIO: f64 = 3.0;

/// Band thicknesses used when scoring contour-to-ellipse border agreement (px)
pub const ELLIPSE_BAND_THICK: i32 = 10;
pub const ELLIPSE_BAND_THIN: i32 = 4;

/// Contour points are kept only when the centroid direction is within this
/// angle of the neighbor-vector bisector (degrees)
pub const ANGLE_FILTER_DEGREES: f64 = 60.0;

/// Contour length divisor yielding the neighbor spacing for the angle filter
pub const ANGLE_SPACING_DIVISOR: usize = 25;

/// Minimum point count for an ellipse fit
pub const MIN_ELLIPSE_POINTS: usize = 5;

/// Idle sleep while paused (also the preview refresh cadence, ms)
pub const PAUSED_IDLE_MILLIS: u64 = 50;

/// Idle sleep once the session has ended (ms)
pub const ENDED_IDLE_MILLIS: u64 = 100;

/// Base per-frame delay scaled by 1/speed for sub-1.0 playback (seconds)
pub const BASE_FRAME_DELAY_SECS: f64 = 0.03;
