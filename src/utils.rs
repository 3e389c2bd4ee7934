//! Utility functions for display formatting and numeric conversions.

/// Format a duration in seconds as `MM:SS`
///
/// Non-finite or negative inputs yield the placeholder `--:--`.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--".to_string();
    }
    let total = seconds as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Round a value to a fixed number of decimal places for display
#[must_use]
pub fn round_decimals(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Clamp and convert f64 to i32 for pixel coordinates
///
/// Non-finite values collapse to the lower bound.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Acceptable for clamping bounds
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(f64::from(min), f64::from(max));
    (clamped as i32).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(65.4), "01:05");
        assert_eq!(format_duration(600.0), "10:00");
        assert_eq!(format_duration(3599.9), "59:59");
    }

    #[test]
    fn test_format_duration_invalid() {
        assert_eq!(format_duration(f64::NAN), "--:--");
        assert_eq!(format_duration(f64::INFINITY), "--:--");
        assert_eq!(format_duration(-1.0), "--:--");
    }

    #[test]
    fn test_round_decimals() {
        assert!((round_decimals(3.14159, 2) - 3.14).abs() < 1e-12);
        assert!((round_decimals(2.675, 1) - 2.7).abs() < 1e-12);
        assert!((round_decimals(-1.005, 2) + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_f64_to_i32_clamp() {
        assert_eq!(f64_to_i32_clamp(50.0, 0, 100), 50);
        assert_eq!(f64_to_i32_clamp(-10.0, 0, 100), 0);
        assert_eq!(f64_to_i32_clamp(150.0, 0, 100), 100);
        assert_eq!(f64_to_i32_clamp(f64::NAN, 0, 100), 0);
        assert_eq!(f64_to_i32_clamp(50.0, 42, 42), 42);
    }

    proptest! {
        #[test]
        fn prop_clamp_always_within_bounds(
            value in any::<f64>(),
            min in any::<i32>(),
            max in any::<i32>()
        ) {
            let (min, max) = if min <= max { (min, max) } else { (max, min) };
            let result = f64_to_i32_clamp(value, min, max);
            prop_assert!(result >= min);
            prop_assert!(result <= max);
        }
    }
}
