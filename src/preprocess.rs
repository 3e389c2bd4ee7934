//! Frame normalization: center crop to the target aspect ratio, then resize.

use crate::Result;
use opencv::core::{Mat, Rect, Size};
use opencv::imgproc;
use opencv::prelude::*;

/// Normalize a source frame to a fixed resolution.
///
/// The frame is center-cropped along its longer axis to the target aspect
/// ratio and then resized. Returns `None` for a null/empty input; callers
/// must skip that frame.
pub fn normalize_frame(frame: &Mat, width: i32, height: i32) -> Result<Option<Mat>> {
    if frame.empty() {
        return Ok(None);
    }

    let (w, h) = (frame.cols(), frame.rows());
    if w <= 0 || h <= 0 {
        return Ok(None);
    }

    let target_ratio = f64::from(width) / f64::from(height);
    let source_ratio = f64::from(w) / f64::from(h);

    let crop = if source_ratio > target_ratio {
        // Too wide: crop columns
        let new_w = ((target_ratio * f64::from(h)) as i32).clamp(1, w);
        Rect::new((w - new_w) / 2, 0, new_w, h)
    } else {
        // Too tall: crop rows
        let new_h = ((f64::from(w) / target_ratio) as i32).clamp(1, h);
        Rect::new(0, (h - new_h) / 2, w, new_h)
    };

    let cropped = Mat::roi(frame, crop)?;
    let mut resized = Mat::default();
    imgproc::resize(
        &cropped,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    Ok(Some(resized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn solid_frame(rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(128.0))
            .expect("frame allocation")
    }

    #[test]
    fn test_normalize_wide_input() {
        let frame = solid_frame(480, 1280);
        let out = normalize_frame(&frame, 640, 480).unwrap().unwrap();
        assert_eq!(out.cols(), 640);
        assert_eq!(out.rows(), 480);
    }

    #[test]
    fn test_normalize_tall_input() {
        let frame = solid_frame(1080, 640);
        let out = normalize_frame(&frame, 640, 480).unwrap().unwrap();
        assert_eq!(out.cols(), 640);
        assert_eq!(out.rows(), 480);
    }

    #[test]
    fn test_normalize_exact_input() {
        let frame = solid_frame(480, 640);
        let out = normalize_frame(&frame, 640, 480).unwrap().unwrap();
        assert_eq!(out.cols(), 640);
        assert_eq!(out.rows(), 480);
    }

    #[test]
    fn test_normalize_empty_input() {
        let frame = Mat::default();
        assert!(normalize_frame(&frame, 640, 480).unwrap().is_none());
    }
}
