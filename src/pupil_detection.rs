//! Pupil detection: multi-threshold contour search with geometric scoring.
//!
//! The locator seeds on the darkest local region of the search area, builds
//! three binary masks at increasingly strict thresholds, keeps the best
//! scoring contour across them, refines its point set with an angle filter
//! and fits the final ellipse.

use crate::config::DetectionConfig;
use crate::constants::{ANGLE_SPACING_DIVISOR, DILATE_ITERATIONS, DILATE_KERNEL_SIZE, ELLIPSE_BAND_THICK, ELLIPSE_BAND_THIN, MIN_ELLIPSE_POINTS};
use crate::Result;
use log::trace;
use opencv::core::{self, no_array, Mat, Point, Point2f, Rect, Scalar, Size, Size2f, Vector, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;

/// Best-fit pupil ellipse in search-region coordinates
#[derive(Debug, Clone, Copy)]
pub struct PupilEllipse {
    /// Ellipse center
    pub center: Point2f,
    /// Full axis lengths (major/minor in either order, as fitted)
    pub axes: Size2f,
    /// Rotation angle in degrees
    pub angle: f32,
}

impl PupilEllipse {
    /// Mean of the two axis lengths, the reported raw diameter
    #[must_use]
    pub fn diameter_px(&self) -> f64 {
        f64::from(self.axes.width + self.axes.height) / 2.0
    }
}

/// Outcome of a single-frame pupil search
///
/// `NotFound` is the normal miss (blink, occlusion); `InvalidFrame` marks a
/// region the pipeline could not search at all and the frame must be skipped.
#[derive(Debug, Clone, Copy)]
pub enum Detection {
    /// A supported ellipse was found
    Detected(PupilEllipse),
    /// No candidate survived filtering and scoring
    NotFound,
    /// The search region was empty or too small to process
    InvalidFrame,
}

impl Detection {
    /// True when a pupil was located
    #[must_use]
    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }
}

/// Pupil locator over a color search region
pub struct PupilDetector {
    config: DetectionConfig,
}

impl PupilDetector {
    /// Create a detector with the given parameters
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Search a color region for the best-supported pupil ellipse.
    pub fn detect(&self, region: &Mat) -> Result<Detection> {
        let margin = self.config.seed_border_margin;
        if region.empty() || region.cols() <= 2 * margin + 1 || region.rows() <= 2 * margin + 1 {
            return Ok(Detection::InvalidFrame);
        }

        let mut gray = Mat::default();
        imgproc::cvt_color(region, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let seed = self.darkest_region_seed(&gray)?;
        let seed_value = f64::from(*gray.at_2d::<u8>(seed.y, seed.x)?);

        // Relaxed thresholds first so ties keep the most relaxed candidate
        let mut best: Option<(f64, Vector<Point>)> = None;
        for &offset in self.config.threshold_offsets.iter().rev() {
            let mask = self.binary_mask(&gray, seed, seed_value + f64::from(offset))?;
            let dilated = dilate_mask(&mask)?;

            let mut contours: Vector<Vector<Point>> = Vector::new();
            imgproc::find_contours(
                &dilated,
                &mut contours,
                imgproc::RETR_EXTERNAL,
                imgproc::CHAIN_APPROX_SIMPLE,
                Point::new(0, 0),
            )?;

            let Some(contour) = self.largest_plausible_contour(&contours)? else {
                continue;
            };
            if contour.len() < MIN_ELLIPSE_POINTS {
                continue;
            }

            let score = score_candidate(&dilated, &contour)?;
            if score > 0.0 && best.as_ref().map_or(true, |(b, _)| score > *b) {
                best = Some((score, contour));
            }
        }

        let Some((score, contour)) = best else {
            return Ok(Detection::NotFound);
        };
        trace!("winning candidate score {score:.3} with {} points", contour.len());

        let refined = refine_contour_by_angle(&contour, self.config.angle_filter_degrees);
        if refined.len() < MIN_ELLIPSE_POINTS {
            return Ok(Detection::NotFound);
        }

        // A degenerate point set can still fail the fit; treat that as a miss
        let Ok(ellipse) = imgproc::fit_ellipse(&refined) else {
            return Ok(Detection::NotFound);
        };

        Ok(Detection::Detected(PupilEllipse {
            center: ellipse.center(),
            axes: ellipse.size(),
            angle: ellipse.angle(),
        }))
    }

    /// Seed location: global minimum of a local-average intensity map,
    /// ignoring a border margin.
    fn darkest_region_seed(&self, gray: &Mat) -> Result<Point> {
        let box_size = self.config.seed_box_size;
        let mut averaged = Mat::default();
        imgproc::box_filter(
            gray,
            &mut averaged,
            -1,
            Size::new(box_size, box_size),
            Point::new(-1, -1),
            true,
            core::BORDER_DEFAULT,
        )?;

        let margin = self.config.seed_border_margin;
        let mut mask = Mat::zeros(gray.rows(), gray.cols(), CV_8UC1)?.to_mat()?;
        let inner = Rect::new(margin, margin, gray.cols() - 2 * margin, gray.rows() - 2 * margin);
        let mut inner_view = Mat::roi_mut(&mut mask, inner)?;
        inner_view.set_to(&Scalar::all(255.0), &no_array())?;

        let mut min_loc = Point::default();
        core::min_max_loc(&averaged, None, None, Some(&mut min_loc), None, &mask)?;
        Ok(min_loc)
    }

    /// Inverted binary threshold limited to a fixed square around the seed.
    fn binary_mask(&self, gray: &Mat, seed: Point, threshold: f64) -> Result<Mat> {
        let mut binary = Mat::default();
        imgproc::threshold(gray, &mut binary, threshold, 255.0, imgproc::THRESH_BINARY_INV)?;

        let half = self.config.search_mask_size / 2;
        let x0 = (seed.x - half).max(0);
        let y0 = (seed.y - half).max(0);
        let x1 = (seed.x + half).min(gray.cols());
        let y1 = (seed.y + half).min(gray.rows());

        let mut keep = Mat::zeros(gray.rows(), gray.cols(), CV_8UC1)?.to_mat()?;
        if x1 > x0 && y1 > y0 {
            let mut view = Mat::roi_mut(&mut keep, Rect::new(x0, y0, x1 - x0, y1 - y0))?;
            view.set_to(&Scalar::all(255.0), &no_array())?;
        }

        let mut masked = Mat::default();
        core::bitwise_and(&binary, &keep, &mut masked, &no_array())?;
        Ok(masked)
    }

    /// Largest contour passing the area and aspect-ratio plausibility gates.
    fn largest_plausible_contour(&self, contours: &Vector<Vector<Point>>) -> Result<Option<Vector<Point>>> {
        let mut best: Option<(f64, Vector<Point>)> = None;
        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)?;
            if area < self.config.min_contour_area {
                continue;
            }

            let bbox = imgproc::bounding_rect(&contour)?;
            if bbox.width == 0 || bbox.height == 0 {
                continue;
            }
            let long = f64::from(bbox.width.max(bbox.height));
            let short = f64::from(bbox.width.min(bbox.height));
            if long / short > self.config.max_aspect_ratio {
                continue;
            }

            if best.as_ref().map_or(true, |(a, _)| area > *a) {
                best = Some((area, contour));
            }
        }
        Ok(best.map(|(_, contour)| contour))
    }
}

/// Bridge small gaps in a binary mask before contour extraction.
fn dilate_mask(mask: &Mat) -> Result<Mat> {
    let kernel = Mat::ones(DILATE_KERNEL_SIZE, DILATE_KERNEL_SIZE, CV_8UC1)?.to_mat()?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        mask,
        &mut dilated,
        &kernel,
        Point::new(-1, -1),
        DILATE_ITERATIONS,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    Ok(dilated)
}

/// Goodness of a candidate contour against the binary mask it came from.
///
/// Combines how well the fitted ellipse's filled area matches mask
/// foreground with how much of the contour outline hugs a thick band around
/// the ellipse: `coverage * band_hits^2 * band_ratio`. A thin-band ratio is
/// traced as secondary evidence but carries no weight.
fn score_candidate(mask: &Mat, contour: &Vector<Point>) -> Result<f64> {
    if contour.len() < MIN_ELLIPSE_POINTS {
        return Ok(0.0);
    }
    let Ok(ellipse) = imgproc::fit_ellipse(contour) else {
        return Ok(0.0);
    };

    let rows = mask.rows();
    let cols = mask.cols();
    let center = Point::new(ellipse.center().x.round() as i32, ellipse.center().y.round() as i32);
    let half_axes = Size::new(
        (ellipse.size().width / 2.0).round() as i32,
        (ellipse.size().height / 2.0).round() as i32,
    );
    let angle = f64::from(ellipse.angle());

    // Filled-area coverage
    let mut filled = Mat::zeros(rows, cols, CV_8UC1)?.to_mat()?;
    imgproc::ellipse(
        &mut filled,
        center,
        half_axes,
        angle,
        0.0,
        360.0,
        Scalar::all(255.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    let ellipse_area = core::count_non_zero(&filled)?;
    if ellipse_area == 0 {
        return Ok(0.0);
    }
    let mut fill_overlap = Mat::default();
    core::bitwise_and(mask, &filled, &mut fill_overlap, &no_array())?;
    let coverage = f64::from(core::count_non_zero(&fill_overlap)?) / f64::from(ellipse_area);

    // Border agreement between the contour outline and ellipse bands
    let mut outline = Mat::zeros(rows, cols, CV_8UC1)?.to_mat()?;
    let outline_list: Vector<Vector<Point>> = Vector::from_iter([contour.clone()]);
    imgproc::draw_contours(
        &mut outline,
        &outline_list,
        -1,
        Scalar::all(255.0),
        1,
        imgproc::LINE_8,
        &no_array(),
        i32::MAX,
        Point::new(0, 0),
    )?;
    let outline_total = core::count_non_zero(&outline)?;
    if outline_total == 0 {
        return Ok(0.0);
    }

    let band_hits = band_overlap(&outline, center, half_axes, angle, ELLIPSE_BAND_THICK, rows, cols)?;
    let band_ratio = f64::from(band_hits) / f64::from(outline_total);

    let thin_hits = band_overlap(&outline, center, half_axes, angle, ELLIPSE_BAND_THIN, rows, cols)?;
    trace!(
        "candidate coverage {coverage:.3}, band hits {band_hits}, thin ratio {:.3}",
        f64::from(thin_hits) / f64::from(outline_total)
    );

    Ok(coverage * f64::from(band_hits).powi(2) * band_ratio)
}

/// Count outline pixels inside a band of the given thickness around the ellipse.
fn band_overlap(
    outline: &Mat,
    center: Point,
    half_axes: Size,
    angle: f64,
    thickness: i32,
    rows: i32,
    cols: i32,
) -> Result<i32> {
    let mut band = Mat::zeros(rows, cols, CV_8UC1)?.to_mat()?;
    imgproc::ellipse(
        &mut band,
        center,
        half_axes,
        angle,
        0.0,
        360.0,
        Scalar::all(255.0),
        thickness,
        imgproc::LINE_8,
        0,
    )?;
    let mut overlap = Mat::default();
    core::bitwise_and(outline, &band, &mut overlap, &no_array())?;
    Ok(core::count_non_zero(&overlap)?)
}

/// Drop contour points along sharp concavities before the final fit.
///
/// For each point, the vectors to neighbors `spacing` indices away (wrapping
/// at the ends) define a bisector; the point survives only when the
/// direction toward the contour centroid lies within `max_angle_degrees` of
/// that bisector.
fn refine_contour_by_angle(contour: &Vector<Point>, max_angle_degrees: f64) -> Vector<Point> {
    let points = contour.to_vec();
    let n = points.len();
    if n < MIN_ELLIPSE_POINTS {
        return contour.clone();
    }

    let spacing = (n / ANGLE_SPACING_DIVISOR).max(1);
    let cos_threshold = max_angle_degrees.to_radians().cos();

    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0_f64, 0.0_f64), |(sx, sy), p| (sx + f64::from(p.x), sy + f64::from(p.y)));
    let centroid = (sum_x / n as f64, sum_y / n as f64);

    let mut kept: Vector<Point> = Vector::new();
    for (i, current) in points.iter().enumerate() {
        let prev = if i >= spacing { points[i - spacing] } else { points[n - spacing] };
        let next = if i + spacing < n { points[i + spacing] } else { points[spacing] };

        let v1 = (f64::from(prev.x - current.x), f64::from(prev.y - current.y));
        let v2 = (f64::from(next.x - current.x), f64::from(next.y - current.y));
        let bisector = ((v1.0 + v2.0) / 2.0, (v1.1 + v2.1) / 2.0);
        let to_centroid = (centroid.0 - f64::from(current.x), centroid.1 - f64::from(current.y));

        let bisector_norm = (bisector.0 * bisector.0 + bisector.1 * bisector.1).sqrt();
        let centroid_norm = (to_centroid.0 * to_centroid.0 + to_centroid.1 * to_centroid.1).sqrt();
        if bisector_norm == 0.0 || centroid_norm == 0.0 {
            continue;
        }

        let cos_angle = (bisector.0 * to_centroid.0 + bisector.1 * to_centroid.1) / (bisector_norm * centroid_norm);
        if cos_angle >= cos_threshold {
            kept.push(*current);
        }
    }
    kept
}
