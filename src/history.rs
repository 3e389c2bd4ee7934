//! Session history and the interpolated statistical report.

use crate::constants::NO_DETECTION_MM;
use serde::Serialize;

/// Number of samples averaged for the start/end comparison
const COMPARISON_WINDOW: usize = 10;

/// One measurement appended per non-paused processed frame
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistorySample {
    pub index: usize,
    pub raw_mm: f64,
    pub filtered_mm: f64,
    pub filtered_px: f64,
}

/// Summary statistics over the (interpolated) session
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReportStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
    pub blinks: u32,
}

/// Mean diameter over the first and last valid samples, and their delta
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StartEndComparison {
    pub start_mm: f64,
    pub end_mm: f64,
    pub delta_mm: f64,
}

/// Full-session report payload
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub indices: Vec<usize>,
    pub raw_mm: Vec<f64>,
    pub px: Vec<f64>,
    pub interp_mm: Vec<f64>,
    pub interp_px: Vec<f64>,
    pub stats: ReportStats,
    pub comparison: StartEndComparison,
}

/// One row of the tabular export
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExportRow {
    pub index: usize,
    pub raw_mm: f64,
    pub interp_mm: f64,
    pub px: f64,
}

/// Ordered per-frame measurement history
///
/// Appended only by the frame loop; never reordered or truncated except by a
/// full reset. The statistical report is meaningful by convention once the
/// session has ended, but any call returns a snapshot of the history so far.
#[derive(Default)]
pub struct History {
    samples: Vec<HistorySample>,
}

impl History {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one processed-frame measurement
    pub fn push(&mut self, raw_mm: f64, filtered_mm: f64, filtered_px: f64) {
        let index = self.samples.len();
        self.samples.push(HistorySample {
            index,
            raw_mm,
            filtered_mm,
            filtered_px,
        });
    }

    /// Number of recorded samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples have been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recorded samples in frame order
    #[must_use]
    pub fn samples(&self) -> &[HistorySample] {
        &self.samples
    }

    /// Drop every sample (session reset)
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Build the interpolated statistical report.
    ///
    /// Samples with `raw_mm` above the no-detection floor are valid; gaps are
    /// filled by linear interpolation between the nearest valid neighbors,
    /// clamped flat outside the valid range. With no valid sample at all the
    /// statistics are all zero.
    #[must_use]
    pub fn build_report(&self, blinks: u32, pixels_per_mm: f64) -> SessionReport {
        let indices: Vec<usize> = self.samples.iter().map(|s| s.index).collect();
        let raw_mm: Vec<f64> = self.samples.iter().map(|s| s.raw_mm).collect();
        let px: Vec<f64> = self.samples.iter().map(|s| s.filtered_px).collect();

        let valid: Vec<bool> = raw_mm.iter().map(|&v| v > NO_DETECTION_MM).collect();
        let valid_values: Vec<f64> = raw_mm
            .iter()
            .zip(&valid)
            .filter_map(|(&v, &ok)| ok.then_some(v))
            .collect();

        if valid_values.is_empty() {
            return SessionReport {
                interp_mm: vec![0.0; raw_mm.len()],
                interp_px: vec![0.0; raw_mm.len()],
                indices,
                raw_mm,
                px,
                stats: ReportStats::default(),
                comparison: StartEndComparison::default(),
            };
        }

        let interp_mm = interpolate_gaps(&raw_mm, &valid);
        let interp_px: Vec<f64> = interp_mm.iter().map(|v| v * pixels_per_mm).collect();

        let avg = interp_mm.iter().sum::<f64>() / interp_mm.len() as f64;
        let max = interp_mm.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = valid_values.iter().copied().fold(f64::INFINITY, f64::min);

        let start_window = &valid_values[..valid_values.len().min(COMPARISON_WINDOW)];
        let end_window = &valid_values[valid_values.len().saturating_sub(COMPARISON_WINDOW)..];
        let start_mm = mean(start_window);
        let end_mm = mean(end_window);

        SessionReport {
            stats: ReportStats {
                avg,
                max,
                min,
                count: interp_mm.len(),
                blinks,
            },
            comparison: StartEndComparison {
                start_mm,
                end_mm,
                delta_mm: end_mm - start_mm,
            },
            indices,
            raw_mm,
            px,
            interp_mm,
            interp_px,
        }
    }

    /// Rows for the tabular export, using the interpolated sequence
    #[must_use]
    pub fn export_rows(&self, blinks: u32, pixels_per_mm: f64) -> Vec<ExportRow> {
        let report = self.build_report(blinks, pixels_per_mm);
        report
            .indices
            .iter()
            .enumerate()
            .map(|(i, &index)| ExportRow {
                index,
                raw_mm: report.raw_mm[i],
                interp_mm: report.interp_mm[i],
                px: report.px[i],
            })
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation across invalid indices, flat beyond the valid range.
fn interpolate_gaps(values: &[f64], valid: &[bool]) -> Vec<f64> {
    let valid_indices: Vec<usize> = valid
        .iter()
        .enumerate()
        .filter_map(|(i, &ok)| ok.then_some(i))
        .collect();

    let first = valid_indices[0];
    let last = valid_indices[valid_indices.len() - 1];

    let mut out = Vec::with_capacity(values.len());
    let mut upper = 0;
    for i in 0..values.len() {
        if valid[i] {
            out.push(values[i]);
            continue;
        }
        if i < first {
            out.push(values[first]);
            continue;
        }
        if i > last {
            out.push(values[last]);
            continue;
        }
        while valid_indices[upper] < i {
            upper += 1;
        }
        let hi = valid_indices[upper];
        let lo = valid_indices[upper - 1];
        let t = (i - lo) as f64 / (hi - lo) as f64;
        out.push(values[lo] + t * (values[hi] - values[lo]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history_from(raw: &[f64]) -> History {
        let mut history = History::new();
        for &raw_mm in raw {
            history.push(raw_mm, raw_mm, raw_mm * 18.0);
        }
        history
    }

    #[test]
    fn test_interpolation_fills_gap() {
        let history = history_from(&[2.0, 0.0, 0.0, 2.4]);
        let report = history.build_report(1, 18.0);

        assert!((report.interp_mm[0] - 2.0).abs() < 1e-9);
        assert!((report.interp_mm[1] - (2.0 + 0.4 / 3.0)).abs() < 1e-9);
        assert!((report.interp_mm[2] - (2.0 + 0.8 / 3.0)).abs() < 1e-9);
        assert!((report.interp_mm[3] - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_flat_extrapolation_at_edges() {
        let history = history_from(&[0.0, 3.0, 0.0, 4.0, 0.0]);
        let report = history.build_report(0, 18.0);

        assert!((report.interp_mm[0] - 3.0).abs() < 1e-9);
        assert!((report.interp_mm[2] - 3.5).abs() < 1e-9);
        assert!((report.interp_mm[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_over_interpolated_data() {
        let history = history_from(&[2.0, 0.0, 0.0, 2.4]);
        let report = history.build_report(1, 18.0);

        assert_eq!(report.stats.count, 4);
        assert_eq!(report.stats.blinks, 1);
        assert!((report.stats.min - 2.0).abs() < 1e-9);
        assert!((report.stats.max - 2.4).abs() < 1e-9);
        let expected_avg = (2.0 + (2.0 + 0.4 / 3.0) + (2.0 + 0.8 / 3.0) + 2.4) / 4.0;
        assert!((report.stats.avg - expected_avg).abs() < 1e-9);
        assert!((report.interp_px[3] - 2.4 * 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_valid_samples_reports_zero() {
        let history = history_from(&[0.0, 0.0, 0.0]);
        let report = history.build_report(2, 18.0);

        assert_eq!(report.stats.count, 0);
        assert!((report.stats.avg - 0.0).abs() < 1e-9);
        assert!((report.stats.max - 0.0).abs() < 1e-9);
        assert!((report.stats.min - 0.0).abs() < 1e-9);
        assert_eq!(report.interp_mm, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_start_end_comparison() {
        let raw: Vec<f64> = (0..30).map(|i| 2.0 + 0.1 * f64::from(i)).collect();
        let history = history_from(&raw);
        let report = history.build_report(0, 18.0);

        let start: f64 = raw[..10].iter().sum::<f64>() / 10.0;
        let end: f64 = raw[20..].iter().sum::<f64>() / 10.0;
        assert!((report.comparison.start_mm - start).abs() < 1e-9);
        assert!((report.comparison.end_mm - end).abs() < 1e-9);
        assert!((report.comparison.delta_mm - (end - start)).abs() < 1e-9);
    }

    #[test]
    fn test_export_rows_align_with_report() {
        let history = history_from(&[2.0, 0.0, 2.4]);
        let rows = history.export_rows(1, 18.0);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].index, 1);
        assert!((rows[1].interp_mm - 2.2).abs() < 1e-9);
        assert!((rows[2].raw_mm - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut history = history_from(&[2.0, 2.1]);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.build_report(0, 18.0).stats.count, 0);
    }

    proptest! {
        #[test]
        fn prop_interpolation_bounded_by_valid_extremes(
            raw in prop::collection::vec(0.0f64..8.0, 1..200)
        ) {
            let history = history_from(&raw);
            let report = history.build_report(0, 18.0);
            let valid: Vec<f64> = raw.iter().copied().filter(|&v| v > 0.1).collect();
            if valid.is_empty() {
                prop_assert_eq!(report.stats.count, 0);
            } else {
                let lo = valid.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                for &v in &report.interp_mm {
                    prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
                }
            }
        }
    }
}
