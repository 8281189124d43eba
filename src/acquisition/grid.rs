//! Grid Generator — produces beam-translation grids and stage-position
//! grids from a region-of-interest, repetition, and emitter geometry
//! (spec §4.1).

use crate::acquisition::data::{Repetition, Roi};
use crate::acquisition::error::{AcqError, AcqResult};
use ndarray::Array3;
use std::collections::HashMap;

/// `ry × rx × 2` array of emitter translations (fractional pixel offsets
/// from emitter center), Y as the slow axis and X as the fast axis so grid
/// index order matches scan order.
pub fn beam_grid(roi: Roi, rep: Repetition, shape: (u32, u32)) -> Array3<f64> {
    let (rx, ry) = (rep.rep_x as usize, rep.rep_y as usize);
    let (sx, sy) = (shape.0 as f64, shape.1 as f64);
    let w = roi.width() / rep.rep_x as f64;
    let h = roi.height() / rep.rep_y as f64;

    let mut grid = Array3::<f64>::zeros((ry, rx, 2));
    for iy in 0..ry {
        // Half-pixel inset so samples land on pixel centers.
        let v = roi.top + h * (iy as f64 + 0.5);
        let ty = sy * (v - 0.5);
        for ix in 0..rx {
            let u = roi.left + w * (ix as f64 + 0.5);
            let tx = sx * (u - 0.5);
            grid[[iy, ix, 0]] = tx;
            grid[[iy, ix, 1]] = ty;
        }
    }
    grid
}

/// Read the beam translation for grid index `(iy, ix)`.
pub fn beam_grid_at(grid: &Array3<f64>, iy: usize, ix: usize) -> (f64, f64) {
    (grid[[iy, ix, 0]], grid[[iy, ix, 1]])
}

/// `rep_x × rep_y × 2` array of absolute stage positions in meters (note
/// the axis order is transposed relative to `beam_grid`, matching the data
/// model table in spec §3). The Y axis is inverted with respect to ROI
/// (image-Y grows downward, stage-Y grows upward). Every target is checked
/// against `axis_ranges` before the grid is returned; an out-of-range
/// target fails the whole acquisition before any hardware is touched
/// (spec §4.1: "verify the full target box lies within each axis's valid
/// range; if not, fail with OutOfRange").
pub fn stage_grid(
    roi: Roi,
    rep: Repetition,
    fov: (f64, f64),
    stage_center: (f64, f64),
    axis_ranges: &HashMap<String, (f64, f64)>,
) -> AcqResult<Array3<f64>> {
    let (rx, ry) = (rep.rep_x as usize, rep.rep_y as usize);
    let (fov_x, fov_y) = fov;
    let w = roi.width() / rep.rep_x as f64;
    let h = roi.height() / rep.rep_y as f64;

    let mut grid = Array3::<f64>::zeros((rx, ry, 2));
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for ix in 0..rx {
        let u = roi.left + w * (ix as f64 + 0.5);
        let x = stage_center.0 + fov_x * (u - 0.5);
        for iy in 0..ry {
            let v = roi.top + h * (iy as f64 + 0.5);
            // Y inverted: image-Y grows downward, stage-Y grows upward.
            let y = stage_center.1 - fov_y * (v - 0.5);
            grid[[ix, iy, 0]] = x;
            grid[[ix, iy, 1]] = y;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if let Some(&(lo, hi)) = axis_ranges.get("x") {
        if min_x < lo || max_x > hi {
            return Err(AcqError::OutOfRange {
                what: "stage target x".into(),
                detail: format!("computed range [{min_x}, {max_x}] exceeds axis range [{lo}, {hi}]"),
            });
        }
    }
    if let Some(&(lo, hi)) = axis_ranges.get("y") {
        if min_y < lo || max_y > hi {
            return Err(AcqError::OutOfRange {
                what: "stage target y".into(),
                detail: format!("computed range [{min_y}, {max_y}] exceeds axis range [{lo}, {hi}]"),
            });
        }
    }

    Ok(grid)
}

/// Read the stage target for grid index `(iy, ix)` (beam-grid index order;
/// internally transposed to the array's `(x, y, 2)` layout).
pub fn stage_grid_at(grid: &Array3<f64>, iy: usize, ix: usize) -> (f64, f64) {
    (grid[[ix, iy, 0]], grid[[ix, iy, 1]])
}

/// Convert a linear pixel counter to `(y, x)` grid indices, row-major with
/// X as the fast axis (spec §5: "grid iteration is strict row-major with X
/// as the fast axis").
pub fn linear_to_yx(n: usize, rep: Repetition) -> (usize, usize) {
    let rx = rep.rep_x as usize;
    (n / rx, n % rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_grid_centered_roi_has_zero_center_translation() {
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let rep = Repetition::new(2, 2);
        let grid = beam_grid(roi, rep, (1000, 1000));
        // Corners should be symmetric about zero.
        let (tx00, ty00) = beam_grid_at(&grid, 0, 0);
        let (tx11, ty11) = beam_grid_at(&grid, 1, 1);
        assert!((tx00 + tx11).abs() < 1e-9);
        assert!((ty00 + ty11).abs() < 1e-9);
    }

    #[test]
    fn beam_grid_fast_axis_is_x() {
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let rep = Repetition::new(3, 2);
        let grid = beam_grid(roi, rep, (900, 900));
        assert_eq!(grid.shape(), &[2, 3, 2]);
    }

    #[test]
    fn stage_grid_rejects_out_of_range_target() {
        let roi = Roi::new(0.9, 0.9, 1.0, 1.0);
        let rep = Repetition::new(2, 2);
        let mut ranges = HashMap::new();
        ranges.insert("x".to_string(), (-5e-3, 5e-3));
        ranges.insert("y".to_string(), (-5e-3, 5e-3));
        let result = stage_grid(roi, rep, (1.0, 1.0), (0.0, 0.0), &ranges);
        assert!(matches!(result, Err(AcqError::OutOfRange { .. })));
    }

    #[test]
    fn stage_grid_y_axis_is_inverted_relative_to_roi() {
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let rep = Repetition::new(2, 2);
        let grid = stage_grid(roi, rep, (1.0, 1.0), (0.0, 0.0), &HashMap::new()).unwrap();
        let top = stage_grid_at(&grid, 0, 0).1;
        let bottom = stage_grid_at(&grid, 1, 0).1;
        assert!(top > bottom);
    }

    #[test]
    fn linear_to_yx_iterates_x_fastest() {
        let rep = Repetition::new(3, 2);
        assert_eq!(linear_to_yx(0, rep), (0, 0));
        assert_eq!(linear_to_yx(1, rep), (0, 1));
        assert_eq!(linear_to_yx(3, rep), (1, 0));
    }
}
