//! Core data types: regions of interest, repetitions, pixel sizes and the
//! N-dimensional buffer with attached metadata produced by detectors and
//! consumed by the assembler.

use ndarray::ArrayD;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Region of interest expressed as four ratios `(l, t, r, b)` in `[0, 1]`
/// over the emitter field. `Roi::UNDEFINED` means "no acquisition".
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Roi {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Roi {
    /// Sentinel meaning "no acquisition"; callers must check `is_defined`
    /// before passing a Roi into the grid generator.
    pub const UNDEFINED: Roi = Roi {
        left: f64::NEG_INFINITY,
        top: f64::NEG_INFINITY,
        right: f64::NEG_INFINITY,
        bottom: f64::NEG_INFINITY,
    };

    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_defined(&self) -> bool {
        *self != Self::UNDEFINED
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Grid dimensions `(rep_x, rep_y)`, both positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Repetition {
    pub rep_x: u32,
    pub rep_y: u32,
}

impl Repetition {
    pub fn new(rep_x: u32, rep_y: u32) -> Self {
        Self { rep_x, rep_y }
    }

    pub fn total(&self) -> usize {
        self.rep_x as usize * self.rep_y as usize
    }
}

/// Pixel size `(px, py)` in meters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
}

impl PixelSize {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Derive the pixel size from ROI and emitter field-of-view, never from
    /// a hardware-reported value (spec §4.7: "Pixel-size is re-derived from
    /// ROI/emitter, not from the hardware-reported value").
    pub fn from_roi(roi: Roi, rep: Repetition, emitter_fov: (f64, f64)) -> Self {
        Self {
            x: roi.width() * emitter_fov.0 / rep.rep_x as f64,
            y: roi.height() * emitter_fov.1 / rep.rep_y as f64,
        }
    }
}

/// A position in meters, `(x, y)`.
pub type Position = (f64, f64);

/// Seconds since the Unix epoch, used for `acquisition-date` metadata
/// stamping and stale-data comparisons.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Well-known metadata keys, matching the vocabulary in spec §3.
pub mod meta_keys {
    pub const POSITION: &str = "position";
    pub const PIXEL_SIZE: &str = "pixel-size";
    pub const ACQUISITION_DATE: &str = "acquisition-date";
    pub const EXPOSURE_TIME: &str = "exposure-time";
    pub const DWELL_TIME: &str = "dwell-time";
    pub const DESCRIPTION: &str = "description";
    pub const ANCHOR_DATE_LIST: &str = "anchor-date-list";
}

/// N-D numeric buffer with attached key/value metadata. Created by a
/// detector (one per pixel, tile, or frame) and later owned by the
/// assembler, which concatenates per-pixel `DataArray`s into the final
/// per-channel image.
#[derive(Debug, Clone)]
pub struct DataArray {
    pub values: ArrayD<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DataArray {
    pub fn new(values: ArrayD<f64>) -> Self {
        Self {
            values,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn position(&self) -> Option<Position> {
        let v = self.metadata.get(meta_keys::POSITION)?;
        let arr = v.as_array()?;
        Some((arr.first()?.as_f64()?, arr.get(1)?.as_f64()?))
    }

    pub fn set_position(&mut self, pos: Position) {
        self.metadata.insert(
            meta_keys::POSITION.to_string(),
            serde_json::json!([pos.0, pos.1]),
        );
    }

    pub fn pixel_size(&self) -> Option<PixelSize> {
        let v = self.metadata.get(meta_keys::PIXEL_SIZE)?;
        let arr = v.as_array()?;
        Some(PixelSize::new(
            arr.first()?.as_f64()?,
            arr.get(1)?.as_f64()?,
        ))
    }

    pub fn set_pixel_size(&mut self, px: PixelSize) {
        self.metadata.insert(
            meta_keys::PIXEL_SIZE.to_string(),
            serde_json::json!([px.x, px.y]),
        );
    }

    pub fn acquisition_date(&self) -> Option<f64> {
        self.metadata
            .get(meta_keys::ACQUISITION_DATE)
            .and_then(|v| v.as_f64())
    }

    pub fn set_acquisition_date(&mut self, date: f64) {
        self.metadata.insert(
            meta_keys::ACQUISITION_DATE.to_string(),
            serde_json::json!(date),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn pixel_size_derived_from_roi_matches_expected_ratio() {
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let rep = Repetition::new(2, 2);
        let px = PixelSize::from_roi(roi, rep, (10e-6, 10e-6));
        assert!((px.x - 5e-6).abs() < 1e-12);
        assert!((px.y - 5e-6).abs() < 1e-12);
    }

    #[test]
    fn position_round_trips_through_metadata() {
        let mut arr = DataArray::new(ArrayD::zeros(IxDyn(&[1])));
        arr.set_position((1.5e-6, -2.5e-6));
        let pos = arr.position().unwrap();
        assert!((pos.0 - 1.5e-6).abs() < 1e-15);
        assert!((pos.1 + 2.5e-6).abs() < 1e-15);
    }

    #[test]
    fn undefined_roi_is_not_defined() {
        assert!(!Roi::UNDEFINED.is_defined());
        assert!(Roi::new(0.0, 0.0, 1.0, 1.0).is_defined());
    }
}
