//! Assembler — stitches received per-pixel data into a 2-D, tiled 2-D,
//! 5-D spectral cube, or anchor stack `DataArray` with computed `position`
//! and `pixel-size` metadata (spec §2 item 6, §4.7).

use crate::acquisition::data::{meta_keys, DataArray, PixelSize, Position, Repetition, Roi};
use crate::acquisition::error::{AcqError, AcqResult};
use ndarray::{Array5, ArrayD, Axis, IxDyn};

/// Which assembly strategy to use for one detector channel, chosen from
/// the shape of its per-pixel `DataArray` (spec §9: "a controller generic
/// over an AssemblyStrategy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// At most one value per pixel.
    Flat,
    /// Each element is a `T x S` tile.
    Tiled,
    /// Each element is `(1, C)`, stacked along the spectral axis.
    SpectralCube,
    /// A list of 2-D anchor images, stacked along a new axis.
    Anchor,
}

/// Derive the image `position` and `pixel-size` from the *first* received
/// per-pixel `DataArray`, never from hardware-reported pixel sizes (spec
/// §3 invariants, §4.7 "Center/pixel-size rule").
///
/// The first sample's `position` is the top-left-pixel center (spec §4.7);
/// the assembled image center is then the top-left center shifted by
/// `((rep-1)/2) * (px, -py)` — Y inverted in meters — matching the
/// testable invariant in spec §8 ("Center-of-image rule").
fn image_center_and_pixel_size(
    first: &DataArray,
    rep: Repetition,
    roi: Roi,
    emitter_fov: (f64, f64),
    tile_shape: (usize, usize),
) -> AcqResult<(Position, PixelSize)> {
    let first_pos = first.position().ok_or_else(|| {
        AcqError::Validation("first pixel's DataArray has no position metadata".into())
    })?;

    let internal_px = PixelSize::from_roi(roi, rep, emitter_fov);
    let px = PixelSize::new(
        internal_px.x * tile_shape.1 as f64,
        internal_px.y * tile_shape.0 as f64,
    );

    if let Some(hw_px) = first.pixel_size() {
        let rel_x = ((hw_px.x - internal_px.x) / internal_px.x).abs();
        let rel_y = ((hw_px.y - internal_px.y) / internal_px.y).abs();
        if rel_x > 0.5 || rel_y > 0.5 {
            tracing::warn!(
                hw_x = hw_px.x,
                hw_y = hw_px.y,
                derived_x = internal_px.x,
                derived_y = internal_px.y,
                "hardware-reported pixel size differs wildly from ROI/emitter-derived value"
            );
        }
    }

    let center = (
        first_pos.0 + (rep.rep_x as f64 - 1.0) / 2.0 * px.x,
        first_pos.1 - (rep.rep_y as f64 - 1.0) / 2.0 * px.y,
    );

    Ok((center, px))
}

/// Assemble a flat 2-D image from `rep_y * rep_x` per-pixel samples, each
/// holding at most one value (spec §4.7 "Flat 2-D"). If the first element
/// is empty (degenerate detector), it is returned as-is.
pub fn assemble_flat(
    pixels: &[DataArray],
    rep: Repetition,
    roi: Roi,
    emitter_fov: (f64, f64),
    description: &str,
) -> AcqResult<DataArray> {
    let first = pixels
        .first()
        .ok_or_else(|| AcqError::Validation("assemble_flat called with no pixels".into()))?;

    if first.values.len() == 0 {
        return Ok(first.clone());
    }

    if pixels.len() != rep.total() {
        return Err(AcqError::Validation(format!(
            "expected {} pixels, received {}",
            rep.total(),
            pixels.len()
        )));
    }

    let mut flat = Vec::with_capacity(rep.total());
    for pixel in pixels {
        flat.push(*pixel.values.iter().next().unwrap_or(&0.0));
    }
    let values = ArrayD::from_shape_vec(IxDyn(&[rep.rep_y as usize, rep.rep_x as usize]), flat)
        .map_err(|e| AcqError::Validation(format!("flat reshape failed: {e}")))?;

    let (center, px) = image_center_and_pixel_size(first, rep, roi, emitter_fov, (1, 1))?;
    let mut out = DataArray::new(values);
    out.set_position(center);
    out.set_pixel_size(px);
    out = out.with_metadata(meta_keys::DESCRIPTION, description);
    Ok(out)
}

/// Assemble a tiled 2-D image from `rep_y * rep_x` per-pixel tiles, each
/// `T x S`, stacked `(Y, X, T, S)` then rearranged to `(Y*T, X*S)` (spec
/// §4.7 "Tiled 2-D").
pub fn assemble_tiled(
    pixels: &[DataArray],
    rep: Repetition,
    roi: Roi,
    emitter_fov: (f64, f64),
    description: &str,
) -> AcqResult<DataArray> {
    let first = pixels
        .first()
        .ok_or_else(|| AcqError::Validation("assemble_tiled called with no pixels".into()))?;
    if pixels.len() != rep.total() {
        return Err(AcqError::Validation(format!(
            "expected {} tiles, received {}",
            rep.total(),
            pixels.len()
        )));
    }
    let tile_shape = first.values.shape();
    if tile_shape.len() != 2 {
        return Err(AcqError::Validation(
            "tiled assembly requires 2-D per-pixel tiles".into(),
        ));
    }
    let (t, s) = (tile_shape[0], tile_shape[1]);
    let (ry, rx) = (rep.rep_y as usize, rep.rep_x as usize);

    let mut out_values = ArrayD::zeros(IxDyn(&[ry * t, rx * s]));
    for (idx, pixel) in pixels.iter().enumerate() {
        if pixel.values.shape() != [t, s] {
            return Err(AcqError::Validation(format!(
                "tile {idx} has mismatched shape {:?}, expected [{t}, {s}]",
                pixel.values.shape()
            )));
        }
        let iy = idx / rx;
        let ix = idx % rx;
        for ty in 0..t {
            for tx in 0..s {
                out_values[[iy * t + ty, ix * s + tx]] = pixel.values[[ty, tx]];
            }
        }
    }

    let (center, px) = image_center_and_pixel_size(first, rep, roi, emitter_fov, (t, s))?;
    let mut out = DataArray::new(out_values);
    out.set_position(center);
    out.set_pixel_size(px);
    out = out.with_metadata(meta_keys::DESCRIPTION, description);
    Ok(out)
}

/// Assemble a 5-D spectral cube `(C, 1, 1, ry, rx)` from `rep_y * rep_x`
/// per-pixel spectra, each `(1, C)` (spec §4.7 "Spectral cube"). Pixel-size
/// in the spatial dims is emitter-pixel times tile-shape, here `(1, 1)`
/// since each sample is a single spatial point.
pub fn assemble_spectral_cube(
    pixels: &[DataArray],
    rep: Repetition,
    roi: Roi,
    emitter_fov: (f64, f64),
    description: &str,
) -> AcqResult<DataArray> {
    let first = pixels.first().ok_or_else(|| {
        AcqError::Validation("assemble_spectral_cube called with no pixels".into())
    })?;
    if pixels.len() != rep.total() {
        return Err(AcqError::Validation(format!(
            "expected {} spectra, received {}",
            rep.total(),
            pixels.len()
        )));
    }
    let shape = first.values.shape();
    if shape.len() != 2 || shape[0] != 1 {
        return Err(AcqError::Validation(
            "spectral cube assembly requires (1, C) per-pixel spectra".into(),
        ));
    }
    let channels = shape[1];
    let (ry, rx) = (rep.rep_y as usize, rep.rep_x as usize);

    let mut cube = Array5::<f64>::zeros((channels, 1, 1, ry, rx));
    for (idx, pixel) in pixels.iter().enumerate() {
        if pixel.values.shape() != [1, channels] {
            return Err(AcqError::Validation(format!(
                "spectrum {idx} has mismatched channel count"
            )));
        }
        let iy = idx / rx;
        let ix = idx % rx;
        for c in 0..channels {
            cube[[c, 0, 0, iy, ix]] = pixel.values[[0, c]];
        }
    }

    let (center, px) = image_center_and_pixel_size(first, rep, roi, emitter_fov, (1, 1))?;
    let mut out = DataArray::new(cube.into_dyn());
    out.set_position(center);
    out.set_pixel_size(px);
    out = out.with_metadata(meta_keys::DESCRIPTION, description);
    Ok(out)
}

/// Assemble a list of 2-D anchor images into `(1, N, 1, H, W)`, with
/// `description="Anchor region"` and an `anchor-date-list` of each
/// anchor's acquisition date (spec §4.7 "Anchor stack").
pub fn assemble_anchor(anchors: &[DataArray]) -> AcqResult<DataArray> {
    let first = anchors
        .first()
        .ok_or_else(|| AcqError::Validation("assemble_anchor called with no anchors".into()))?;
    let shape = first.values.shape();
    if shape.len() != 2 {
        return Err(AcqError::Validation(
            "anchor assembly requires 2-D anchor images".into(),
        ));
    }
    let (h, w) = (shape[0], shape[1]);
    let n = anchors.len();

    let mut stack = Array5::<f64>::zeros((1, n, 1, h, w));
    let mut dates = Vec::with_capacity(n);
    for (idx, anchor) in anchors.iter().enumerate() {
        if anchor.values.shape() != [h, w] {
            return Err(AcqError::Validation(format!(
                "anchor {idx} has mismatched shape {:?}, expected [{h}, {w}]",
                anchor.values.shape()
            )));
        }
        for y in 0..h {
            for x in 0..w {
                stack[[0, idx, 0, y, x]] = anchor.values[[y, x]];
            }
        }
        dates.push(anchor.acquisition_date().unwrap_or(0.0));
    }

    let mut out = DataArray::new(stack.into_dyn());
    out = out.with_metadata(meta_keys::DESCRIPTION, "Anchor region");
    out = out.with_metadata(meta_keys::ANCHOR_DATE_LIST, serde_json::json!(dates));
    if let Some(pos) = first.position() {
        out.set_position(pos);
    }
    Ok(out)
}

/// Concatenate per-pixel samples along a leading axis without any spatial
/// reshaping (used for the `StreamAccumulator`'s already-accumulated
/// per-grid-pixel frames when callers want a raw passthrough).
pub fn concat_leading(pixels: Vec<DataArray>) -> AcqResult<DataArray> {
    let first = pixels
        .first()
        .ok_or_else(|| AcqError::Validation("concat_leading called with no pixels".into()))?;
    let views: Vec<_> = pixels.iter().map(|p| p.values.view().insert_axis(Axis(0))).collect();
    let values = ndarray::concatenate(Axis(0), &views)
        .map_err(|e| AcqError::Validation(format!("concat failed: {e}")))?;
    let mut out = DataArray::new(values);
    out.metadata = first.metadata.clone();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, ArrayD};

    fn make_flat_pixel(value: f64, pos: Position) -> DataArray {
        let mut arr = DataArray::new(arr0(value).into_dyn());
        arr.set_position(pos);
        arr.set_pixel_size(PixelSize::new(5e-6, 5e-6));
        arr
    }

    #[test]
    fn flat_assembly_preserves_row_major_ordering() {
        let rep = Repetition::new(2, 2);
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let pixels: Vec<DataArray> = (0..4)
            .map(|i| make_flat_pixel(i as f64, (0.0, 0.0)))
            .collect();
        let out = assemble_flat(&pixels, rep, roi, (10e-6, 10e-6), "test").unwrap();
        let values: Vec<f64> = out.values.iter().copied().collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn flat_assembly_pixel_size_matches_roi_over_rep() {
        let rep = Repetition::new(2, 2);
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let pixels: Vec<DataArray> = (0..4)
            .map(|i| make_flat_pixel(i as f64, (0.0, 0.0)))
            .collect();
        let out = assemble_flat(&pixels, rep, roi, (10e-6, 10e-6), "test").unwrap();
        let px = out.pixel_size().unwrap();
        assert!((px.x - 5e-6).abs() < 1e-12);
        assert!((px.y - 5e-6).abs() < 1e-12);
    }

    #[test]
    fn flat_assembly_center_of_image_rule_matches_spec() {
        let rep = Repetition::new(3, 3);
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let first_pos = (2.0e-6, 3.0e-6);
        let mut pixels: Vec<DataArray> = (0..9).map(|i| make_flat_pixel(i as f64, (0.0, 0.0))).collect();
        pixels[0].set_position(first_pos);
        let out = assemble_flat(&pixels, rep, roi, (30e-6, 30e-6), "test").unwrap();
        let px = out.pixel_size().unwrap();
        let center = out.position().unwrap();
        let expected = (
            first_pos.0 + (rep.rep_x as f64 - 1.0) / 2.0 * px.x,
            first_pos.1 - (rep.rep_y as f64 - 1.0) / 2.0 * px.y,
        );
        assert!((center.0 - expected.0).abs() < 1e-15);
        assert!((center.1 - expected.1).abs() < 1e-15);
    }

    #[test]
    fn flat_assembly_rejects_wrong_pixel_count() {
        let rep = Repetition::new(2, 2);
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let pixels: Vec<DataArray> = vec![make_flat_pixel(0.0, (0.0, 0.0))];
        let result = assemble_flat(&pixels, rep, roi, (10e-6, 10e-6), "test");
        assert!(result.is_err());
    }

    #[test]
    fn anchor_assembly_collects_dates_in_order() {
        let mut a1 = DataArray::new(ArrayD::zeros(IxDyn(&[2, 2])));
        a1.set_acquisition_date(1.0);
        let mut a2 = DataArray::new(ArrayD::zeros(IxDyn(&[2, 2])));
        a2.set_acquisition_date(2.0);
        let out = assemble_anchor(&[a1, a2]).unwrap();
        assert_eq!(out.values.shape(), &[1, 2, 1, 2, 2]);
        let dates = out.metadata.get(meta_keys::ANCHOR_DATE_LIST).unwrap();
        assert_eq!(dates, &serde_json::json!([1.0, 2.0]));
    }

    #[test]
    fn spectral_cube_reshapes_into_expected_axes() {
        let rep = Repetition::new(1, 1);
        let roi = Roi::new(0.0, 0.0, 1.0, 1.0);
        let mut spectrum = DataArray::new(
            ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
        );
        spectrum.set_position((0.0, 0.0));
        let out = assemble_spectral_cube(&[spectrum], rep, roi, (10e-6, 10e-6), "spectrum").unwrap();
        assert_eq!(out.values.shape(), &[4, 1, 1, 1, 1]);
    }
}
