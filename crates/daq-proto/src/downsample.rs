//! Server-side frame downsampling for reduced bandwidth streaming.
//!
//! Provides 2x2 and 4x4 pixel averaging for preview and fast streaming modes.
//! These functions are designed for 16-bit camera data (little-endian u16 pixels).
//!
//! For odd dimensions, the last row/column is cropped (not padded) to preserve
//! scientific data integrity and ensure bandwidth savings are always achieved.

/// Downsample a frame by averaging 2x2 blocks of pixels.
///
/// Reduces frame size by 4x (2x in each dimension).
/// Input must be 16-bit little-endian pixel data.
///
/// For odd dimensions, the last row/column is cropped to ensure downsampling
/// always occurs. This preserves scientific data integrity (no synthetic padding).
///
/// # Arguments
/// * `data` - Raw pixel data (u16 little-endian)
/// * `width` - Original frame width in pixels
/// * `height` - Original frame height in pixels
///
/// # Returns
/// Tuple of (downsampled data, new width, new height)
///
/// Returns original data unchanged only if:
/// - Usable dimensions are less than 2x2 (too small to downsample)
/// - Data size doesn't match expected size for the original dimensions
pub fn downsample_2x2(data: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    // Calculate usable dimensions (floor to nearest multiple of 2)
    let usable_width = (width / 2) * 2;
    let usable_height = (height / 2) * 2;

    // If dimensions too small to downsample, return original
    if usable_width < 2 || usable_height < 2 {
        return (data.to_vec(), width, height);
    }

    // Validate data size for ORIGINAL dimensions (return original if mismatch)
    let expected_size = (width as usize) * (height as usize) * 2;
    if data.len() != expected_size {
        return (data.to_vec(), width, height);
    }

    let new_width = usable_width / 2;
    let new_height = usable_height / 2;
    let mut out = Vec::with_capacity((new_width * new_height * 2) as usize);

    // Average 2x2 blocks of u16 pixels (using only usable portion, cropping last row/col if odd)
    for y in (0..usable_height).step_by(2) {
        for x in (0..usable_width).step_by(2) {
            // Use ORIGINAL width for index calculation to correctly address pixels
            let idx = |px: u32, py: u32| ((py * width + px) * 2) as usize;

            let i00 = idx(x, y);
            let i01 = idx(x + 1, y);
            let i10 = idx(x, y + 1);
            let i11 = idx(x + 1, y + 1);

            // Read 4 pixels as u16 little-endian
            let p00 = u16::from_le_bytes([data[i00], data[i00 + 1]]);
            let p01 = u16::from_le_bytes([data[i01], data[i01 + 1]]);
            let p10 = u16::from_le_bytes([data[i10], data[i10 + 1]]);
            let p11 = u16::from_le_bytes([data[i11], data[i11 + 1]]);

            // Average the 4 pixels
            let avg = ((p00 as u32 + p01 as u32 + p10 as u32 + p11 as u32) / 4) as u16;
            out.extend_from_slice(&avg.to_le_bytes());
        }
    }

    (out, new_width, new_height)
}

/// Downsample a frame by averaging 4x4 blocks of pixels.
///
/// Reduces frame size by 16x (4x in each dimension).
/// Input must be 16-bit little-endian pixel data.
///
/// For dimensions not divisible by 4, the remainder rows/columns are cropped
/// to ensure downsampling always occurs. This preserves scientific data integrity.
///
/// # Arguments
/// * `data` - Raw pixel data (u16 little-endian)
/// * `width` - Original frame width in pixels
/// * `height` - Original frame height in pixels
///
/// # Returns
/// Tuple of (downsampled data, new width, new height)
///
/// Returns original data unchanged only if:
/// - Usable dimensions are less than 4x4 (too small to downsample)
/// - Data size doesn't match expected size for the original dimensions
pub fn downsample_4x4(data: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    // Calculate usable dimensions (floor to nearest multiple of 4)
    let usable_width = (width / 4) * 4;
    let usable_height = (height / 4) * 4;

    // If dimensions too small to downsample, return original
    if usable_width < 4 || usable_height < 4 {
        return (data.to_vec(), width, height);
    }

    // Validate data size for ORIGINAL dimensions (return original if mismatch)
    let expected_size = (width as usize) * (height as usize) * 2;
    if data.len() != expected_size {
        return (data.to_vec(), width, height);
    }

    let new_width = usable_width / 4;
    let new_height = usable_height / 4;
    let mut out = Vec::with_capacity((new_width * new_height * 2) as usize);

    // Average 4x4 blocks of u16 pixels (using only usable portion, cropping remainder if not divisible by 4)
    for y in (0..usable_height).step_by(4) {
        for x in (0..usable_width).step_by(4) {
            // Use ORIGINAL width for index calculation to correctly address pixels
            let idx = |px: u32, py: u32| ((py * width + px) * 2) as usize;

            // Sum all 16 pixels in the 4x4 block
            let mut sum: u32 = 0;
            for dy in 0..4 {
                for dx in 0..4 {
                    let i = idx(x + dx, y + dy);
                    let pixel = u16::from_le_bytes([data[i], data[i + 1]]);
                    sum += pixel as u32;
                }
            }

            // Average (divide by 16)
            let avg = (sum / 16) as u16;
            out.extend_from_slice(&avg.to_le_bytes());
        }
    }

    (out, new_width, new_height)
}
