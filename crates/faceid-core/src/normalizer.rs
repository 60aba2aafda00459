//! Probe/reference preprocessing for the siamese scorer.
//!
//! Every image is resized to a fixed 105x105 grid with bilinear
//! interpolation, then scaled from the 8-bit range into [0, 1].

use crate::raw_image::RawImage;
use ndarray::{Array3, ArrayView3};

// --- Named constants ---
/// Spatial edge length of the scorer's input.
pub const INPUT_SIZE: usize = 105;
/// Channels per pixel in the scorer's input (RGB).
pub const INPUT_CHANNELS: usize = 3;
const PIXEL_SCALE: f32 = 255.0;

/// A 105x105x3 (HWC, RGB) float tensor with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array3<f32>);

impl NormalizedTensor {
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Mean over all elements.
    #[cfg(test)]
    pub(crate) fn mean(&self) -> f32 {
        self.0.mean().unwrap_or(0.0)
    }
}

/// Source sample for one output coordinate: lower index, upper index, and
/// the weight of the upper one.
#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

/// Half-pixel-centred bilinear taps mapping `dst_len` outputs onto `src_len` inputs.
fn bilinear_taps(src_len: usize, dst_len: usize) -> Vec<Tap> {
    let inv_scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|i| {
            let src = ((i as f32 + 0.5) * inv_scale - 0.5).max(0.0);
            let lo = (src.floor() as usize).min(src_len - 1);
            let hi = (lo + 1).min(src_len - 1);
            let frac = (src - lo as f32).clamp(0.0, 1.0);
            Tap { lo, hi, frac }
        })
        .collect()
}

/// Resize to 105x105 and scale channels into [0, 1].
///
/// Non-uniform scaling is applied when the input is not square; no cropping
/// happens here. Blue-green-red input is reordered so the tensor is always RGB.
pub fn normalize(image: &RawImage) -> NormalizedTensor {
    let cols = bilinear_taps(image.width() as usize, INPUT_SIZE);
    let rows = bilinear_taps(image.height() as usize, INPUT_SIZE);

    let mut tensor = Array3::<f32>::zeros((INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS));

    for (y, row) in rows.iter().enumerate() {
        let fy = row.frac;
        for (x, col) in cols.iter().enumerate() {
            let fx = col.frac;

            let tl = image.pixel_rgb(col.lo, row.lo);
            let tr = image.pixel_rgb(col.hi, row.lo);
            let bl = image.pixel_rgb(col.lo, row.hi);
            let br = image.pixel_rgb(col.hi, row.hi);

            for c in 0..INPUT_CHANNELS {
                let val = tl[c] as f32 * (1.0 - fx) * (1.0 - fy)
                    + tr[c] as f32 * fx * (1.0 - fy)
                    + bl[c] as f32 * (1.0 - fx) * fy
                    + br[c] as f32 * fx * fy;

                tensor[[y, x, c]] = (val / PIXEL_SCALE).clamp(0.0, 1.0);
            }
        }
    }

    NormalizedTensor(tensor)
}
