//! Frame type and pixel helpers: region crop, luma and dark detection.

use faceid_core::{ChannelOrder, ImageError, RawImage};

const CHANNELS: usize = 3;
/// Luma below this counts as "dark" for [`is_dark_frame`].
const DARK_LUMA: u8 = 32;

/// A captured colour camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved blue-green-red pixels (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// BT.601 luma per pixel.
    pub fn luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| {
                let (b, g, r) = (px[0] as f32, px[1] as f32, px[2] as f32);
                (0.114 * b + 0.587 * g + 0.299 * r).round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Hand the frame to the verification core.
    pub fn to_raw_image(&self) -> Result<RawImage, ImageError> {
        RawImage::new(self.width, self.height, ChannelOrder::Bgr, self.data.clone())
    }
}

/// Fixed rectangle cut out of each frame to frame the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&faceid_core::CaptureSettings> for CaptureRegion {
    fn from(settings: &faceid_core::CaptureSettings) -> Self {
        Self {
            x: settings.region_x,
            y: settings.region_y,
            width: settings.region_width,
            height: settings.region_height,
        }
    }
}

/// Copy `region` out of `frame`. The region must lie entirely inside the frame.
pub fn crop(frame: &Frame, region: CaptureRegion) -> Result<Frame, FrameError> {
    let fits_x = region.x.checked_add(region.width).is_some_and(|end| end <= frame.width);
    let fits_y = region.y.checked_add(region.height).is_some_and(|end| end <= frame.height);
    if region.width == 0 || region.height == 0 || !fits_x || !fits_y {
        return Err(FrameError::RegionOutOfBounds {
            region,
            width: frame.width,
            height: frame.height,
        });
    }

    let expected = frame.width as usize * frame.height as usize * CHANNELS;
    if frame.data.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: frame.data.len(),
        });
    }

    let src_stride = frame.width as usize * CHANNELS;
    let row_bytes = region.width as usize * CHANNELS;
    let mut data = Vec::with_capacity(row_bytes * region.height as usize);
    for y in region.y as usize..(region.y + region.height) as usize {
        let start = y * src_stride + region.x as usize * CHANNELS;
        data.extend_from_slice(&frame.data[start..start + row_bytes]);
    }

    Ok(Frame {
        data,
        width: region.width,
        height: region.height,
        timestamp: frame.timestamp,
        sequence: frame.sequence,
    })
}

/// Check if a frame is dark.
///
/// Returns true if more than `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(luma: &[u8], threshold_pct: f32) -> bool {
    if luma.is_empty() {
        return true;
    }
    let dark_count = luma.iter().filter(|&&p| p < DARK_LUMA).count();
    (dark_count as f32 / luma.len() as f32) > threshold_pct
}

/// Reorder interleaved RGB bytes to BGR.
pub fn rgb_to_bgr(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(CHANNELS)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("capture region {region:?} does not fit a {width}x{height} frame")]
    RegionOutOfBounds {
        region: CaptureRegion,
        width: u32,
        height: u32,
    },
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
