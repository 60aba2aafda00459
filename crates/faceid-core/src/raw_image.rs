//! Raw 8-bit, 3-channel pixel buffers.
//!
//! A [`RawImage`] is what the capture layer hands over (a blue-green-red
//! camera crop) or what a reference file decodes to (red-green-blue). Both
//! are validated on construction so downstream code can index freely.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Byte order of the three channels in a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Blue-green-red, as delivered by camera frames.
    Bgr,
    /// Red-green-blue, as decoded from image files.
    Rgb,
}

/// Immutable interleaved 3-channel image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl RawImage {
    /// Wrap an interleaved pixel buffer, checking that it is non-empty and
    /// exactly `width * height * 3` bytes long.
    pub fn new(
        width: u32,
        height: u32,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Decode(format!(
                "image has no spatial extent ({width}x{height})"
            )));
        }

        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::Decode(format!(
                "expected {expected} bytes for {width}x{height}x{CHANNELS}, got {}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Decode an encoded image (JPEG, PNG, ...) into RGB pixels.
    ///
    /// Grayscale and alpha sources are expanded/flattened to three channels.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        Self::from_rgb_image(decoded.to_rgb8())
    }

    /// Read and decode an image file.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ImageError::NotFound(path.display().to_string())
            } else {
                ImageError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })?;

        Self::decode(&bytes).map_err(|e| match e {
            ImageError::Decode(reason) => {
                ImageError::Decode(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_rgb_image(image: RgbImage) -> Result<Self, ImageError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, ChannelOrder::Rgb, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y) in red-green-blue order, whatever the storage order.
    #[inline]
    pub fn pixel_rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width as usize + x) * CHANNELS;
        let px = &self.data[idx..idx + CHANNELS];
        match self.order {
            ChannelOrder::Rgb => [px[0], px[1], px[2]],
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        }
    }

    /// Copy into an `image` buffer (RGB), e.g. for encoding to disk.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb(self.pixel_rgb(x as usize, y as usize))
        })
    }
}
