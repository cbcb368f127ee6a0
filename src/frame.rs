//! The pixel buffer shared by every stage of the engine.
//!
//! A [`PixelBuffer`] owns one interleaved image plane. Color buffers store
//! their channels in B, G, R order; grayscale buffers store one byte per
//! pixel. Rows are tightly packed, so `stride == width * channels`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WatermarkError};
use crate::utils::convert::bgr_samples_to_luma;

/// Channel layout of a [`PixelBuffer`], fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelFormat {
    Grayscale,
    /// Interleaved B, G, R.
    #[default]
    Color,
}

impl ChannelFormat {
    /// Number of interleaved bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            ChannelFormat::Grayscale => 1,
            ChannelFormat::Color => 3,
        }
    }
}

impl fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFormat::Grayscale => f.write_str("grayscale"),
            ChannelFormat::Color => f.write_str("color"),
        }
    }
}

impl FromStr for ChannelFormat {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gray" | "grayscale" => Ok(ChannelFormat::Grayscale),
            "color" | "bgr" => Ok(ChannelFormat::Color),
            other => Err(WatermarkError::InvalidArgument(format!(
                "unknown channel format `{other}`"
            ))),
        }
    }
}

/// One image plane of 8-bit samples.
///
/// `Clone` is a deep copy; two buffers never alias the same samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    format: ChannelFormat,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Allocates a zero-filled buffer.
    pub fn new(width: usize, height: usize, format: ChannelFormat) -> Result<Self> {
        let len = checked_len(width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            samples: vec![0; len],
        })
    }

    /// Wraps existing samples, which must be exactly `stride * height` bytes.
    pub fn from_samples(
        width: usize,
        height: usize,
        format: ChannelFormat,
        samples: Vec<u8>,
    ) -> Result<Self> {
        let len = checked_len(width, height, format)?;
        if samples.len() != len {
            return Err(WatermarkError::mismatch(
                format!("{len} samples"),
                format!("{} samples", samples.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> ChannelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width * self.format.channels()
    }

    /// `(width, height, format)`, the shape two buffers must share to be combined.
    pub fn shape(&self) -> (usize, usize, ChannelFormat) {
        (self.width, self.height, self.format)
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.samples
    }

    /// Byte offset of `(row, column, channel)`, validated against the buffer.
    pub fn offset(&self, row: usize, column: usize, channel: usize) -> Result<usize> {
        let len = self.samples.len();
        if row >= self.height || column >= self.width || channel >= self.channels() {
            // Report the offset the caller would have touched, saturating on overflow.
            let offset = row
                .saturating_mul(self.stride())
                .saturating_add(column.saturating_mul(self.channels()))
                .saturating_add(channel);
            return Err(WatermarkError::OutOfRange { offset, len });
        }
        Ok(row * self.stride() + column * self.channels() + channel)
    }

    pub fn get(&self, row: usize, column: usize, channel: usize) -> Result<u8> {
        let offset = self.offset(row, column, channel)?;
        Ok(self.samples[offset])
    }

    pub fn set(&mut self, row: usize, column: usize, channel: usize, value: u8) -> Result<()> {
        let offset = self.offset(row, column, channel)?;
        self.samples[offset] = value;
        Ok(())
    }

    pub fn row(&self, row: usize) -> Result<&[u8]> {
        let stride = self.stride();
        if row >= self.height {
            return Err(WatermarkError::OutOfRange {
                offset: row.saturating_mul(stride),
                len: self.samples.len(),
            });
        }
        Ok(&self.samples[row * stride..(row + 1) * stride])
    }

    pub fn row_mut(&mut self, row: usize) -> Result<&mut [u8]> {
        let stride = self.stride();
        if row >= self.height {
            return Err(WatermarkError::OutOfRange {
                offset: row.saturating_mul(stride),
                len: self.samples.len(),
            });
        }
        Ok(&mut self.samples[row * stride..(row + 1) * stride])
    }

    /// BT.601 grayscale copy of this buffer; grayscale buffers are cloned as is.
    pub fn to_grayscale(&self) -> PixelBuffer {
        match self.format {
            ChannelFormat::Grayscale => self.clone(),
            ChannelFormat::Color => PixelBuffer {
                width: self.width,
                height: self.height,
                format: ChannelFormat::Grayscale,
                samples: bgr_samples_to_luma(&self.samples),
            },
        }
    }

    /// Fails with `DimensionMismatch` unless `other` has the same width, height and format.
    pub fn ensure_same_shape(&self, other: &PixelBuffer) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(WatermarkError::mismatch(
                describe_shape(self.shape()),
                describe_shape(other.shape()),
            ));
        }
        Ok(())
    }
}

pub(crate) fn describe_shape((width, height, format): (usize, usize, ChannelFormat)) -> String {
    format!("{width}x{height} {format}")
}

fn checked_len(width: usize, height: usize, format: ChannelFormat) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(WatermarkError::InvalidArgument(format!(
            "buffer dimensions must be positive, got {width}x{height}"
        )));
    }
    width
        .checked_mul(format.channels())
        .and_then(|stride| stride.checked_mul(height))
        .ok_or_else(|| {
            WatermarkError::InvalidArgument(format!("buffer of {width}x{height} is too large"))
        })
}
