//! Codec boundary: moves pixel buffers in and out of image files.
//!
//! The engine itself never looks at encoded bytes; everything container
//! specific is delegated to the `image` crate here.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::error::{Result, WatermarkError};
use crate::frame::{ChannelFormat, PixelBuffer};
use crate::utils::convert::{
    bgr_samples_to_rgb, dynamic_to_luma_samples, luma_samples_to_gray, rgb_to_bgr_samples,
};

/// Load an image file into a buffer of the requested channel layout.
pub fn load(path: impl AsRef<Path>, format: ChannelFormat) -> Result<PixelBuffer> {
    let img = image::open(path).map_err(WatermarkError::Decode)?;
    from_dynamic(&img, format)
}

/// Decode image bytes (PNG, JPEG, BMP, ...) into a buffer of the requested channel layout.
pub fn decode_bytes(bytes: &[u8], format: ChannelFormat) -> Result<PixelBuffer> {
    let img = image::load_from_memory(bytes).map_err(WatermarkError::Decode)?;
    from_dynamic(&img, format)
}

/// Save a buffer; the container format follows the file extension.
pub fn save(buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<()> {
    to_dynamic(buffer)?
        .save(path)
        .map_err(WatermarkError::Encode)
}

/// Encode a buffer as PNG bytes.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_dynamic(buffer)?
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(WatermarkError::Encode)?;
    Ok(buf)
}

fn from_dynamic(img: &DynamicImage, format: ChannelFormat) -> Result<PixelBuffer> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let samples = match format {
        ChannelFormat::Color => rgb_to_bgr_samples(&img.to_rgb8()),
        ChannelFormat::Grayscale => dynamic_to_luma_samples(img),
    };
    PixelBuffer::from_samples(width, height, format, samples)
}

fn to_dynamic(buffer: &PixelBuffer) -> Result<DynamicImage> {
    let width = u32::try_from(buffer.width())
        .map_err(|_| WatermarkError::InvalidArgument("image is too wide to encode".into()))?;
    let height = u32::try_from(buffer.height())
        .map_err(|_| WatermarkError::InvalidArgument("image is too tall to encode".into()))?;

    let img = match buffer.format() {
        ChannelFormat::Color => {
            bgr_samples_to_rgb(width, height, buffer.samples()).map(DynamicImage::ImageRgb8)
        }
        ChannelFormat::Grayscale => {
            luma_samples_to_gray(width, height, buffer.samples()).map(DynamicImage::ImageLuma8)
        }
    };
    img.ok_or_else(|| {
        WatermarkError::mismatch(
            format!("{} samples", buffer.stride() * buffer.height()),
            format!("{} samples", buffer.samples().len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize, format: ChannelFormat) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(width, height, format).unwrap();
        let stride = buffer.stride();
        for (i, v) in buffer.samples_mut().iter_mut().enumerate() {
            *v = ((i % stride) * 3 + (i / stride) * 7) as u8;
        }
        buffer
    }

    #[test]
    fn test_png_bytes_roundtrip_color() {
        let buffer = gradient(17, 9, ChannelFormat::Color);
        let png = encode_png(&buffer).unwrap();
        let decoded = decode_bytes(&png, ChannelFormat::Color).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_png_bytes_roundtrip_grayscale() {
        let buffer = gradient(5, 12, ChannelFormat::Grayscale);
        let png = encode_png(&buffer).unwrap();
        let decoded = decode_bytes(&png, ChannelFormat::Grayscale).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_color_decoded_as_grayscale_uses_luma() {
        let mut buffer = PixelBuffer::new(1, 1, ChannelFormat::Color).unwrap();
        // B, G, R
        buffer.samples_mut().copy_from_slice(&[0, 0, 255]);
        let png = encode_png(&buffer).unwrap();
        let gray = decode_bytes(&png, ChannelFormat::Grayscale).unwrap();
        assert_eq!(gray.samples(), &[76]);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let result = decode_bytes(b"definitely not an image", ChannelFormat::Color);
        assert!(matches!(result, Err(WatermarkError::Decode(_))));
    }
}
