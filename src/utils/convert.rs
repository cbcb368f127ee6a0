use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// BT.601 luma of one pixel, rounded to the nearest 8-bit value.
pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    // Y = 0.299*R + 0.587*G + 0.114*B
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Converts an RGB image into tightly packed B, G, R samples.
pub fn rgb_to_bgr_samples(img: &RgbImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(img.as_raw().len());
    for pixel in img.pixels() {
        let Rgb([r, g, b]) = *pixel;
        out.extend_from_slice(&[b, g, r]);
    }
    out
}

/// Builds an RGB image from packed B, G, R samples.
///
/// Returns `None` when `samples` does not hold exactly `width * height` pixels.
pub fn bgr_samples_to_rgb(width: u32, height: u32, samples: &[u8]) -> Option<RgbImage> {
    if samples.len() != width as usize * height as usize * 3 {
        return None;
    }
    let mut out = RgbImage::new(width, height);
    for (pixel, bgr) in out.pixels_mut().zip(samples.chunks_exact(3)) {
        *pixel = Rgb([bgr[2], bgr[1], bgr[0]]);
    }
    Some(out)
}

/// Converts packed B, G, R samples to one luma byte per pixel.
pub fn bgr_samples_to_luma(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(3)
        .map(|bgr| bt601_luma(bgr[2], bgr[1], bgr[0]))
        .collect()
}

/// Converts any decoded image to BT.601 grayscale samples.
///
/// `DynamicImage::to_luma8` uses Rec. 709 weights, which would make grayscale
/// loads disagree with [`bgr_samples_to_luma`].
pub fn dynamic_to_luma_samples(img: &DynamicImage) -> Vec<u8> {
    img.to_rgb8()
        .pixels()
        .map(|p| bt601_luma(p[0], p[1], p[2]))
        .collect()
}

/// Builds a grayscale image from packed luma samples.
pub fn luma_samples_to_gray(width: u32, height: u32, samples: &[u8]) -> Option<GrayImage> {
    if samples.len() != width as usize * height as usize {
        return None;
    }
    let mut out = GrayImage::new(width, height);
    for (pixel, &value) in out.pixels_mut().zip(samples) {
        *pixel = Luma([value]);
    }
    Some(out)
}
