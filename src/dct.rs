//! DCT robustness filter for reference patterns.
//!
//! The reference is processed in non-overlapping 8x8 blocks. Each block is
//! moved to the frequency domain, every coefficient below the threshold is
//! randomly either dropped to zero or pinned to the threshold magnitude, and
//! the block is transformed back. What remains is dominated by the strong
//! coefficients, which survive lossy recompression much better than the
//! flat white noise the generator produces.
//!
//! Blocks that would cross the right or bottom edge are left untouched.

use rand::Rng;
use rustdct::{DctPlanner, TransformType2And3};
use std::sync::Arc;

use crate::error::{Result, WatermarkError};
use crate::frame::{ChannelFormat, PixelBuffer};

// --- Constants ---
/// The size of the square blocks the reference is processed in.
pub const BLOCK_SIZE: usize = 8;

const BLOCK_LEN: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Orthonormal 8x8 2-D DCT built from two passes of a planned 1-D transform.
///
/// The scaling matches the orthonormal DCT-II, so the DC coefficient of a flat
/// block of value `v` is `8 * v` and `inverse(forward(x)) == x` up to float error.
pub struct BlockDct {
    dct: Arc<dyn TransformType2And3<f32>>,
}

impl Default for BlockDct {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDct {
    pub fn new() -> Self {
        let mut planner = DctPlanner::new();
        Self {
            dct: planner.plan_dct2(BLOCK_SIZE),
        }
    }

    /// Forward transform of a row-major block, in place.
    pub fn forward(&self, block: &mut [f32; BLOCK_LEN]) {
        self.forward_rows(block);
        transpose(block);
        self.forward_rows(block);
        transpose(block);
    }

    /// Inverse transform of a row-major coefficient block, in place.
    pub fn inverse(&self, block: &mut [f32; BLOCK_LEN]) {
        self.inverse_rows(block);
        transpose(block);
        self.inverse_rows(block);
        transpose(block);
    }

    fn forward_rows(&self, block: &mut [f32; BLOCK_LEN]) {
        let (dc_scale, ac_scale) = ortho_scales();
        for row in block.chunks_exact_mut(BLOCK_SIZE) {
            self.dct.process_dct2(row);
            row[0] *= dc_scale;
            for v in &mut row[1..] {
                *v *= ac_scale;
            }
        }
    }

    fn inverse_rows(&self, block: &mut [f32; BLOCK_LEN]) {
        // rustdct's DCT-III halves the first input, hence the doubled DC weight.
        let (dc_scale, ac_scale) = ortho_scales();
        for row in block.chunks_exact_mut(BLOCK_SIZE) {
            row[0] *= 2.0 * dc_scale;
            for v in &mut row[1..] {
                *v *= ac_scale;
            }
            self.dct.process_dct3(row);
        }
    }
}

fn ortho_scales() -> (f32, f32) {
    let n = BLOCK_SIZE as f32;
    ((1.0 / n).sqrt(), (2.0 / n).sqrt())
}

/// Rounds a reconstructed value to the nearest sample and clamps it to `[0, output_max]`.
fn to_sample(value: f32, output_max: u8) -> u8 {
    value.round().clamp(0.0, output_max as f32) as u8
}

fn transpose(block: &mut [f32; BLOCK_LEN]) {
    for y in 0..BLOCK_SIZE {
        for x in (y + 1)..BLOCK_SIZE {
            block.swap(y * BLOCK_SIZE + x, x * BLOCK_SIZE + y);
        }
    }
}

/// Sparsifies one block of coefficients.
///
/// Every coefficient below `threshold` (signed comparison) becomes, with a fair
/// coin, either exactly 0 or `threshold` carrying the coefficient's sign. Zero
/// counts as positive.
pub(crate) fn sparsify_coefficients<R: Rng + ?Sized>(
    coefficients: &mut [f32],
    threshold: f32,
    rng: &mut R,
) {
    for c in coefficients.iter_mut() {
        if *c < threshold {
            *c = if rng.random_bool(0.5) {
                0.0
            } else if *c >= 0.0 {
                threshold
            } else {
                -threshold
            };
        }
    }
}

/// Applies the robustness filter to a grayscale reference in place, using the
/// thread-local generator for the coin flips.
///
/// # Arguments
/// * `buffer` - grayscale reference pattern, modified in place
/// * `threshold` - coefficients below this value are sparsified
/// * `output_max` - upper clamp for the reconstructed samples
///
/// # Errors
/// * `InvalidArgument` if the buffer is not grayscale or `threshold` is not finite
pub fn sharpen(buffer: &mut PixelBuffer, threshold: f32, output_max: u8) -> Result<()> {
    sharpen_with_rng(buffer, threshold, output_max, &mut rand::rng())
}

/// Same as [`sharpen`], drawing coin flips from the supplied generator.
pub fn sharpen_with_rng<R: Rng + ?Sized>(
    buffer: &mut PixelBuffer,
    threshold: f32,
    output_max: u8,
    rng: &mut R,
) -> Result<()> {
    if buffer.format() != ChannelFormat::Grayscale {
        return Err(WatermarkError::InvalidArgument(
            "the DCT robustness filter works on grayscale references only".into(),
        ));
    }
    if !threshold.is_finite() {
        return Err(WatermarkError::InvalidArgument(format!(
            "robustness threshold must be finite, got {threshold}"
        )));
    }

    let dct = BlockDct::new();
    let stride = buffer.stride();
    let blocks_x = buffer.width() / BLOCK_SIZE;
    let blocks_y = buffer.height() / BLOCK_SIZE;
    log::trace!("sharpening {blocks_x}x{blocks_y} blocks, threshold {threshold}");

    let samples = buffer.samples_mut();
    let mut block = [0f32; BLOCK_LEN];

    for block_y in 0..blocks_y {
        for block_x in 0..blocks_x {
            let origin = block_y * BLOCK_SIZE * stride + block_x * BLOCK_SIZE;

            // Step 1: gather the block as floats, row by row
            for y in 0..BLOCK_SIZE {
                let src = &samples[origin + y * stride..origin + y * stride + BLOCK_SIZE];
                for (dst, &v) in block[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE].iter_mut().zip(src) {
                    *dst = v as f32;
                }
            }

            // Step 2: forward DCT, sparsify, inverse DCT
            dct.forward(&mut block);
            sparsify_coefficients(&mut block, threshold, rng);
            dct.inverse(&mut block);

            // Step 3: clamp and write back
            for y in 0..BLOCK_SIZE {
                let dst = &mut samples[origin + y * stride..origin + y * stride + BLOCK_SIZE];
                for (out, &v) in dst.iter_mut().zip(&block[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE]) {
                    *out = to_sample(v, output_max);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::create_random_with_rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seeded_reference(width: usize, height: usize, seed: u64) -> PixelBuffer {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        create_random_with_rng(width, height, 50, ChannelFormat::Grayscale, &mut rng).unwrap()
    }

    #[test]
    fn test_block_dct_flat_block_has_only_dc() {
        let dct = BlockDct::new();
        let mut block = [10.0f32; BLOCK_LEN];
        dct.forward(&mut block);

        assert!((block[0] - 80.0).abs() < 1e-3, "DC was {}", block[0]);
        for (i, &c) in block.iter().enumerate().skip(1) {
            assert!(c.abs() < 1e-3, "coefficient {} was {}", i, c);
        }
    }

    #[test]
    fn test_block_dct_roundtrip() {
        let dct = BlockDct::new();
        let original: [f32; BLOCK_LEN] = std::array::from_fn(|i| ((i * 37) % 251) as f32);
        let mut block = original;
        dct.forward(&mut block);
        dct.inverse(&mut block);

        for (a, b) in original.iter().zip(block.iter()) {
            assert!((a - b).abs() < 1e-2, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_block_dct_preserves_energy() {
        let dct = BlockDct::new();
        let original: [f32; BLOCK_LEN] = std::array::from_fn(|i| ((i * 13) % 29) as f32);
        let mut block = original;
        dct.forward(&mut block);

        let spatial: f32 = original.iter().map(|v| v * v).sum();
        let spectral: f32 = block.iter().map(|v| v * v).sum();
        assert!((spatial - spectral).abs() / spatial < 1e-4);
    }

    #[test]
    fn test_reconstruction_rounds_to_nearest() {
        // A DC-only block reconstructs to 10.6 everywhere.
        let dct = BlockDct::new();
        let mut block = [0f32; BLOCK_LEN];
        block[0] = 8.0 * 10.6;
        dct.inverse(&mut block);

        assert!(block.iter().all(|&v| to_sample(v, 255) == 11));
        assert_eq!(to_sample(10.4, 255), 10);
        assert_eq!(to_sample(-3.2, 255), 0);
        assert_eq!(to_sample(61.7, 50), 50);
    }

    #[test]
    fn test_sparsify_rules() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut coefficients = vec![-3.0f32, 0.0, 2.0, 5.0, 9.5];
        sparsify_coefficients(&mut coefficients, 5.0, &mut rng);

        assert!(coefficients[0] == 0.0 || coefficients[0] == -5.0);
        assert!(coefficients[1] == 0.0 || coefficients[1] == 5.0);
        assert!(coefficients[2] == 0.0 || coefficients[2] == 5.0);
        // At or above the threshold: untouched.
        assert_eq!(coefficients[3], 5.0);
        assert_eq!(coefficients[4], 9.5);
    }

    #[test]
    fn test_sparsify_coin_is_fair() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut coefficients = vec![1.0f32; 10_000];
        sparsify_coefficients(&mut coefficients, 4.0, &mut rng);

        let zeros = coefficients.iter().filter(|&&c| c == 0.0).count();
        assert!((4_500..=5_500).contains(&zeros), "zeros: {}", zeros);
        assert!(coefficients.iter().all(|&c| c == 0.0 || c == 4.0));
    }

    #[test]
    fn test_sharpen_clamps_to_output_max() {
        let mut reference = seeded_reference(64, 48, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        sharpen_with_rng(&mut reference, 30.0, 50, &mut rng).unwrap();
        assert!(reference.samples().iter().all(|&v| v <= 50));
    }

    #[test]
    fn test_sharpen_leaves_partial_blocks_untouched() {
        let original = seeded_reference(21, 13, 5);
        let mut reference = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        sharpen_with_rng(&mut reference, 1000.0, 255, &mut rng).unwrap();

        // Only the 16x8 region covered by full blocks may change.
        for row in 0..13 {
            for col in 0..21 {
                if row >= 8 || col >= 16 {
                    assert_eq!(
                        reference.get(row, col, 0).unwrap(),
                        original.get(row, col, 0).unwrap(),
                        "pixel ({}, {}) changed",
                        row,
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn test_sharpen_with_unreachable_threshold_is_identity() {
        let original = seeded_reference(32, 32, 7);
        let mut reference = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        sharpen_with_rng(&mut reference, f32::MIN, 255, &mut rng).unwrap();
        assert_eq!(reference, original);
    }

    #[test]
    fn test_sharpen_is_reproducible_with_seed() {
        let mut a = seeded_reference(40, 40, 9);
        let mut b = a.clone();
        sharpen_with_rng(&mut a, 20.0, 50, &mut ChaCha8Rng::seed_from_u64(10)).unwrap();
        sharpen_with_rng(&mut b, 20.0, 50, &mut ChaCha8Rng::seed_from_u64(10)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sharpen_rejects_color_and_nan() {
        let mut color = PixelBuffer::new(16, 16, ChannelFormat::Color).unwrap();
        assert!(matches!(
            sharpen(&mut color, 5.0, 50),
            Err(WatermarkError::InvalidArgument(_))
        ));

        let mut gray = PixelBuffer::new(16, 16, ChannelFormat::Grayscale).unwrap();
        assert!(matches!(
            sharpen(&mut gray, f32::NAN, 50),
            Err(WatermarkError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sharpen_small_buffer_is_noop() {
        let original = seeded_reference(7, 7, 11);
        let mut reference = original.clone();
        sharpen(&mut reference, 100.0, 255).unwrap();
        assert_eq!(reference, original);
    }
}
