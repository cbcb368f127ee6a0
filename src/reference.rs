//! Generation of the pseudo-random reference pattern.

use rand::Rng;

use crate::error::{Result, WatermarkError};
use crate::frame::{ChannelFormat, PixelBuffer};

/// Creates a reference pattern whose samples are drawn uniformly from `[0, threshold)`.
///
/// Uses the thread-local generator, so patterns differ between calls and
/// between runs. Use [`create_random_with_rng`] with a seeded generator when a
/// pattern has to be reproducible.
///
/// # Errors
/// * `InvalidArgument` if `threshold` is 0 or the dimensions are empty
pub fn create_random(
    width: usize,
    height: usize,
    threshold: u8,
    format: ChannelFormat,
) -> Result<PixelBuffer> {
    create_random_with_rng(width, height, threshold, format, &mut rand::rng())
}

/// Same as [`create_random`], drawing from the supplied generator.
pub fn create_random_with_rng<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    threshold: u8,
    format: ChannelFormat,
    rng: &mut R,
) -> Result<PixelBuffer> {
    if threshold == 0 {
        return Err(WatermarkError::InvalidArgument(
            "reference threshold must be in 1..=255".into(),
        ));
    }

    let mut reference = PixelBuffer::new(width, height, format)?;
    for sample in reference.samples_mut() {
        *sample = rng.random_range(0..threshold);
    }
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_create_random_respects_bound() {
        let threshold = 5;
        let reference = create_random(100, 200, threshold, ChannelFormat::Color).unwrap();

        assert_eq!(reference.width(), 100);
        assert_eq!(reference.height(), 200);
        assert_eq!(reference.format(), ChannelFormat::Color);
        assert!(reference.samples().iter().all(|&v| v < threshold));
    }

    #[test]
    fn test_create_random_grayscale_shape() {
        let reference = create_random(31, 7, 50, ChannelFormat::Grayscale).unwrap();
        assert_eq!(reference.samples().len(), 31 * 7);
        assert!(reference.samples().iter().all(|&v| v < 50));
    }

    #[test]
    fn test_threshold_one_yields_zeros() {
        let reference = create_random(16, 16, 1, ChannelFormat::Color).unwrap();
        assert!(reference.samples().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = create_random(16, 16, 0, ChannelFormat::Color);
        assert!(matches!(result, Err(WatermarkError::InvalidArgument(_))));
    }

    #[test]
    fn test_full_range_is_used() {
        // With 60k samples every value below the bound shows up.
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let reference =
            create_random_with_rng(200, 100, 255, ChannelFormat::Color, &mut rng).unwrap();
        let mut seen = [false; 255];
        for &v in reference.samples() {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = create_random_with_rng(
            20,
            20,
            50,
            ChannelFormat::Grayscale,
            &mut ChaCha8Rng::seed_from_u64(42),
        )
        .unwrap();
        let b = create_random_with_rng(
            20,
            20,
            50,
            ChannelFormat::Grayscale,
            &mut ChaCha8Rng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
