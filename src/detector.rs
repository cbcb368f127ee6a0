//! Blind detection by linear correlation.
//!
//! The detector never sees the original image. It correlates the candidate
//! with the reference pattern, channel by channel, and reads the embedded
//! polarity off the sign of the averaged coefficient: adding the pattern
//! pushes the correlation up, subtracting it pushes it down, and an unrelated
//! image correlates at roughly zero.

use std::fmt;

use crate::error::{Result, WatermarkError};
use crate::frame::{PixelBuffer, describe_shape};

/// Result of one detection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionOutcome {
    /// Inputs were invalid or did not match.
    Failed,
    /// The pattern was embedded with `key = true`.
    PositiveMatch,
    /// The pattern was embedded with `key = false`.
    NegativeMatch,
    NoWatermark,
}

impl fmt::Display for DetectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DetectionOutcome::Failed => "FAILED",
            DetectionOutcome::PositiveMatch => "TRUE",
            DetectionOutcome::NegativeMatch => "FALSE",
            DetectionOutcome::NoWatermark => "NOT DETECTED",
        };
        f.write_str(text)
    }
}

/// Classifies `candidate` against `reference`.
///
/// Any validation failure (shape mismatch, bad threshold) yields
/// [`DetectionOutcome::Failed`]; use [`linear_correlation`] to get the reason.
pub fn classify(candidate: &PixelBuffer, reference: &PixelBuffer, threshold: f64) -> DetectionOutcome {
    if let Err(e) = validate_threshold(threshold) {
        log::debug!("detection failed: {e}");
        return DetectionOutcome::Failed;
    }
    match linear_correlation(candidate, reference) {
        Ok(corr) => classify_correlation(corr, threshold),
        Err(e) => {
            log::debug!("detection failed: {e}");
            DetectionOutcome::Failed
        }
    }
}

/// Maps an averaged correlation coefficient to an outcome.
pub fn classify_correlation(corr: f64, threshold: f64) -> DetectionOutcome {
    if corr < -threshold {
        DetectionOutcome::NegativeMatch
    } else if corr > threshold {
        DetectionOutcome::PositiveMatch
    } else {
        DetectionOutcome::NoWatermark
    }
}

/// Pearson correlation between `candidate` and `reference`, averaged over channels.
///
/// A channel with zero variance in either buffer contributes 0.
///
/// # Errors
/// * `DimensionMismatch` if the buffers differ in width, height or channel layout
pub fn linear_correlation(candidate: &PixelBuffer, reference: &PixelBuffer) -> Result<f64> {
    if candidate.shape() != reference.shape() {
        return Err(WatermarkError::mismatch(
            describe_shape(candidate.shape()),
            describe_shape(reference.shape()),
        ));
    }

    let channels = candidate.channels();
    let total: f64 = (0..channels)
        .map(|channel| channel_correlation(candidate.samples(), reference.samples(), channels, channel))
        .sum();
    let corr = total / channels as f64;
    log::debug!("linear correlation {corr:.6} over {channels} channel(s)");
    Ok(corr)
}

fn channel_correlation(candidate: &[u8], reference: &[u8], channels: usize, channel: usize) -> f64 {
    let pairs = || {
        candidate
            .chunks_exact(channels)
            .zip(reference.chunks_exact(channels))
            .map(move |(c, r)| (c[channel] as f64, r[channel] as f64))
    };

    // Step 1: means
    let (mut sum_c, mut sum_r, mut n) = (0.0, 0.0, 0usize);
    for (c, r) in pairs() {
        sum_c += c;
        sum_r += r;
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let mean_c = sum_c / n as f64;
    let mean_r = sum_r / n as f64;

    // Step 2: centered cross and square sums
    let (mut cross, mut sqr_c, mut sqr_r) = (0.0, 0.0, 0.0);
    for (c, r) in pairs() {
        let dc = c - mean_c;
        let dr = r - mean_r;
        cross += dc * dr;
        sqr_c += dc * dc;
        sqr_r += dr * dr;
    }

    if sqr_c == 0.0 || sqr_r == 0.0 {
        return 0.0;
    }
    cross / sqr_c.sqrt() / sqr_r.sqrt()
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(WatermarkError::InvalidArgument(format!(
            "detection threshold must be a positive number, got {threshold}"
        )));
    }
    Ok(())
}
