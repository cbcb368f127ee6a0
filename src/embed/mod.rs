//! Embedding engine: adds or subtracts a reference pattern from an image.
//!
//! The work is split spatially (see [`partition`]) and every partition is
//! processed with one of the interchangeable arithmetic [`Backend`]s. All
//! backends and all partitionings produce byte-identical output.

pub mod backend;
pub mod partition;
pub mod pool;
mod simd;

pub use backend::Backend;
pub use partition::{PartitionRange, Partitioning};
pub use pool::WorkerPool;

use crate::error::Result;
use crate::frame::PixelBuffer;
use backend::{Increment, apply_segment};

/// Parameters of one embedding call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbedParams {
    /// Multiplier applied to each reference sample before it is added or subtracted.
    pub alpha: f64,
    /// Polarity: `true` adds the pattern, `false` subtracts it.
    pub key: bool,
    pub backend: Backend,
    pub partitioning: Partitioning,
}

impl Default for EmbedParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            key: true,
            backend: Backend::Auto,
            partitioning: Partitioning::Rows,
        }
    }
}

impl EmbedParams {
    pub fn new(alpha: f64, key: bool) -> Self {
        Self {
            alpha,
            key,
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }
}

/// Embeds `reference` into `target` in place.
///
/// Every sample becomes `min(255, t + wr)` when `key` is set and
/// `max(0, t - wr)` otherwise, with `wr = min(255, trunc(r * alpha))`.
/// The buffer is split into `pool.size()` partitions (one when the pool is
/// inline) and the call returns once every partition is done.
///
/// # Errors
/// * `DimensionMismatch` if the buffers differ in width, height or channel layout
/// * `InvalidArgument` if `alpha` is negative or not finite
/// * `WorkerFailed` if a partition failed inside the pool
///
/// Validation happens before anything is written, so a rejected call leaves
/// `target` untouched.
pub fn apply_reference(
    target: &mut PixelBuffer,
    reference: &PixelBuffer,
    params: &EmbedParams,
    pool: &WorkerPool,
) -> Result<()> {
    target.ensure_same_shape(reference)?;
    let increment = Increment::new(params.alpha)?;
    let backend = params.backend.resolve();

    let stride = target.stride();
    let ranges = partition::plan(stride, target.height(), pool.size(), params.partitioning);
    log::debug!(
        "embedding {}x{} ({} partitions by {}, backend {}, alpha {}, key {})",
        target.width(),
        target.height(),
        ranges.len(),
        params.partitioning,
        backend,
        params.alpha,
        params.key
    );

    let parts: Vec<_> = partition::split(target.samples_mut(), reference.samples(), stride, &ranges)
        .into_iter()
        .filter(|segments| !segments.is_empty())
        .collect();

    pool.run(parts, |segments| {
        for segment in segments {
            apply_segment(
                backend,
                segment.target,
                segment.reference,
                &increment,
                params.key,
            );
        }
        Ok(())
    })
}
