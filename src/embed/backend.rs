//! Arithmetic backends for the per-sample embedding rule.
//!
//! Every backend computes, for each sample,
//! `target = key ? min(255, target + wr) : max(0, target - wr)` with
//! `wr = min(255, trunc(reference * alpha))`. The increment always comes from
//! the same [`Increment`] table, which keeps the backends bit-exact for any alpha.

use std::fmt;
use std::str::FromStr;

use crate::embed::simd::{self, LaneWidth};
use crate::error::{Result, WatermarkError};

/// Arithmetic backend used by the embedding engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Widest backend the running CPU supports.
    #[default]
    Auto,
    /// Portable byte-wise loop.
    Scalar,
    /// 16-byte lanes (SSE2 on x86_64, NEON on aarch64).
    Vector128,
    /// 32-byte lanes (AVX2 on x86_64).
    Vector256,
}

impl Backend {
    /// All concrete backends, narrowest first.
    pub const CONCRETE: [Backend; 3] = [Backend::Scalar, Backend::Vector128, Backend::Vector256];

    /// Whether this backend can run on the current CPU.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Auto | Backend::Scalar => true,
            Backend::Vector128 => simd::is_available(LaneWidth::W16),
            Backend::Vector256 => simd::is_available(LaneWidth::W32),
        }
    }

    /// Resolves `Auto` and unavailable vector backends to a backend that can run here.
    ///
    /// An unavailable backend degrades to the next narrower one, ending at `Scalar`.
    pub fn resolve(self) -> Backend {
        let resolved = match self {
            Backend::Scalar => Backend::Scalar,
            Backend::Auto | Backend::Vector256 if Backend::Vector256.is_available() => {
                Backend::Vector256
            }
            Backend::Auto | Backend::Vector256 | Backend::Vector128
                if Backend::Vector128.is_available() =>
            {
                Backend::Vector128
            }
            _ => Backend::Scalar,
        };
        if self != Backend::Auto && resolved != self {
            log::debug!("backend {self} is not available on this CPU, using {resolved}");
        }
        resolved
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Auto => "auto",
            Backend::Scalar => "scalar",
            Backend::Vector128 => "vector128",
            Backend::Vector256 => "vector256",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "scalar" | "c" => Ok(Backend::Scalar),
            "vector128" | "sse" | "sse2" | "neon" => Ok(Backend::Vector128),
            "vector256" | "avx" | "avx2" => Ok(Backend::Vector256),
            other => Err(WatermarkError::InvalidArgument(format!(
                "unknown backend `{other}`"
            ))),
        }
    }
}

/// Per-reference-value increment for one embedding call.
#[derive(Debug, Clone)]
pub(crate) struct Increment {
    table: [u8; 256],
    identity: bool,
}

impl Increment {
    /// Builds the table `wr[r] = min(255, trunc(r * alpha))`.
    ///
    /// # Errors
    /// * `InvalidArgument` if `alpha` is negative or not finite
    pub(crate) fn new(alpha: f64) -> Result<Self> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(WatermarkError::InvalidArgument(format!(
                "alpha must be a finite non-negative number, got {alpha}"
            )));
        }
        // Float-to-int `as` truncates toward zero and saturates at 255.
        let table = std::array::from_fn(|r| (r as f64 * alpha) as u8);
        Ok(Self {
            table,
            identity: alpha == 1.0,
        })
    }

    /// True when every increment equals the reference value itself.
    pub(crate) fn is_identity(&self) -> bool {
        self.identity
    }

    pub(crate) fn of(&self, reference: u8) -> u8 {
        self.table[reference as usize]
    }

    /// Writes the increments for `reference` into `out`.
    pub(crate) fn scale_into(&self, reference: &[u8], out: &mut [u8]) {
        for (o, &r) in out.iter_mut().zip(reference) {
            *o = self.table[r as usize];
        }
    }
}

/// Applies the embedding rule to one row segment with a resolved backend.
pub(crate) fn apply_segment(
    backend: Backend,
    target: &mut [u8],
    reference: &[u8],
    increment: &Increment,
    key: bool,
) {
    debug_assert_eq!(target.len(), reference.len());
    match backend {
        Backend::Vector128 => simd::apply(LaneWidth::W16, target, reference, increment, key),
        Backend::Vector256 => simd::apply(LaneWidth::W32, target, reference, increment, key),
        Backend::Scalar | Backend::Auto => apply_scalar(target, reference, increment, key),
    }
}

/// The portable reference implementation every other backend must match.
pub(crate) fn apply_scalar(target: &mut [u8], reference: &[u8], increment: &Increment, key: bool) {
    for (t, &r) in target.iter_mut().zip(reference) {
        let wr = increment.of(r);
        *t = if key {
            t.saturating_add(wr)
        } else {
            t.saturating_sub(wr)
        };
    }
}
