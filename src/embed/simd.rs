//! Vectorized saturating add/sub kernels.
//!
//! All `unsafe` code of the crate lives here. The kernels only ever see
//! equal-length slices whose length is a multiple of the lane width; the safe
//! driver [`apply`] guarantees that and hands the row remainder to the scalar
//! path.

#[cfg(target_arch = "aarch64")]
use std::arch::is_aarch64_feature_detected;
#[cfg(target_arch = "x86_64")]
use std::arch::is_x86_feature_detected;

use crate::embed::backend::{Increment, apply_scalar};

/// Scratch size for non-identity alphas; a multiple of every lane width.
const SCRATCH_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaneWidth {
    W16,
    W32,
}

impl LaneWidth {
    pub(crate) fn bytes(self) -> usize {
        match self {
            LaneWidth::W16 => 16,
            LaneWidth::W32 => 32,
        }
    }
}

/// Whether the running CPU has a kernel for `width`.
pub(crate) fn is_available(width: LaneWidth) -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        match width {
            LaneWidth::W16 => is_x86_feature_detected!("sse2"),
            LaneWidth::W32 => is_x86_feature_detected!("avx2"),
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        match width {
            LaneWidth::W16 => is_aarch64_feature_detected!("neon"),
            LaneWidth::W32 => false,
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = width;
        false
    }
}

/// Applies the embedding rule to a row segment using `width`-byte lanes.
///
/// The lane-aligned prefix goes through the vector kernel; the remainder at
/// the end of the segment goes through the scalar loop.
pub(crate) fn apply(
    width: LaneWidth,
    target: &mut [u8],
    reference: &[u8],
    increment: &Increment,
    key: bool,
) {
    debug_assert_eq!(target.len(), reference.len());
    let vector_len = target.len() / width.bytes() * width.bytes();
    let (head, tail) = target.split_at_mut(vector_len);
    let (ref_head, ref_tail) = reference.split_at(vector_len);

    if increment.is_identity() {
        saturating_lanes(width, head, ref_head, key);
    } else {
        let mut scratch = [0u8; SCRATCH_LEN];
        for (t, r) in head.chunks_mut(SCRATCH_LEN).zip(ref_head.chunks(SCRATCH_LEN)) {
            let lanes = &mut scratch[..r.len()];
            increment.scale_into(r, lanes);
            saturating_lanes(width, t, lanes, key);
        }
    }

    apply_scalar(tail, ref_tail, increment, key);
}

/// `target[i] = target[i] (+|-) lanes[i]` with unsigned saturation.
fn saturating_lanes(width: LaneWidth, target: &mut [u8], lanes: &[u8], key: bool) {
    assert_eq!(target.len(), lanes.len());
    assert_eq!(target.len() % width.bytes(), 0);

    #[cfg(target_arch = "x86_64")]
    {
        match width {
            LaneWidth::W32 if is_x86_feature_detected!("avx2") => {
                // SAFETY: AVX2 was detected and both slices hold whole 32-byte lanes.
                unsafe { x86::saturating_avx2(target, lanes, key) };
                return;
            }
            LaneWidth::W16 if is_x86_feature_detected!("sse2") => {
                // SAFETY: SSE2 was detected and both slices hold whole 16-byte lanes.
                unsafe { x86::saturating_sse2(target, lanes, key) };
                return;
            }
            _ => {}
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if width == LaneWidth::W16 && is_aarch64_feature_detected!("neon") {
            // SAFETY: NEON was detected and both slices hold whole 16-byte lanes.
            unsafe { neon::saturating_neon(target, lanes, key) };
            return;
        }
    }

    for (t, &wr) in target.iter_mut().zip(lanes) {
        *t = if key {
            t.saturating_add(wr)
        } else {
            t.saturating_sub(wr)
        };
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::{
        __m128i, __m256i, _mm_adds_epu8, _mm_loadu_si128, _mm_storeu_si128, _mm_subs_epu8,
        _mm256_adds_epu8, _mm256_loadu_si256, _mm256_storeu_si256, _mm256_subs_epu8,
    };

    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn saturating_sse2(target: &mut [u8], lanes: &[u8], key: bool) {
        for (t, r) in target.chunks_exact_mut(16).zip(lanes.chunks_exact(16)) {
            // SAFETY: each chunk is exactly 16 bytes; unaligned loads/stores are used.
            unsafe {
                let val = _mm_loadu_si128(t.as_ptr() as *const __m128i);
                let wr = _mm_loadu_si128(r.as_ptr() as *const __m128i);
                let out = if key {
                    _mm_adds_epu8(val, wr)
                } else {
                    _mm_subs_epu8(val, wr)
                };
                _mm_storeu_si128(t.as_mut_ptr() as *mut __m128i, out);
            }
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn saturating_avx2(target: &mut [u8], lanes: &[u8], key: bool) {
        for (t, r) in target.chunks_exact_mut(32).zip(lanes.chunks_exact(32)) {
            // SAFETY: each chunk is exactly 32 bytes; unaligned loads/stores are used.
            unsafe {
                let val = _mm256_loadu_si256(t.as_ptr() as *const __m256i);
                let wr = _mm256_loadu_si256(r.as_ptr() as *const __m256i);
                let out = if key {
                    _mm256_adds_epu8(val, wr)
                } else {
                    _mm256_subs_epu8(val, wr)
                };
                _mm256_storeu_si256(t.as_mut_ptr() as *mut __m256i, out);
            }
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod neon {
    use std::arch::aarch64::{vld1q_u8, vqaddq_u8, vqsubq_u8, vst1q_u8};

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn saturating_neon(target: &mut [u8], lanes: &[u8], key: bool) {
        for (t, r) in target.chunks_exact_mut(16).zip(lanes.chunks_exact(16)) {
            // SAFETY: each chunk is exactly 16 bytes.
            unsafe {
                let val = vld1q_u8(t.as_ptr());
                let wr = vld1q_u8(r.as_ptr());
                let out = if key {
                    vqaddq_u8(val, wr)
                } else {
                    vqsubq_u8(val, wr)
                };
                vst1q_u8(t.as_mut_ptr(), out);
            }
        }
    }
}
