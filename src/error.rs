use thiserror::Error;

/// The central error type for all operations in the refmark_engine.
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Offset {offset} is outside of a buffer of {len} bytes")]
    OutOfRange { offset: usize, len: usize },

    #[error("Image decode error: {0}")]
    Decode(image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(image::ImageError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

// Foreign payloads (image, rayon) are not comparable, so those variants
// compare by kind only.
impl PartialEq for WatermarkError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (WatermarkError::InvalidArgument(a), WatermarkError::InvalidArgument(b)) => a == b,
            (
                WatermarkError::DimensionMismatch {
                    expected: e1,
                    actual: a1,
                },
                WatermarkError::DimensionMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (
                WatermarkError::OutOfRange { offset: o1, len: l1 },
                WatermarkError::OutOfRange { offset: o2, len: l2 },
            ) => o1 == o2 && l1 == l2,
            (WatermarkError::WorkerFailed(a), WatermarkError::WorkerFailed(b)) => a == b,
            (WatermarkError::Decode(_), WatermarkError::Decode(_)) => true,
            (WatermarkError::Encode(_), WatermarkError::Encode(_)) => true,
            (WatermarkError::ThreadPool(_), WatermarkError::ThreadPool(_)) => true,
            _ => false,
        }
    }
}

impl WatermarkError {
    /// Shorthand for a [`WatermarkError::DimensionMismatch`] built from anything printable.
    pub fn mismatch(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        WatermarkError::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// A centralized result type for our library.
pub type Result<T> = std::result::Result<T, WatermarkError>;
