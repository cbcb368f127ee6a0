//! Blind watermarking with a pseudo-random reference pattern.
//!
//! A reference pattern is generated ([`reference`]), optionally made robust
//! to recompression in the DCT domain ([`dct`]), and added to or subtracted
//! from an image ([`embed`]). Later, without the original image, the
//! [`detector`] correlates a candidate against the same pattern and tells
//! which polarity, if any, is present.
//!
//! ```no_run
//! use refmark_engine::detector::{self, DetectionOutcome};
//! use refmark_engine::embed::{self, EmbedParams, WorkerPool};
//! use refmark_engine::{ChannelFormat, image_handler, reference};
//!
//! # fn main() -> refmark_engine::Result<()> {
//! let mut image = image_handler::load("photo.png", ChannelFormat::Color)?;
//! let pattern = reference::create_random(image.width(), image.height(), 50, ChannelFormat::Color)?;
//!
//! let pool = WorkerPool::new(4)?;
//! embed::apply_reference(&mut image, &pattern, &EmbedParams::new(0.1, true), &pool)?;
//!
//! assert_eq!(detector::classify(&image, &pattern, 0.01), DetectionOutcome::PositiveMatch);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dct;
pub mod detector;
pub mod embed;
pub mod error;
pub mod frame;
pub mod image_handler;
pub mod reference;
pub mod utils;

pub use error::{Result, WatermarkError};
pub use frame::{ChannelFormat, PixelBuffer};
