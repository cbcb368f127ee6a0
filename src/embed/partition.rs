//! Spatial partitioning of a buffer into disjoint work units.
//!
//! Partition byte ranges are computed up front from the buffer geometry and
//! the worker count; the buffers are then split into non-overlapping mutable
//! segments, so workers never need to synchronize with each other.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{Result, WatermarkError};

/// How an embedding call splits its buffer between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Partitioning {
    /// Contiguous horizontal bands of whole rows.
    #[default]
    Rows,
    /// Contiguous vertical bands of the interleaved row bytes.
    Columns,
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partitioning::Rows => f.write_str("rows"),
            Partitioning::Columns => f.write_str("columns"),
        }
    }
}

impl FromStr for Partitioning {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rows" | "row" => Ok(Partitioning::Rows),
            "columns" | "column" | "cols" => Ok(Partitioning::Columns),
            other => Err(WatermarkError::InvalidArgument(format!(
                "unknown partitioning `{other}`"
            ))),
        }
    }
}

/// The rectangle of a buffer owned by one worker.
///
/// `columns` is measured in bytes of the interleaved row, not in pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRange {
    pub rows: Range<usize>,
    pub columns: Range<usize>,
}

impl PartitionRange {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Number of bytes this partition covers.
    pub fn len(&self) -> usize {
        self.rows.len() * self.columns.len()
    }

    /// Absolute byte ranges of this partition inside a buffer with `stride` bytes per row.
    pub fn byte_ranges(&self, stride: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        self.rows.clone().filter(move |_| !self.columns.is_empty()).map(move |row| {
            row * stride + self.columns.start..row * stride + self.columns.end
        })
    }
}

/// Computes one partition per worker.
///
/// Bands are `extent / workers` wide, with the remainder absorbed by the last
/// worker. With zero workers the whole buffer is a single partition.
pub fn plan(
    stride: usize,
    height: usize,
    workers: usize,
    partitioning: Partitioning,
) -> Vec<PartitionRange> {
    if workers == 0 {
        return vec![PartitionRange {
            rows: 0..height,
            columns: 0..stride,
        }];
    }

    let extent = match partitioning {
        Partitioning::Rows => height,
        Partitioning::Columns => stride,
    };
    let band = extent / workers;

    (0..workers)
        .map(|i| {
            let start = i * band;
            let end = if i + 1 == workers { extent } else { start + band };
            match partitioning {
                Partitioning::Rows => PartitionRange {
                    rows: start..end,
                    columns: 0..stride,
                },
                Partitioning::Columns => PartitionRange {
                    rows: 0..height,
                    columns: start..end,
                },
            }
        })
        .collect()
}

/// One row piece of a partition: target bytes and the matching reference bytes.
pub(crate) struct Segment<'a> {
    pub(crate) target: &'a mut [u8],
    pub(crate) reference: &'a [u8],
}

/// Splits `target`/`reference` into the segments of each partition in `ranges`.
///
/// The output has one entry per range, in order. Ranges must come from
/// [`plan`]: within every row, the ranges covering it are sorted by column and
/// do not overlap.
pub(crate) fn split<'a>(
    target: &'a mut [u8],
    reference: &'a [u8],
    stride: usize,
    ranges: &[PartitionRange],
) -> Vec<Vec<Segment<'a>>> {
    let mut parts: Vec<Vec<Segment<'a>>> = ranges.iter().map(|_| Vec::new()).collect();
    if stride == 0 {
        return parts;
    }

    let rows = target
        .chunks_exact_mut(stride)
        .zip(reference.chunks_exact(stride));
    for (row, (target_row, reference_row)) in rows.enumerate() {
        let mut target_rest = target_row;
        let mut reference_rest = reference_row;
        let mut consumed = 0;

        for (part, range) in parts.iter_mut().zip(ranges) {
            if !range.rows.contains(&row) || range.columns.is_empty() {
                continue;
            }
            debug_assert!(range.columns.start >= consumed, "overlapping partitions");

            let skip = range.columns.start - consumed;
            let (_, target_tail) = std::mem::take(&mut target_rest).split_at_mut(skip);
            let (target_piece, target_tail) = target_tail.split_at_mut(range.columns.len());
            let (_, reference_tail) = reference_rest.split_at(skip);
            let (reference_piece, reference_tail) = reference_tail.split_at(range.columns.len());

            part.push(Segment {
                target: target_piece,
                reference: reference_piece,
            });
            target_rest = target_tail;
            reference_rest = reference_tail;
            consumed = range.columns.end;
        }
    }

    parts
}
