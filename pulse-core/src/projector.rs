//! Virtual window projection.
//!
//! Maps a large ordered buffer to the slice a renderer actually needs. The
//! cost of a projection is proportional to the viewport size, never to the
//! length of the backing buffer, and nothing outside the window is touched.
//! Projections are recomputed from scratch on every render tick.

use crate::buffer::SeriesBuffer;
use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

/// Visible sub-range of a channel, as requested by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Index of the first visible item in the ordered sequence
    pub offset: usize,
    /// Number of visible items
    pub size: usize,
}

impl Viewport {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// Build a viewport from raw UI values, clamping negatives to zero.
    pub fn from_signed(offset: i64, size: i64) -> Self {
        Self { offset: offset.max(0) as usize, size: size.max(0) as usize }
    }

    /// Viewport showing the newest `size` items of a sequence of length `len`.
    pub fn tail(len: usize, size: usize) -> Self {
        Self { offset: len.saturating_sub(size), size }
    }

    /// Resolve the index range for a backing sequence of length `len`.
    ///
    /// An offset past the end yields an empty range. Otherwise the offset is
    /// clamped into `[0, len - size]` so a window near the tail stays full.
    pub fn range(&self, len: usize) -> Range<usize> {
        if self.offset > len {
            return len..len;
        }
        let start = self.offset.min(len.saturating_sub(self.size));
        let end = start.saturating_add(self.size).min(len);
        start..end
    }
}

/// Materialized window over a channel buffer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Window {
    /// Visible samples in timestamp order
    pub items: Vec<Sample>,
    /// Effective offset after clamping
    pub offset: usize,
    /// Length of the backing buffer
    pub total: usize,
    /// Version of the backing buffer the window was cut from
    pub version: u64,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Clone the items of `backing` that fall inside `viewport`.
pub fn project_slice<T: Clone>(backing: &VecDeque<T>, viewport: Viewport) -> Vec<T> {
    backing.range(viewport.range(backing.len())).cloned().collect()
}

/// Project a channel buffer through a viewport.
pub fn project(buffer: &SeriesBuffer, viewport: Viewport) -> Window {
    let samples = buffer.samples();
    let range = viewport.range(samples.len());
    Window {
        offset: range.start,
        items: samples.range(range).cloned().collect(),
        total: samples.len(),
        version: buffer.version(),
    }
}
