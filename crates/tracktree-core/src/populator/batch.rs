//! Iterative batch slicing over an owned track list
//!
//! The first batch may be larger than the rest to front-load visible
//! content; draining happens in a loop rather than by self-recursion so
//! very large track lists cannot grow the stack.

use crate::types::Track;

/// Slices a track list into `(start_index, tracks)` batches.
///
/// The first call to [`next_batch`](Self::next_batch) yields up to
/// `initial_size` tracks, subsequent calls up to `steady_size`. A size of
/// zero ends the run; `usize::MAX` drains the whole remainder in one batch.
#[derive(Debug)]
pub struct TrackBatcher {
    tracks: Vec<Track>,
    cursor: usize,
    first: bool,
    initial_size: usize,
    steady_size: usize,
}

impl TrackBatcher {
    pub fn new(tracks: Vec<Track>, initial_size: usize, steady_size: usize) -> Self {
        Self {
            tracks,
            cursor: 0,
            first: true,
            initial_size,
            steady_size,
        }
    }

    /// Take the next batch, or `None` once the list is exhausted or the
    /// applicable batch size is zero.
    pub fn next_batch(&mut self) -> Option<(usize, &[Track])> {
        if self.cursor >= self.tracks.len() {
            return None;
        }

        let size = if self.first {
            self.initial_size
        } else {
            self.steady_size
        };
        self.first = false;

        if size == 0 {
            return None;
        }

        let start = self.cursor;
        let end = start.saturating_add(size).min(self.tracks.len());
        self.cursor = end;
        Some((start, &self.tracks[start..end]))
    }

    /// Tracks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.tracks.len() - self.cursor
    }
}
