//! Decode backend abstraction

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Stream metadata captured when a subject is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Total number of frames in the stream.
    pub frame_count: u64,
    /// Nominal frame rate of the stream.
    pub frame_rate: f64,
}

impl SourceMeta {
    /// Index of the last decodable frame.
    pub fn last_index(&self) -> u64 {
        self.frame_count.saturating_sub(1)
    }
}

/// A sequential video decode backend.
///
/// Decoding is stateful: the source sits just past the most recently
/// decoded frame. `position` reports that frame's index, `-1` before the
/// first decode. `seek_to(i)` repositions the stream so that the next
/// `grab_next` decodes frame `i`.
///
/// The seek scheduler drives only the five positioning operations
/// (`grab_next`, `seek_to`, `retrieve`, `position`, `timestamp`); the
/// metadata accessors serve the layers above.
pub trait FrameSource {
    /// Decoded frame payload handed to callers. Opaque to the engine.
    type Frame;

    /// Advance the stream one frame. Returns `false` at end of stream.
    fn grab_next(&mut self) -> Result<bool>;

    /// Reposition the stream so the next grab decodes frame `index`.
    fn seek_to(&mut self, index: u64) -> Result<()>;

    /// Decode and return the current frame.
    fn retrieve(&mut self) -> Result<Self::Frame>;

    /// Index of the most recently decoded frame, `-1` before the first.
    fn position(&self) -> i64;

    /// Timestamp of the most recently decoded frame, in seconds.
    fn timestamp(&self) -> f64;

    /// Total number of frames in the stream.
    fn frame_count(&self) -> u64;

    /// Nominal frame rate of the stream.
    fn frame_rate(&self) -> f64;

    /// Metadata snapshot.
    fn meta(&self) -> SourceMeta {
        SourceMeta {
            frame_count: self.frame_count(),
            frame_rate: self.frame_rate(),
        }
    }
}
