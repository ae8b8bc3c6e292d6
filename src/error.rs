//! Engine error types

use thiserror::Error;

/// Errors surfaced by the frame engine.
#[derive(Debug, Error)]
pub enum FrameError {
    /// No subject is registered under the given id.
    #[error("subject not open: {0}")]
    SubjectNotOpen(String),

    /// A subject with the given id is already registered.
    #[error("subject already open: {0}")]
    SubjectExists(String),

    /// The source reports zero decodable frames.
    #[error("subject {0} has an empty stream")]
    EmptyStream(String),

    /// The backend ran out of frames in the middle of a decode plan.
    #[error("end of stream while decoding frame {index}")]
    EndOfStream { index: u64 },

    /// The backend failed to seek, advance or retrieve.
    #[error("decode backend failure")]
    Backend(#[source] anyhow::Error),

    /// The backend landed on a different frame than requested. Indicates
    /// drifted position tracking, never silently corrected.
    #[error("position mismatch: requested frame {requested}, backend reports {reported}")]
    PositionMismatch { requested: u64, reported: i64 },
}
