//! FrameMark video engine
//!
//! The adaptive frame cache and seek scheduler sitting between the
//! FrameMark annotation UI and a sequential video decode backend.
//! Decoded frames are memoized under a bounded entry budget with
//! multi-factor eviction; per request, the engine decides whether to
//! reach a frame by stepping the decoder forward or by issuing a
//! random seek.

mod cache;
mod error;
mod extract;
mod scheduler;
mod service;
mod source;

#[cfg(test)]
mod testutil;

pub use cache::{
    AccessKey, CacheConfig, CacheEntry, CacheStats, EntryStats, EvictionPolicy, FrameCache,
    ParamValue, Priority, PriorityScorer,
};
pub use error::FrameError;
pub use extract::{extract, ExtractOptions, Extracted, Frames};
pub use scheduler::{DecodePlan, SeekScheduler};
pub use service::{EngineInfo, FrameReply, FrameService, SharedFrameService, SubjectInfo};
pub use source::{FrameSource, SourceMeta};
