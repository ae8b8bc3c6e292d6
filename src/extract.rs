//! Bulk sequential frame extraction
//!
//! One forward sweep over a source, grabbing every frame but retrieving
//! only the selected ones. Used for export and thumbnail strips, where
//! per-frame seek scheduling would only add overhead.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use crate::source::FrameSource;

/// Which frames a sweep should retrieve.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Explicit frame indices to retrieve. `None` retrieves every frame
    /// the interval filter lets through.
    pub indexes: Option<BTreeSet<u64>>,
    /// Minimum spacing between retrieved frames, in seconds of stream
    /// time.
    pub retrieve_interval: Option<f64>,
}

impl ExtractOptions {
    /// Retrieve every frame.
    pub fn all() -> Self {
        Self::default()
    }

    /// Retrieve exactly the given frame indices.
    pub fn at_indexes(indexes: impl IntoIterator<Item = u64>) -> Self {
        Self {
            indexes: Some(indexes.into_iter().collect()),
            retrieve_interval: None,
        }
    }

    /// Retrieve roughly one frame per `interval` seconds.
    pub fn every_secs(interval: f64) -> Self {
        Self {
            indexes: None,
            retrieve_interval: Some(interval),
        }
    }
}

/// An extracted frame with its index and timestamp.
#[derive(Debug, Clone)]
pub struct Extracted<F> {
    pub frame: F,
    pub index: u64,
    pub timestamp: f64,
}

/// Sweep `source` from frame zero, yielding the frames selected by
/// `options`. The sweep ends at end of stream; backend failures surface
/// as iterator items.
pub fn extract<S: FrameSource>(source: &mut S, options: ExtractOptions) -> Frames<'_, S> {
    let frame_count = source.frame_count();
    debug!(
        "starting extraction sweep over {} frames ({:?})",
        frame_count, options
    );
    Frames {
        source,
        options,
        frame_count,
        next_index: 0,
        retrieved: 0,
        rewound: false,
        done: false,
    }
}

/// Iterator over extracted frames. See [`extract`].
pub struct Frames<'a, S: FrameSource> {
    source: &'a mut S,
    options: ExtractOptions,
    frame_count: u64,
    next_index: u64,
    retrieved: u64,
    rewound: bool,
    done: bool,
}

impl<S: FrameSource> Iterator for Frames<'_, S> {
    type Item = Result<Extracted<S::Frame>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.rewound {
            if let Err(e) = self.source.seek_to(0) {
                self.done = true;
                return Some(Err(e));
            }
            self.rewound = true;
        }

        loop {
            if self.next_index >= self.frame_count {
                self.done = true;
                debug!("extraction sweep complete, {} frames retrieved", self.retrieved);
                return None;
            }
            match self.source.grab_next() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    debug!("extraction sweep hit end of stream at frame {}", self.next_index);
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            let index = self.next_index;
            self.next_index += 1;

            if let Some(wanted) = &self.options.indexes {
                if !wanted.contains(&index) {
                    continue;
                }
            }
            let timestamp = self.source.timestamp();
            if let Some(interval) = self.options.retrieve_interval {
                if timestamp < interval * self.retrieved as f64 {
                    continue;
                }
            }

            let frame = match self.source.retrieve() {
                Ok(frame) => frame,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.retrieved += 1;
            return Some(Ok(Extracted {
                frame,
                index,
                timestamp,
            }));
        }
    }
}
