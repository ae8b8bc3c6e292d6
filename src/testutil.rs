//! Scripted decode backend for tests

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::source::FrameSource;

/// Backend call counters, shared with the test that built the source.
#[derive(Debug, Default)]
pub struct SourceOps {
    pub grabs: AtomicU64,
    pub seeks: AtomicU64,
    pub retrieves: AtomicU64,
}

/// An in-memory stand-in for a video decoder. Frames decode to their own
/// index; timestamps follow the nominal frame rate.
pub struct ScriptedSource {
    frame_count: u64,
    frame_rate: f64,
    pos: i64,
    eos_at: Option<u64>,
    fail_grab_at: Option<u64>,
    seek_undershoot: bool,
    ops: Arc<SourceOps>,
}

impl ScriptedSource {
    pub fn new(frame_count: u64, frame_rate: f64) -> Self {
        Self {
            frame_count,
            frame_rate,
            pos: -1,
            eos_at: None,
            fail_grab_at: None,
            seek_undershoot: false,
            ops: Arc::new(SourceOps::default()),
        }
    }

    /// Report end of stream once the grab cursor reaches `index`.
    pub fn with_eos_at(mut self, index: u64) -> Self {
        self.eos_at = Some(index);
        self
    }

    /// Error out of the grab that would decode `index`.
    pub fn with_grab_failure_at(mut self, index: u64) -> Self {
        self.fail_grab_at = Some(index);
        self
    }

    /// Make every seek land one frame short of its target.
    pub fn with_seek_undershoot(mut self) -> Self {
        self.seek_undershoot = true;
        self
    }

    pub fn ops(&self) -> Arc<SourceOps> {
        Arc::clone(&self.ops)
    }
}

impl FrameSource for ScriptedSource {
    type Frame = u64;

    fn grab_next(&mut self) -> Result<bool> {
        let next = self.pos + 1;
        if let Some(fail) = self.fail_grab_at {
            if next == fail as i64 {
                bail!("scripted decode failure at frame {next}");
            }
        }
        if let Some(eos) = self.eos_at {
            if next >= eos as i64 {
                return Ok(false);
            }
        }
        if next >= self.frame_count as i64 {
            return Ok(false);
        }
        self.pos = next;
        self.ops.grabs.fetch_add(1, Relaxed);
        Ok(true)
    }

    fn seek_to(&mut self, index: u64) -> Result<()> {
        self.ops.seeks.fetch_add(1, Relaxed);
        let offset = if self.seek_undershoot { 2 } else { 1 };
        self.pos = index as i64 - offset;
        Ok(())
    }

    fn retrieve(&mut self) -> Result<u64> {
        self.ops.retrieves.fetch_add(1, Relaxed);
        Ok(self.pos as u64)
    }

    fn position(&self) -> i64 {
        self.pos
    }

    fn timestamp(&self) -> f64 {
        if self.pos < 0 {
            0.0
        } else {
            self.pos as f64 / self.frame_rate
        }
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

/// Install a subscriber once so failing tests can be rerun with
/// `RUST_LOG=trace` output.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
