//! Seek scheduling: incremental stepping vs direct positioning

use tracing::{trace, warn};

use crate::error::FrameError;
use crate::source::FrameSource;

/// Forward hops spanning less than this many seconds of footage decode
/// sequentially; longer hops go through a codec-level seek.
const SEQUENTIAL_WINDOW_SECS: f64 = 5.0;

/// How a requested frame will be reached from the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePlan {
    /// The stream already sits on the requested frame; retrieve only.
    Stay,
    /// Advance frame-by-frame this many times.
    Step(u64),
    /// Reposition directly, then advance once.
    Seek(u64),
}

/// Chooses between stepping and seeking, then drives the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeekScheduler;

impl SeekScheduler {
    /// Pick a plan for reaching `requested` from `current`.
    ///
    /// `current` is the backend-reported index of the last decoded frame,
    /// `-1` before the first decode. Backward moves always seek,
    /// regardless of distance. Forward moves step sequentially while the
    /// hop spans under five seconds of footage at `frame_rate`; past that
    /// a seek is cheaper than decoding the intervening frames.
    pub fn resolve(&self, requested: u64, current: i64, frame_rate: f64) -> DecodePlan {
        let requested = requested as i64;
        if requested < current {
            return DecodePlan::Seek(requested as u64);
        }
        if requested == current {
            return DecodePlan::Stay;
        }
        let delta = (requested - current) as u64;
        if (delta as f64) < frame_rate * SEQUENTIAL_WINDOW_SECS {
            DecodePlan::Step(delta)
        } else {
            DecodePlan::Seek(requested as u64)
        }
    }

    /// Execute a plan against `source` and decode frame `requested`.
    ///
    /// Returns the frame together with the index and timestamp the
    /// backend reports for it. A backend landing anywhere other than
    /// `requested` is a consistency fault and surfaces as
    /// `PositionMismatch`; it is never silently corrected.
    pub fn fetch<S: FrameSource>(
        &self,
        source: &mut S,
        requested: u64,
    ) -> Result<(S::Frame, u64, f64), FrameError> {
        let plan = self.resolve(requested, source.position(), source.frame_rate());
        trace!(
            "frame {}: plan {:?} from position {}",
            requested,
            plan,
            source.position()
        );

        match plan {
            DecodePlan::Stay => {}
            DecodePlan::Step(n) => {
                for _ in 0..n {
                    if !source.grab_next().map_err(FrameError::Backend)? {
                        return Err(FrameError::EndOfStream { index: requested });
                    }
                }
            }
            DecodePlan::Seek(target) => {
                source.seek_to(target).map_err(FrameError::Backend)?;
                if !source.grab_next().map_err(FrameError::Backend)? {
                    return Err(FrameError::EndOfStream { index: requested });
                }
            }
        }

        let reported = source.position();
        if reported != requested as i64 {
            warn!(
                "backend position drifted: requested {}, reports {}",
                requested, reported
            );
            return Err(FrameError::PositionMismatch {
                requested,
                reported,
            });
        }

        let timestamp = source.timestamp();
        let frame = source.retrieve().map_err(FrameError::Backend)?;
        Ok((frame, requested, timestamp))
    }
}
