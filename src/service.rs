//! Subject registry and the frame request entry point

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{AccessKey, CacheConfig, CacheStats, FrameCache};
use crate::error::FrameError;
use crate::scheduler::SeekScheduler;
use crate::source::{FrameSource, SourceMeta};

/// One registered decode backend plus its serving cursor.
struct Subject<S> {
    source: S,
    meta: SourceMeta,
    last_index: Option<u64>,
    last_timestamp: Option<f64>,
}

/// A served frame: the decoded payload plus the index and timestamp the
/// backend reported for it.
#[derive(Debug)]
pub struct FrameReply<F> {
    pub frame: Arc<F>,
    pub index: u64,
    pub timestamp: f64,
}

impl<F> Clone for FrameReply<F> {
    fn clone(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
            index: self.index,
            timestamp: self.timestamp,
        }
    }
}

/// Serves frames from any number of open subjects through one shared
/// cache and seek scheduler.
///
/// All methods take `&mut self`: a request runs check, decode-or-hit,
/// statistics and size enforcement as one blocking sequence. Use
/// [`SharedFrameService`] when several callers need access.
pub struct FrameService<S: FrameSource> {
    subjects: HashMap<String, Subject<S>>,
    cache: FrameCache<FrameReply<S::Frame>>,
    scheduler: SeekScheduler,
}

impl<S: FrameSource> FrameService<S> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            subjects: HashMap::new(),
            cache: FrameCache::new(config),
            scheduler: SeekScheduler,
        }
    }

    /// Register a decode backend under `subject`.
    pub fn open(&mut self, subject: impl Into<String>, source: S) -> Result<SourceMeta, FrameError> {
        let subject = subject.into();
        if self.subjects.contains_key(&subject) {
            return Err(FrameError::SubjectExists(subject));
        }
        let meta = source.meta();
        if meta.frame_count == 0 {
            return Err(FrameError::EmptyStream(subject));
        }
        info!(
            "opened subject {} ({} frames @ {:.2} fps)",
            subject, meta.frame_count, meta.frame_rate
        );
        self.subjects.insert(
            subject,
            Subject {
                source,
                meta,
                last_index: None,
                last_timestamp: None,
            },
        );
        Ok(meta)
    }

    /// Drop a subject and purge its cached frames.
    pub fn close(&mut self, subject: &str) -> Result<(), FrameError> {
        if self.subjects.remove(subject).is_none() {
            return Err(FrameError::SubjectNotOpen(subject.to_string()));
        }
        self.cache.remove_subject(subject);
        info!("closed subject {}", subject);
        Ok(())
    }

    /// Serve one frame.
    ///
    /// Out-of-range indices clamp to the stream bounds and are never an
    /// error. Cached frames return without touching the backend;
    /// everything else decodes through the seek scheduler, exactly once
    /// per distinct frame while it stays cached.
    pub fn request_frame(
        &mut self,
        subject: &str,
        index: u64,
    ) -> Result<FrameReply<S::Frame>, FrameError> {
        let subj = self
            .subjects
            .get_mut(subject)
            .ok_or_else(|| FrameError::SubjectNotOpen(subject.to_string()))?;

        let clamped = index.min(subj.meta.last_index());
        if clamped != index {
            debug!(
                "clamped request for frame {} of {} to {}",
                index, subject, clamped
            );
        }

        let scheduler = self.scheduler;
        let source = &mut subj.source;
        let reply = self
            .cache
            .get_or_compute(AccessKey::new(subject, clamped), || {
                let (frame, index, timestamp) = scheduler.fetch(source, clamped)?;
                Ok(FrameReply {
                    frame: Arc::new(frame),
                    index,
                    timestamp,
                })
            })?;

        subj.last_index = Some(reply.index);
        subj.last_timestamp = Some(reply.timestamp);
        Ok(reply)
    }

    /// Metadata of an open subject.
    pub fn meta(&self, subject: &str) -> Option<SourceMeta> {
        self.subjects.get(subject).map(|s| s.meta)
    }

    /// Index and timestamp of the last frame served for `subject`.
    pub fn last_served(&self, subject: &str) -> Option<(u64, f64)> {
        let subj = self.subjects.get(subject)?;
        Some((subj.last_index?, subj.last_timestamp?))
    }

    pub fn is_open(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    pub fn open_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Snapshot of open subjects and cache state, for host UIs.
    pub fn info(&self) -> EngineInfo {
        let mut subjects: Vec<SubjectInfo> = self
            .subjects
            .iter()
            .map(|(id, s)| SubjectInfo {
                id: id.clone(),
                frame_count: s.meta.frame_count,
                frame_rate: s.meta.frame_rate,
                last_index: s.last_index,
            })
            .collect();
        subjects.sort_by(|a, b| a.id.cmp(&b.id));
        EngineInfo {
            subjects,
            cache: self.cache.stats(),
        }
    }
}

impl<S: FrameSource> Default for FrameService<S> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Engine snapshot for host UIs.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub subjects: Vec<SubjectInfo>,
    pub cache: CacheStats,
}

/// One open subject in an [`EngineInfo`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectInfo {
    pub id: String,
    pub frame_count: u64,
    pub frame_rate: f64,
    pub last_index: Option<u64>,
}

/// Service wrapped for shared use. The lock spans whole requests, so
/// lookup, decode, statistics and size enforcement never interleave
/// between callers.
pub type SharedFrameService<S> = Arc<Mutex<FrameService<S>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_tracing, ScriptedSource};
    use std::sync::atomic::Ordering::Relaxed;

    fn service_with(
        frame_count: u64,
        frame_rate: f64,
        capacity: usize,
    ) -> (FrameService<ScriptedSource>, Arc<crate::testutil::SourceOps>) {
        init_tracing();
        let source = ScriptedSource::new(frame_count, frame_rate);
        let ops = source.ops();
        let mut service = FrameService::new(CacheConfig::with_capacity(capacity));
        service.open("clip", source).unwrap();
        (service, ops)
    }

    #[test]
    fn test_request_decodes_then_serves_from_cache() {
        let (mut service, ops) = service_with(1000, 30.0, 100);

        let first = service.request_frame("clip", 10).unwrap();
        assert_eq!(first.index, 10);
        assert_eq!(*first.frame, 10);
        assert!((first.timestamp - 10.0 / 30.0).abs() < 1e-9);
        assert_eq!(ops.grabs.load(Relaxed), 11);

        let second = service.request_frame("clip", 10).unwrap();
        assert!(Arc::ptr_eq(&first.frame, &second.frame));
        assert_eq!(ops.grabs.load(Relaxed), 11, "hit must not touch the backend");
        assert_eq!(service.cache_stats().hits, 1);

        assert_eq!(service.last_served("clip"), Some((10, 10.0 / 30.0)));
    }

    #[test]
    fn test_backward_request_seeks_once() {
        let (mut service, ops) = service_with(1000, 30.0, 100);

        service.request_frame("clip", 100).unwrap();
        assert_eq!(ops.seeks.load(Relaxed), 0);
        let grabs_before = ops.grabs.load(Relaxed);

        let reply = service.request_frame("clip", 50).unwrap();
        assert_eq!(reply.index, 50);
        assert_eq!(ops.seeks.load(Relaxed), 1);
        assert_eq!(ops.grabs.load(Relaxed), grabs_before + 1);
    }

    #[test]
    fn test_long_forward_request_seeks_once() {
        let (mut service, ops) = service_with(1000, 30.0, 100);

        service.request_frame("clip", 100).unwrap();
        let grabs_before = ops.grabs.load(Relaxed);

        service.request_frame("clip", 500).unwrap();
        assert_eq!(ops.seeks.load(Relaxed), 1);
        assert_eq!(ops.grabs.load(Relaxed), grabs_before + 1);
    }

    #[test]
    fn test_out_of_range_request_clamps_to_last_frame() {
        let (mut service, _) = service_with(200, 30.0, 100);

        let reply = service.request_frame("clip", 1_000_000).unwrap();
        assert_eq!(reply.index, 199);

        // The clamped request cached under the real index.
        let again = service.request_frame("clip", 199).unwrap();
        assert!(Arc::ptr_eq(&reply.frame, &again.frame));
    }

    #[test]
    fn test_unknown_subject_is_an_error() {
        let (mut service, _) = service_with(100, 30.0, 10);
        let err = service.request_frame("nope", 0).unwrap_err();
        assert!(matches!(err, FrameError::SubjectNotOpen(_)));
    }

    #[test]
    fn test_duplicate_open_is_an_error() {
        let (mut service, _) = service_with(100, 30.0, 10);
        let err = service
            .open("clip", ScriptedSource::new(100, 30.0))
            .unwrap_err();
        assert!(matches!(err, FrameError::SubjectExists(_)));
    }

    #[test]
    fn test_empty_stream_is_rejected_at_open() {
        init_tracing();
        let mut service = FrameService::new(CacheConfig::default());
        let err = service
            .open("empty", ScriptedSource::new(0, 30.0))
            .unwrap_err();
        assert!(matches!(err, FrameError::EmptyStream(_)));
        assert!(!service.is_open("empty"));
    }

    #[test]
    fn test_close_purges_subject_cache() {
        let (mut service, _) = service_with(1000, 30.0, 100);

        service.request_frame("clip", 5).unwrap();
        assert_eq!(service.cache_stats().entries, 1);

        service.close("clip").unwrap();
        assert_eq!(service.cache_stats().entries, 0);
        assert!(!service.is_open("clip"));
        assert!(matches!(
            service.close("clip"),
            Err(FrameError::SubjectNotOpen(_))
        ));
    }

    #[test]
    fn test_failed_decode_caches_nothing() {
        init_tracing();
        let source = ScriptedSource::new(1000, 30.0).with_grab_failure_at(5);
        let mut service = FrameService::new(CacheConfig::with_capacity(100));
        service.open("clip", source).unwrap();

        let err = service.request_frame("clip", 10).unwrap_err();
        assert!(matches!(err, FrameError::Backend(_)));
        assert_eq!(service.cache_stats().entries, 0);
        assert_eq!(service.last_served("clip"), None);

        // Frames below the fault still decode.
        let reply = service.request_frame("clip", 3).unwrap();
        assert_eq!(reply.index, 3);
    }

    #[test]
    fn test_position_mismatch_surfaces() {
        init_tracing();
        let source = ScriptedSource::new(100_000, 30.0).with_seek_undershoot();
        let mut service = FrameService::new(CacheConfig::with_capacity(100));
        service.open("clip", source).unwrap();

        let err = service.request_frame("clip", 9000).unwrap_err();
        assert!(matches!(err, FrameError::PositionMismatch { .. }));
        assert_eq!(service.cache_stats().entries, 0);
    }

    #[test]
    fn test_two_subjects_share_one_cache() {
        init_tracing();
        let mut service = FrameService::new(CacheConfig::with_capacity(100));
        service.open("a", ScriptedSource::new(100, 30.0)).unwrap();
        service.open("b", ScriptedSource::new(100, 25.0)).unwrap();

        service.request_frame("a", 5).unwrap();
        service.request_frame("b", 5).unwrap();
        assert_eq!(service.cache_stats().entries, 2);
        assert_eq!(service.open_count(), 2);

        service.close("a").unwrap();
        assert_eq!(service.cache_stats().entries, 1);
    }

    #[test]
    fn test_info_snapshot_serializes() {
        let (mut service, _) = service_with(200, 30.0, 100);
        service.request_frame("clip", 7).unwrap();

        let info = service.info();
        assert_eq!(info.subjects.len(), 1);
        assert_eq!(info.subjects[0].last_index, Some(7));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["subjects"][0]["frame_count"], 200);
        assert_eq!(json["cache"]["misses"], 1);
    }

    #[test]
    fn test_shared_service_locks_whole_requests() {
        init_tracing();
        let service: SharedFrameService<ScriptedSource> =
            Arc::new(Mutex::new(FrameService::new(CacheConfig::with_capacity(10))));

        service
            .lock()
            .open("clip", ScriptedSource::new(100, 30.0))
            .unwrap();
        let reply = service.lock().request_frame("clip", 3).unwrap();
        assert_eq!(reply.index, 3);
    }
}
