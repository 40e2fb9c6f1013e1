use crate::{detection::Detection, frame_buffer::FrameBuffer, result_store::ResultStore};
use crate::frame::Frame;
use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

/// State shared between the request handlers and the inference worker.
#[derive(Debug, Default)]
pub struct Pipeline {
    frames: FrameBuffer,
    results: ResultStore,
    busy: AtomicBool,
    completed: AtomicU64,
    failures: AtomicU64,
    warmup: Vec<Detection>,
}

impl Pipeline {
    /// `warmup` holds the detections of the start-up pass, served as-is.
    pub fn new(warmup: Vec<Detection>) -> Self {
        Self {
            warmup,
            ..Default::default()
        }
    }

    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn warmup(&self) -> &[Detection] {
        &self.warmup
    }

    /// Observability only; nothing gates on it.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Takes the pending frame and marks the worker busy in one step.
    pub(crate) fn claim_frame(&self, timeout: Duration) -> Option<Frame> {
        self.frames.wait_claim(timeout, &self.busy)
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    pub fn inferences_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn inference_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}
