use crate::detection::{Detection, DetectionResult};
use parking_lot::RwLock;
use std::{sync::Arc, time::SystemTime};

/// Holds the most recent completed detection result. Readers get a shared
/// handle to an immutable result, so they never see a half-written one.
#[derive(Debug, Default)]
pub struct ResultStore {
    latest: RwLock<Option<Arc<DetectionResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(
        &self,
        detections: Vec<Detection>,
        completed_at: SystemTime,
    ) -> Arc<DetectionResult> {
        let result = Arc::new(DetectionResult::new(detections, completed_at));
        *self.latest.write() = Some(result.clone());
        result
    }

    /// `None` until the first successful inference.
    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.latest.read().clone()
    }
}
