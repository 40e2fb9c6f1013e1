use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.) * (self.y2 - self.y1).max(0.)
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let width = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.);
        let height = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.);
        width * height
    }

    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersection(other) / union
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One recognised object in one frame. No identity is carried across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Stable sort, highest confidence first. Equal confidences keep detector order.
pub fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// Output of one completed inference pass. Immutable once built.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    detections: Vec<Detection>,
    completed_at: SystemTime,
}

impl DetectionResult {
    pub fn new(mut detections: Vec<Detection>, completed_at: SystemTime) -> Self {
        sort_by_confidence(&mut detections);
        Self {
            detections,
            completed_at,
        }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn completed_at(&self) -> SystemTime {
        self.completed_at
    }

    /// Completion time as fractional seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.completed_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
