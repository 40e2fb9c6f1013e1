use crate::{detection::DetectionResult, server::SharedState};
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

const NOT_READY_MESSAGE: &str = "No prediction available yet";
const NOTHING_DETECTED_MESSAGE: &str = "No objects detected in the image";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBody {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    pub detections: Vec<DetectionBody>,
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_objects: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultResponse {
    /// "Not ready" is a regular response, not an error.
    pub fn from_latest(latest: Option<&DetectionResult>) -> Self {
        let Some(result) = latest else {
            return Self {
                detections: Vec::new(),
                timestamp: None,
                total_objects: None,
                message: Some(NOT_READY_MESSAGE.to_string()),
            };
        };

        let detections: Vec<DetectionBody> = result
            .detections()
            .iter()
            .map(|detection| DetectionBody {
                class_name: detection.class_name.clone(),
                confidence: detection.confidence,
                bbox: detection.bbox.as_array(),
            })
            .collect();

        let message = detections
            .is_empty()
            .then(|| NOTHING_DETECTED_MESSAGE.to_string());

        Self {
            total_objects: Some(detections.len()),
            detections,
            timestamp: Some(result.timestamp()),
            message,
        }
    }
}

#[instrument(skip(state))]
pub async fn latest_result(State(state): State<SharedState>) -> Json<ResultResponse> {
    state.metrics.record_request("/result/");
    let latest = state.pipeline.results().latest();

    Json(ResultResponse::from_latest(latest.as_deref()))
}
