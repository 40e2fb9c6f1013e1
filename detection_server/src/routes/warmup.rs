use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Serialize, Deserialize)]
pub struct WarmupDetection {
    pub class_name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WarmupResponse {
    pub detections: Vec<WarmupDetection>,
}

/// Detections of the start-up pass; a liveness signal that never touches the
/// result store.
#[instrument(skip(state))]
pub async fn warmup_result(State(state): State<SharedState>) -> Json<WarmupResponse> {
    state.metrics.record_request("/");

    let detections = state
        .pipeline
        .warmup()
        .iter()
        .map(|detection| WarmupDetection {
            class_name: detection.class_name.clone(),
            confidence: detection.confidence,
        })
        .collect();

    Json(WarmupResponse { detections })
}
