use crate::server::SharedState;
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    busy: bool,
    pending: bool,
    frames_received: u64,
    frames_dropped: u64,
    inferences_completed: u64,
    inference_failures: u64,
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    state.metrics.record_request("/health");
    let pipeline = &state.pipeline;
    // Slot first: the worker raises busy before it empties the slot.
    let pending = pipeline.frames().is_pending();
    let busy = pipeline.is_busy();

    Json(Status {
        status: "Available".into(),
        busy,
        pending,
        frames_received: pipeline.frames().received(),
        frames_dropped: pipeline.frames().dropped(),
        inferences_completed: pipeline.inferences_completed(),
        inference_failures: pipeline.inference_failures(),
    })
}
