mod health;
mod metrics;
mod predict;
mod result;
mod warmup;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use predict::PredictError;
pub use result::{DetectionBody, ResultResponse};
pub use warmup::{WarmupDetection, WarmupResponse};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(warmup::warmup_result))
        .route("/predict/", post(predict::submit_frame))
        .route("/predict", post(predict::submit_frame))
        .route("/result/", get(result::latest_result))
        .route("/result", get(result::latest_result))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
