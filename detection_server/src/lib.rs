mod labels;
mod routes;

pub mod app;
pub mod config;
pub mod detection;
pub mod detector;
pub mod frame;
pub mod frame_buffer;
pub mod ort_detector;
pub mod pipeline;
pub mod result_store;
pub mod server;
pub mod telemetry;
pub mod worker;

pub use app::{serve, start_app};
pub use labels::load_class_names;
pub use routes::{DetectionBody, PredictError, ResultResponse, WarmupDetection, WarmupResponse};
