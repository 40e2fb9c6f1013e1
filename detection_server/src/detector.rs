use crate::{detection::Detection, frame::Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Unexpected model output: {0}")]
    Output(String),
}

/// A synchronous object detector. Takes `&mut self` because implementations
/// are not assumed safe for concurrent use; the inference worker owns the
/// only instance.
pub trait Detector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(frame)
    }
}
