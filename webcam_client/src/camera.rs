use crate::source::{FrameSource, SourceError};
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio,
};
use std::path::Path;

/// OpenCV capture from a camera index or a video file.
pub struct CameraSource {
    capture: videoio::VideoCapture,
    encode_params: Vector<i32>,
    from_file: bool,
}

impl CameraSource {
    pub fn new(index: i32, jpeg_quality: u8) -> Result<Self, SourceError> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(SourceError::CameraUnavailable(index));
        }

        Ok(Self::with_capture(capture, jpeg_quality, false))
    }

    /// Plays the file once; the source is exhausted at its last frame.
    pub fn from_file(path: &Path, jpeg_quality: u8) -> Result<Self, SourceError> {
        let capture =
            videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(SourceError::VideoUnavailable(path.to_path_buf()));
        }

        Ok(Self::with_capture(capture, jpeg_quality, true))
    }

    fn with_capture(capture: videoio::VideoCapture, jpeg_quality: u8, from_file: bool) -> Self {
        let encode_params =
            Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, jpeg_quality as i32]);

        Self {
            capture,
            encode_params,
            from_file,
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            if self.from_file {
                tracing::info!("Reached end of video file");
            } else {
                tracing::error!("Could not read frame from camera");
            }
            return Ok(None);
        }

        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", &frame, &mut buf, &self.encode_params)?;
        Ok(Some(buf.to_vec()))
    }
}
