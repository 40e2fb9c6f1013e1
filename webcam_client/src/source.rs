use crate::config::{SourceConfig, SourceKind};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No image directory configured")]
    MissingDirectory,
    #[error("No video file configured")]
    MissingVideoPath,
    #[error("No images found in {0:?}")]
    NoImages(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Camera {0} could not be opened")]
    CameraUnavailable(i32),
    #[error("Video file {0:?} could not be opened")]
    VideoUnavailable(PathBuf),
    #[error("OpenCV capture is not compiled in; rebuild with `--features camera`")]
    CameraSupportDisabled,
    #[cfg(feature = "camera")]
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Produces JPEG-encoded frames ready for upload.
pub trait FrameSource: Send {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

pub fn open_source(
    config: &SourceConfig,
    jpeg_quality: u8,
) -> Result<Box<dyn FrameSource>, SourceError> {
    match config.kind {
        SourceKind::Directory => {
            let dir = config
                .image_dir
                .as_ref()
                .ok_or(SourceError::MissingDirectory)?;
            let source = ImageDirSource::new(dir, jpeg_quality, config.repeat)?;
            tracing::info!("Streaming {} images from {:?}", source.len(), dir);
            Ok(Box::new(source))
        }
        SourceKind::Video => {
            let path = config
                .video_path
                .as_ref()
                .ok_or(SourceError::MissingVideoPath)?;
            open_video(path, jpeg_quality)
        }
        SourceKind::Camera => open_camera(config.camera_index, jpeg_quality),
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: i32, jpeg_quality: u8) -> Result<Box<dyn FrameSource>, SourceError> {
    let camera = crate::camera::CameraSource::new(index, jpeg_quality)?;
    tracing::info!("Capturing from camera {}", index);
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: i32, _jpeg_quality: u8) -> Result<Box<dyn FrameSource>, SourceError> {
    Err(SourceError::CameraSupportDisabled)
}

#[cfg(feature = "camera")]
fn open_video(path: &Path, jpeg_quality: u8) -> Result<Box<dyn FrameSource>, SourceError> {
    let video = crate::camera::CameraSource::from_file(path, jpeg_quality)?;
    tracing::info!("Streaming video file {:?}", path);
    Ok(Box::new(video))
}

#[cfg(not(feature = "camera"))]
fn open_video(_path: &Path, _jpeg_quality: u8) -> Result<Box<dyn FrameSource>, SourceError> {
    Err(SourceError::CameraSupportDisabled)
}

/// Replays the images of a directory in file-name order.
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    jpeg_quality: u8,
    repeat: bool,
}

impl ImageDirSource {
    pub fn new(dir: &Path, jpeg_quality: u8, repeat: bool) -> Result<Self, SourceError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && ImageFormat::from_path(path).is_ok())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(SourceError::NoImages(dir.to_path_buf()));
        }

        Ok(Self {
            paths,
            next: 0,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            repeat,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.next >= self.paths.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }

        let path = &self.paths[self.next];
        self.next += 1;

        let image = image::open(path)?;
        encode_jpeg(image, self.jpeg_quality).map(Some)
    }
}

pub fn encode_jpeg(image: DynamicImage, quality: u8) -> Result<Vec<u8>, SourceError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}
