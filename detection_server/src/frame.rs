use image::{DynamicImage, RgbImage};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Empty image payload")]
    Empty,
    #[error("Unrecognised image format: {0}")]
    Format(#[from] std::io::Error),
    #[error("Error decoding image: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded image waiting for, or undergoing, detection.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Decodes JPEG/PNG (or any format `image` can sniff) from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let image = image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?;

        Ok(Self { image })
    }

    /// Uniform RGB noise, used for the start-up warm-up pass.
    pub fn random(width: u32, height: u32) -> Self {
        let mut rng = rand::rng();
        let pixels: Vec<u8> = (0..(width as usize * height as usize * 3))
            .map(|_| rng.random::<u8>())
            .collect();
        let buffer = RgbImage::from_raw(width, height, pixels)
            .unwrap_or_else(|| RgbImage::new(width, height));

        Self {
            image: DynamicImage::ImageRgb8(buffer),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}
