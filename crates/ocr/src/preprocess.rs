use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use std::io::Cursor;
use thiserror::Error;

use fatura_core::ImageSection;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Largest dimensions an image is allowed to keep before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self::from(&ImageSection::default())
    }
}

impl From<&ImageSection> for ImageLimits {
    fn from(section: &ImageSection) -> Self {
        Self { max_width: section.max_width, max_height: section.max_height }
    }
}

/// Process raw image bytes (JPEG / PNG / BMP / TIFF) and return normalized PNG bytes.
pub fn prepare_for_ocr_from_bytes(
    data: &[u8],
    limits: ImageLimits,
) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img, limits))
}

/// Decode and re-encode as PNG without touching pixels, for when preprocessing is off.
pub fn reencode_png(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(img)
}

/// Downscale, grayscale, contrast stretch, then binarise with Otsu's threshold.
fn normalize(img: DynamicImage, limits: ImageLimits) -> DynamicImage {
    let img = fit_within(img, limits);
    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        // Uniform image, nothing to stretch or threshold.
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    let threshold = otsu_level(&stretched);
    let binary: GrayImage = ImageBuffer::from_fn(stretched.width(), stretched.height(), |x, y| {
        if stretched.get_pixel(x, y)[0] > threshold { Luma([255]) } else { Luma([0]) }
    });

    DynamicImage::ImageLuma8(binary)
}

fn fit_within(img: DynamicImage, limits: ImageLimits) -> DynamicImage {
    if img.width() > limits.max_width || img.height() > limits.max_height {
        img.resize(limits.max_width, limits.max_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    }
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
