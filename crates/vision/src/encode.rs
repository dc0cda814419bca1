use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage};

use fatura_core::ImageSection;

use crate::VisionError;

/// Decode `data`, convert to RGB, shrink to fit the configured bounds (aspect kept),
/// JPEG-encode at the configured quality and return the base64 text.
pub fn prepare_for_vision(data: &[u8], image: &ImageSection) -> Result<String, VisionError> {
    let img = image::load_from_memory(data)?;
    let jpeg = encode_jpeg(img, image)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
}

fn encode_jpeg(img: DynamicImage, section: &ImageSection) -> Result<Vec<u8>, VisionError> {
    let img = if img.width() > section.max_width || img.height() > section.max_height {
        img.resize(section.max_width, section.max_height, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, section.jpeg_quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

/// `data:` URL for a base64 JPEG, as accepted by chat-completions image parts.
pub fn jpeg_data_url(base64_jpeg: &str) -> String {
    format!("data:image/jpeg;base64,{base64_jpeg}")
}
