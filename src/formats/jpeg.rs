use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder};
use tracing::debug;

use crate::error::Result;

/// Encode an image as JPEG at the given quality
pub fn encode(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = image.to_rgb8();
    let mut bytes = Vec::new();

    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    debug!("JPEG encoded at quality {}: {} bytes", quality, bytes.len());
    Ok(bytes)
}
