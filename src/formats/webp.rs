use image::DynamicImage;
use tracing::debug;

use crate::error::{OverlayError, Result};

/// Encode an image as lossy WebP, keeping the alpha channel when there is one
pub fn encode(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(OverlayError::Encode(format!(
            "cannot encode a {width}x{height} image as WebP"
        )));
    }

    let quality = quality.clamp(0.0, 100.0);
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality)
    }
    .map_err(|e| OverlayError::Encode(format!("WebP encoding of {width}x{height} image failed: {e:?}")))?;

    debug!("WebP encoded at quality {}: {} bytes", quality, encoded.len());
    Ok(encoded.to_vec())
}
