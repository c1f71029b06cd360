use clap::ValueEnum;
use image::{DynamicImage, imageops::FilterType};
use serde::{Deserialize, Serialize};

use crate::layout::PlacementResult;

/// Resampling filter used when scaling the watermark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Resize the watermark to the layout's target size and alpha-composite it
/// onto a copy of `base` at the layout's offset.
///
/// The watermark's alpha channel weights each pixel; opaque pixels replace
/// the base, transparent ones leave it untouched. The result keeps an alpha
/// channel only if the base had one.
pub fn apply(
    base: &DynamicImage,
    overlay: &DynamicImage,
    layout: &PlacementResult,
    filter: ResizeFilter,
) -> DynamicImage {
    let resized = overlay
        .resize_exact(layout.width, layout.height, filter.into())
        .to_rgba8();

    let mut canvas = base.to_rgba8();
    image::imageops::overlay(&mut canvas, &resized, layout.x as i64, layout.y as i64);

    if base.color().has_alpha() {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    }
}
