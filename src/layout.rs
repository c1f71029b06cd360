use clap::ValueEnum;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OverlayError, Result};

/// Absorbs binary floating point error before truncating, so that
/// `0.29 * 100.0` lands on 29 rather than 28.
const TRUNCATION_TOLERANCE: f64 = 1e-9;

/// Named position on the base image the watermark is aligned to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    #[value(alias = "tl")]
    #[serde(alias = "tl")]
    TopLeft,
    #[value(alias = "t")]
    #[serde(alias = "t")]
    Top,
    #[value(alias = "tr")]
    #[serde(alias = "tr")]
    TopRight,
    #[value(alias = "r")]
    #[serde(alias = "r")]
    Right,
    #[value(alias = "br")]
    #[serde(alias = "br")]
    BottomRight,
    #[value(alias = "b")]
    #[serde(alias = "b")]
    Bottom,
    #[value(alias = "bl")]
    #[serde(alias = "bl")]
    BottomLeft,
    #[value(alias = "l")]
    #[serde(alias = "l")]
    Left,
    #[value(alias = "c")]
    #[serde(alias = "c")]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Middle,
    End,
}

impl Align {
    fn offset(self, space: u32, size: u32) -> u32 {
        // Clamped so the overlay never starts outside the base
        let room = space.saturating_sub(size);
        match self {
            Align::Start => 0,
            Align::Middle => room / 2,
            Align::End => room,
        }
    }
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::Top,
        Anchor::TopRight,
        Anchor::Right,
        Anchor::BottomRight,
        Anchor::Bottom,
        Anchor::BottomLeft,
        Anchor::Left,
        Anchor::Center,
    ];

    fn horizontal(self) -> Align {
        match self {
            Anchor::TopLeft | Anchor::Left | Anchor::BottomLeft => Align::Start,
            Anchor::Top | Anchor::Center | Anchor::Bottom => Align::Middle,
            Anchor::TopRight | Anchor::Right | Anchor::BottomRight => Align::End,
        }
    }

    fn vertical(self) -> Align {
        match self {
            Anchor::TopLeft | Anchor::Top | Anchor::TopRight => Align::Start,
            Anchor::Left | Anchor::Center | Anchor::Right => Align::Middle,
            Anchor::BottomLeft | Anchor::Bottom | Anchor::BottomRight => Align::End,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Anchor::TopLeft => "top-left",
            Anchor::Top => "top",
            Anchor::TopRight => "top-right",
            Anchor::Right => "right",
            Anchor::BottomRight => "bottom-right",
            Anchor::Bottom => "bottom",
            Anchor::BottomLeft => "bottom-left",
            Anchor::Left => "left",
            Anchor::Center => "center",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of<I: GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

/// Watermark size expressed as fractions of the base image's dimensions.
///
/// When only one fraction is given the other dimension follows the
/// watermark's own aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelativeSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl RelativeSize {
    pub fn new(width: Option<f64>, height: Option<f64>) -> Result<Self> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    pub fn width(fraction: f64) -> Result<Self> {
        Self::new(Some(fraction), None)
    }

    pub fn height(fraction: f64) -> Result<Self> {
        Self::new(None, Some(fraction))
    }

    pub fn validate(&self) -> Result<()> {
        if self.width.is_none() && self.height.is_none() {
            return Err(OverlayError::Configuration(
                "please specify at least one of relative-width, relative-height".to_string(),
            ));
        }
        for (name, fraction) in [("relative-width", self.width), ("relative-height", self.height)] {
            if let Some(value) = fraction
                && !(value.is_finite() && value > 0.0 && value <= 1.0)
            {
                return Err(OverlayError::Configuration(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRequest {
    pub base: Dimensions,
    pub overlay: Dimensions,
    pub anchor: Anchor,
    pub relative: RelativeSize,
}

impl PlacementRequest {
    pub fn compute(&self) -> Result<PlacementResult> {
        compute_layout(self.base, self.overlay, self.anchor, self.relative)
    }
}

/// Target size of the resized watermark and its top-left corner on the base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementResult {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Compute the watermark's target size and placement on a base image.
pub fn compute_layout(
    base: Dimensions,
    overlay: Dimensions,
    anchor: Anchor,
    relative: RelativeSize,
) -> Result<PlacementResult> {
    relative.validate()?;

    for (dimension, value) in [
        ("base width", base.width),
        ("base height", base.height),
        ("overlay width", overlay.width),
        ("overlay height", overlay.height),
    ] {
        if value == 0 {
            return Err(OverlayError::validation(dimension, value));
        }
    }

    let aspect_ratio = overlay.width as f64 / overlay.height as f64;

    let (target_width, target_height) = match (relative.width, relative.height) {
        (Some(rw), Some(rh)) => (rw * base.width as f64, rh * base.height as f64),
        (Some(rw), None) => {
            let width = rw * base.width as f64;
            (width, width / aspect_ratio)
        }
        (None, Some(rh)) => {
            let height = rh * base.height as f64;
            (aspect_ratio * height, height)
        }
        (None, None) => {
            return Err(OverlayError::Configuration(
                "no relative size given".to_string(),
            ));
        }
    };

    // A single fraction can derive the other side past the base edge
    let fit = (base.width as f64 / target_width)
        .min(base.height as f64 / target_height)
        .min(1.0);
    let (target_width, target_height) = (target_width * fit, target_height * fit);

    let width = to_pixels("overlay target width", target_width)?;
    let height = to_pixels("overlay target height", target_height)?;

    Ok(PlacementResult {
        width,
        height,
        x: anchor.horizontal().offset(base.width, width),
        y: anchor.vertical().offset(base.height, height),
    })
}

fn to_pixels(dimension: &'static str, value: f64) -> Result<u32> {
    let truncated = (value + TRUNCATION_TOLERANCE).floor();
    if truncated < 1.0 {
        return Err(OverlayError::validation(dimension, truncated as i64));
    }
    u32::try_from(truncated as i64).map_err(|_| OverlayError::validation(dimension, truncated as i64))
}
