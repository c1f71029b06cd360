use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod batch;
pub mod compositor;
pub mod error;
pub mod formats;
pub mod layout;
pub mod scan;
pub mod startup_checks;

pub use batch::{BatchDriver, BatchOptions, BatchSummary};
pub use compositor::{ResizeFilter, apply};
pub use error::{OverlayError, Result};
pub use layout::{
    Anchor, Dimensions, PlacementRequest, PlacementResult, RelativeSize, compute_layout,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory whose images get watermarked
    pub input: PathBuf,
    /// Number of images processed at once
    pub jobs: usize,
    pub watermark: WatermarkConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Explicit watermark file; when unset the input directory is searched
    /// for an `overlay.*` or `template.*` image
    pub path: Option<PathBuf>,
    pub position: Anchor,
    pub relative_width: Option<f64>,
    pub relative_height: Option<f64>,
    pub filter: ResizeFilter,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Overwrite the originals instead of writing prefixed siblings
    pub in_place: bool,
    pub prefix: String,
    pub jpeg_quality: u8,
    pub webp_quality: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            jobs: 1,
            watermark: WatermarkConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            in_place: false,
            prefix: "o_".to_string(),
            jpeg_quality: 85,
            webp_quality: 85.0,
        }
    }
}

/// Values given on the command line, which win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<PathBuf>,
    pub watermark: Option<PathBuf>,
    pub position: Option<Anchor>,
    pub relative_width: Option<f64>,
    pub relative_height: Option<f64>,
    pub filter: Option<ResizeFilter>,
    pub jobs: Option<usize>,
    pub in_place: bool,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml_edit::de::from_str::<Config>(content)
            .map_err(|e| OverlayError::Configuration(format!("invalid config file: {e}")))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if let Some(path) = overrides.watermark {
            self.watermark.path = Some(path);
        }
        if let Some(position) = overrides.position {
            self.watermark.position = position;
        }
        if let Some(width) = overrides.relative_width {
            self.watermark.relative_width = Some(width);
        }
        if let Some(height) = overrides.relative_height {
            self.watermark.relative_height = Some(height);
        }
        if let Some(filter) = overrides.filter {
            self.watermark.filter = filter;
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        if overrides.in_place {
            self.output.in_place = true;
        }
    }

    pub fn relative_size(&self) -> Result<RelativeSize> {
        RelativeSize::new(self.watermark.relative_width, self.watermark.relative_height)
    }

    pub fn encode_options(&self) -> formats::EncodeOptions {
        formats::EncodeOptions {
            jpeg_quality: self.output.jpeg_quality,
            webp_quality: self.output.webp_quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.input, PathBuf::from("."));
        assert_eq!(config.jobs, 1);
        assert_eq!(config.watermark.position, Anchor::TopLeft);
        assert_eq!(config.watermark.filter, ResizeFilter::Lanczos3);
        assert!(!config.output.in_place);
        assert_eq!(config.output.prefix, "o_");
        assert!(matches!(
            config.relative_size(),
            Err(OverlayError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
input = "photos"
jobs = 4

[watermark]
path = "logo.png"
position = "br"
relative_width = 0.25
filter = "catmull-rom"

[output]
in_place = true
jpeg_quality = 92
"#,
        )
        .unwrap();

        assert_eq!(config.input, PathBuf::from("photos"));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.watermark.path, Some(PathBuf::from("logo.png")));
        assert_eq!(config.watermark.position, Anchor::BottomRight);
        assert_eq!(config.watermark.filter, ResizeFilter::CatmullRom);
        assert!(config.output.in_place);
        assert_eq!(config.output.prefix, "o_");
        assert_eq!(config.encode_options().jpeg_quality, 92);
        assert_eq!(config.encode_options().webp_quality, 85.0);
        assert_eq!(
            config.relative_size().unwrap(),
            RelativeSize {
                width: Some(0.25),
                height: None,
            }
        );
    }

    #[test]
    fn test_long_anchor_names_in_config() {
        let config = Config::from_toml("[watermark]\nposition = \"bottom-left\"\n").unwrap();
        assert_eq!(config.watermark.position, Anchor::BottomLeft);
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        let result = Config::from_toml("[watermark]\nposition = \"middle\"\n");
        assert!(matches!(result, Err(OverlayError::Configuration(_))));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::from_toml(
            "[watermark]\nposition = \"c\"\nrelative_width = 0.5\n",
        )
        .unwrap();

        config.apply_overrides(ConfigOverrides {
            input: Some(PathBuf::from("elsewhere")),
            position: Some(Anchor::Top),
            relative_height: Some(0.1),
            jobs: Some(3),
            in_place: true,
            ..Default::default()
        });

        assert_eq!(config.input, PathBuf::from("elsewhere"));
        assert_eq!(config.watermark.position, Anchor::Top);
        assert_eq!(config.watermark.relative_width, Some(0.5));
        assert_eq!(config.watermark.relative_height, Some(0.1));
        assert_eq!(config.jobs, 3);
        assert!(config.output.in_place);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("overlay.toml")).unwrap();
        assert_eq!(config.output.jpeg_quality, 85);
    }
}
