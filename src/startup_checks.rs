use crate::Config;
use crate::scan::{self, ScanResult};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Input directory does not exist: {0:?}")]
    InputDirectoryMissing(PathBuf),

    #[error("Input path is not a directory: {0:?}")]
    InputNotADirectory(PathBuf),

    #[error("Watermark file does not exist: {0:?}")]
    WatermarkMissing(PathBuf),

    #[error("Watermark path is not a file: {0:?}")]
    WatermarkNotAFile(PathBuf),

    #[error(
        "No watermark found: pass --watermark or put an overlay.* or template.* image in {0:?}"
    )]
    OverlayUnresolved(PathBuf),

    #[error("{0}")]
    Configuration(String),

    #[error("Failed to scan input directory: {0}")]
    ScanFailed(#[from] crate::OverlayError),
}

/// Everything the batch needs once the checks have passed
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub watermark: PathBuf,
    pub candidates: Vec<PathBuf>,
}

/// Validate the configuration and resolve the watermark and candidate list,
/// reporting every problem found rather than only the first.
pub fn perform_startup_checks(config: &Config) -> Result<ResolvedRun, Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    if let Err(e) = config.relative_size() {
        error!("{}", e);
        errors.push(StartupCheckError::Configuration(e.to_string()));
    }

    if config.jobs == 0 {
        error!("jobs must be at least 1");
        errors.push(StartupCheckError::Configuration(
            "jobs must be at least 1".to_string(),
        ));
    }

    let explicit_watermark = config.watermark.path.as_deref();
    if let Some(path) = explicit_watermark {
        if !path.exists() {
            error!("Watermark file does not exist: {:?}", path);
            errors.push(StartupCheckError::WatermarkMissing(path.to_path_buf()));
        } else if !path.is_file() {
            error!("Watermark path is not a file: {:?}", path);
            errors.push(StartupCheckError::WatermarkNotAFile(path.to_path_buf()));
        } else {
            info!("Watermark file exists: {:?}", path);
        }
    }

    let input = &config.input;
    let scan = if !input.exists() {
        error!("Input directory does not exist: {:?}", input);
        errors.push(StartupCheckError::InputDirectoryMissing(input.clone()));
        None
    } else if !input.is_dir() {
        error!("Input path is not a directory: {:?}", input);
        errors.push(StartupCheckError::InputNotADirectory(input.clone()));
        None
    } else {
        info!("Input directory exists: {:?}", input);
        let skip_prefix = (!config.output.in_place).then_some(config.output.prefix.as_str());
        match scan::scan_directory(input, explicit_watermark, skip_prefix) {
            Ok(scan) => Some(scan),
            Err(e) => {
                error!("Failed to scan input directory {:?}: {}", input, e);
                errors.push(StartupCheckError::ScanFailed(e));
                None
            }
        }
    };

    // Only worth reporting when the directory could actually be searched
    if let Some(ScanResult {
        watermark: None, ..
    }) = &scan
    {
        error!("No watermark file could be resolved in {:?}", input);
        errors.push(StartupCheckError::OverlayUnresolved(input.clone()));
    }

    match (errors.is_empty(), scan) {
        (
            true,
            Some(ScanResult {
                candidates,
                watermark: Some(watermark),
            }),
        ) => {
            if candidates.is_empty() {
                warn!("No images to watermark in {:?}", input);
            }
            info!("All startup checks passed");
            Ok(ResolvedRun {
                watermark,
                candidates,
            })
        }
        _ => {
            error!("Startup checks failed with {} errors", errors.len());
            Err(errors)
        }
    }
}
