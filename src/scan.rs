use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{OverlayError, Result};
use crate::formats;

/// File stems that mark an image in the input directory as the watermark
pub const RESERVED_STEMS: [&str; 2] = ["overlay", "template"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Images to watermark, sorted by file name
    pub candidates: Vec<PathBuf>,
    /// Explicit watermark if one was given, otherwise the first reserved file found
    pub watermark: Option<PathBuf>,
}

fn stem_of(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

fn is_reserved(path: &Path) -> bool {
    stem_of(path)
        .map(|stem| RESERVED_STEMS.iter().any(|reserved| stem.eq_ignore_ascii_case(reserved)))
        .unwrap_or(false)
}

/// The source a prefixed file would have been written from, if the name carries the prefix
fn original_of(path: &Path, prefix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_prefix(prefix)?;
    (!prefix.is_empty() && !stripped.is_empty()).then(|| path.with_file_name(stripped))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// List the images directly inside `input` and work out which one is the
/// watermark.
///
/// `skip_prefix` excludes files produced by an earlier run so they are not
/// watermarked a second time.
pub fn scan_directory(
    input: &Path,
    explicit_watermark: Option<&Path>,
    skip_prefix: Option<&str>,
) -> Result<ScanResult> {
    info!("Scanning input folder {:?}", input);

    let mut candidates = Vec::new();
    let mut reserved = Vec::new();

    for entry in WalkDir::new(input)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            OverlayError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("failed to read {}", input.display()))
            }))
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || !formats::is_supported(path) {
            continue;
        }

        if is_reserved(path) {
            reserved.push(path.to_path_buf());
            continue;
        }

        if let Some(watermark) = explicit_watermark
            && same_file(path, watermark)
        {
            continue;
        }

        if let Some(prefix) = skip_prefix
            && let Some(original) = original_of(path, prefix)
            && original.is_file()
        {
            info!(
                "Skipping {:?}, it is the output for {:?}",
                path,
                original.file_name().unwrap_or_default()
            );
            continue;
        }

        candidates.push(path.to_path_buf());
    }

    let watermark = match explicit_watermark {
        Some(path) => Some(path.to_path_buf()),
        None => {
            if reserved.len() > 1 {
                warn!(
                    "Found {} watermark files, using {:?}",
                    reserved.len(),
                    reserved[0]
                );
            }
            reserved.into_iter().next()
        }
    };

    debug!("{} image candidates", candidates.len());
    Ok(ScanResult {
        candidates,
        watermark,
    })
}
