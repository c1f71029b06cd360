use image::DynamicImage;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

use crate::compositor::{self, ResizeFilter};
use crate::error::{OverlayError, Result};
use crate::formats::{self, EncodeOptions, Saved, WriteMode};
use crate::layout::{Anchor, Dimensions, RelativeSize, compute_layout};
use crate::Config;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub anchor: Anchor,
    pub relative: RelativeSize,
    pub filter: ResizeFilter,
    pub in_place: bool,
    pub prefix: String,
    pub encode: EncodeOptions,
    pub jobs: usize,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            anchor: config.watermark.position,
            relative: config.relative_size()?,
            filter: config.watermark.filter,
            in_place: config.output.in_place,
            prefix: config.output.prefix.clone(),
            encode: config.encode_options(),
            jobs: config.jobs.max(1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The watermarked image was written to this path
    Written(PathBuf),
    /// The destination already existed
    Skipped(PathBuf),
}

#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: OverlayError,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, source: PathBuf, outcome: Result<Outcome>) {
        match outcome {
            Ok(Outcome::Written(destination)) => {
                info!("Watermarked {:?} -> {:?}", source, destination);
                self.written.push(destination);
            }
            Ok(Outcome::Skipped(destination)) => {
                debug!("Skipping {:?} because {:?} exists", source, destination);
                self.skipped.push(source);
            }
            Err(e) => {
                error!("Failed to watermark {:?}: {}", source, e);
                self.failures.push(BatchFailure {
                    path: source,
                    error: e,
                });
            }
        }
    }
}

/// Applies one decoded watermark to a list of images.
///
/// Every image is processed on its own; a failure is recorded in the
/// summary and the rest of the batch carries on.
pub struct BatchDriver {
    options: Arc<BatchOptions>,
    watermark: Arc<DynamicImage>,
}

impl BatchDriver {
    pub fn new(options: BatchOptions, watermark: DynamicImage) -> Self {
        Self {
            options: Arc::new(options),
            watermark: Arc::new(watermark),
        }
    }

    /// Watermark a single image synchronously
    pub fn process_one(&self, source: &Path) -> Result<Outcome> {
        process_image(source, &self.options, &self.watermark)
    }

    pub async fn run(&self, candidates: Vec<PathBuf>) -> BatchSummary {
        let span = info_span!("batch", candidates = candidates.len(), jobs = self.options.jobs);
        self.run_inner(candidates).instrument(span).await
    }

    async fn run_inner(&self, candidates: Vec<PathBuf>) -> BatchSummary {
        let semaphore = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let mut tasks = JoinSet::new();
        let mut summary = BatchSummary::default();

        for source in candidates {
            // Waiting here keeps at most `jobs` decoded images in memory
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let options = self.options.clone();
            let watermark = self.watermark.clone();
            let span = tracing::Span::current();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let _entered = span.enter();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    process_image(&source, &options, &watermark)
                }))
                .unwrap_or_else(|panic| Err(OverlayError::Panicked(panic_message(&*panic))));
                (source, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, outcome)) => summary.record(source, outcome),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        summary.written.sort();
        summary.skipped.sort();
        summary.failures.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Batch finished: {} written, {} skipped, {} failed",
            summary.written.len(),
            summary.skipped.len(),
            summary.failures.len()
        );
        for failure in &summary.failures {
            error!("  {:?}: {}", failure.path, failure.error);
        }

        summary
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Read, resize, composite and write one image
fn process_image(
    source: &Path,
    options: &BatchOptions,
    watermark: &DynamicImage,
) -> Result<Outcome> {
    let (destination, mode) = if options.in_place {
        (source.to_path_buf(), WriteMode::Overwrite)
    } else {
        (formats::output_path(source, &options.prefix)?, WriteMode::CreateNew)
    };

    if mode == WriteMode::CreateNew && destination.exists() {
        return Ok(Outcome::Skipped(destination));
    }

    let base = formats::load(source)?;
    let layout = compute_layout(
        Dimensions::of(&base),
        Dimensions::of(watermark),
        options.anchor,
        options.relative,
    )?;
    debug!(
        "Placing {}x{} watermark at ({}, {}) on {:?}",
        layout.width, layout.height, layout.x, layout.y, source
    );

    let result = compositor::apply(&base, watermark, &layout, options.filter);

    match formats::save_atomic(&result, &destination, source, mode, &options.encode)? {
        Saved::Written => Ok(Outcome::Written(destination)),
        Saved::AlreadyExists => Ok(Outcome::Skipped(destination)),
    }
}
