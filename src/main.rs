use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use overlay::{
    Anchor, BatchDriver, BatchOptions, Config, ConfigOverrides, ResizeFilter, formats,
    startup_checks,
};

/// Exit status when the batch ran but at least one image failed
const EXIT_PARTIAL_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Where to anchor the watermark on each image
    #[arg(short, long, value_enum)]
    position: Option<Anchor>,

    /// Watermark width as a fraction of the image width, in (0, 1]
    #[arg(short = 'w', long, value_parser = parse_fraction)]
    relative_width: Option<f64>,

    /// Watermark height as a fraction of the image height, in (0, 1]
    #[arg(short = 'H', long, value_parser = parse_fraction)]
    relative_height: Option<f64>,

    /// Directory containing the images to watermark
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Watermark image; defaults to overlay.* or template.* in the input directory
    #[arg(short = 'm', long)]
    watermark: Option<PathBuf>,

    /// Overwrite the original images instead of writing o_-prefixed copies
    #[arg(long)]
    in_place: bool,

    /// Number of images to process at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Resampling filter used to scale the watermark
    #[arg(long, value_enum)]
    filter: Option<ResizeFilter>,

    /// Optional TOML configuration file
    #[arg(short, long, default_value = "overlay.toml")]
    config: PathBuf,

    /// Enables debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            input: self.input.clone(),
            watermark: self.watermark.clone(),
            position: self.position,
            relative_width: self.relative_width,
            relative_height: self.relative_height,
            filter: self.filter,
            jobs: self.jobs,
            in_place: self.in_place,
        }
    }
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(fraction)
    } else {
        Err(format!("{fraction} is not in the range (0, 1]"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every image was handled without error
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    info!("overlay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if cli.config.exists() {
        info!("Configuration loaded from: {:?}", cli.config);
    } else {
        debug!("Config file not found at {:?}, using defaults", cli.config);
    }
    config.apply_overrides(cli.overrides());

    let resolved = match startup_checks::perform_startup_checks(&config) {
        Ok(resolved) => resolved,
        Err(errors) => {
            for e in &errors {
                error!("  - {}", e);
            }
            return Err(format!("{} startup check(s) failed", errors.len()).into());
        }
    };

    info!("Opening watermark {:?}", resolved.watermark);
    let watermark = formats::load(&resolved.watermark)
        .map_err(|e| format!("Failed to open watermark {:?}: {}", resolved.watermark, e))?;

    let options = BatchOptions::from_config(&config)?;
    info!(
        "Placing watermark at {} ({}), {}",
        options.anchor,
        describe_size(&config),
        if options.in_place {
            "overwriting originals".to_string()
        } else {
            format!("writing {}-prefixed copies", options.prefix)
        }
    );

    let driver = BatchDriver::new(options, watermark);
    let summary = driver.run(resolved.candidates).await;
    Ok(summary.is_success())
}

fn describe_size(config: &Config) -> String {
    match (
        config.watermark.relative_width,
        config.watermark.relative_height,
    ) {
        (Some(w), Some(h)) => format!("{w} x {h} of each image"),
        (Some(w), None) => format!("{w} of each image's width"),
        (None, Some(h)) => format!("{h} of each image's height"),
        (None, None) => "no size".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("0.2"), Ok(0.2));
        assert_eq!(parse_fraction("1"), Ok(1.0));
        assert!(parse_fraction("0").is_err());
        assert!(parse_fraction("1.01").is_err());
        assert!(parse_fraction("abc").is_err());
        assert!(parse_fraction("NaN").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "overlay", "-p", "br", "-w", "0.3", "-i", "photos", "-m", "logo.png", "--in-place",
            "-j", "4", "--filter", "nearest", "-v",
        ])
        .unwrap();

        assert_eq!(cli.position, Some(Anchor::BottomRight));
        assert_eq!(cli.relative_width, Some(0.3));
        assert_eq!(cli.relative_height, None);
        assert_eq!(cli.input, Some(PathBuf::from("photos")));
        assert_eq!(cli.watermark, Some(PathBuf::from("logo.png")));
        assert!(cli.in_place);
        assert_eq!(cli.jobs, Some(4));
        assert_eq!(cli.filter, Some(ResizeFilter::Nearest));
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("overlay.toml"));
    }

    #[test]
    fn test_cli_rejects_out_of_range_fraction() {
        assert!(Cli::try_parse_from(["overlay", "-H", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["overlay", "--position", "middle"]).is_err());
    }

    #[test]
    fn test_long_position_names() {
        let cli = Cli::try_parse_from(["overlay", "--position", "center", "-H", "0.1"]).unwrap();
        assert_eq!(cli.position, Some(Anchor::Center));
        assert_eq!(cli.relative_height, Some(0.1));
    }
}
