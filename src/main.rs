use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use rayon::prelude::*;

use sprout_length_rust_lib::output::{write_batch_summary, write_image_results};
use sprout_length_rust_lib::{
    get_image_files_in_dir, validate_inputs, BatchInput, CalibrationTable, Config, ImageResult,
    Pipeline,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Sprout length measurement from calibrated photographs")]
struct Args {
    /// Path to an input image or a directory of images
    #[clap(short, long)]
    input: Option<String>,

    /// Path to the calibration CSV (file_name, pixel, distance)
    #[clap(long)]
    calibration: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file; defaults are used when it does not exist
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Write the default configuration to this path and exit
    #[clap(long)]
    init_config: Option<PathBuf>,

    /// Check inputs and calibration coverage without processing
    #[clap(long)]
    dry_run: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(path) = &args.init_config {
        Config::default()
            .save_to_file(path)
            .with_context(|| format!("writing default configuration to {}", path.display()))?;
        log::info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config).with_context(|| format!("loading {}", args.config))?
    } else {
        log::warn!("Configuration file {} not found, using defaults", args.config);
        Config::default()
    };

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }
    if let Some(calibration) = args.calibration.clone() {
        config.calibration_path = calibration;
    }
    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }

    config.validate()?;

    if args.dry_run {
        return dry_run(&config);
    }

    let start_time = Instant::now();

    let calibration = CalibrationTable::from_csv_path(&config.calibration_path)
        .with_context(|| format!("loading calibration from {}", config.calibration_path))?;

    let input_path = PathBuf::from(&config.input_path);
    let image_files = if input_path.is_file() {
        vec![input_path]
    } else if input_path.is_dir() {
        get_image_files_in_dir(&input_path)?
    } else {
        bail!("input path {} does not exist", input_path.display());
    };

    if image_files.is_empty() {
        bail!("no images found in {}", config.input_path);
    }
    log::info!("Found {} images to process", image_files.len());

    let output_base = PathBuf::from(&config.output_base_dir);
    fs::create_dir_all(&output_base)
        .with_context(|| format!("creating output directory {}", output_base.display()))?;

    let pipeline = Pipeline::new(config.clone())
        .with_progress_sink(|fraction: f64| log::debug!("Batch progress: {:.0}%", fraction * 100.0));

    let total = image_files.len();
    let done = AtomicUsize::new(0);
    let run = |path: &PathBuf| {
        let result = process_file(&pipeline, path, &calibration, &output_base);
        let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
        pipeline.report_progress(finished as f64 / total as f64);
        result
    };

    let results: Vec<ImageResult> = if config.use_parallel {
        image_files.par_iter().map(run).collect()
    } else {
        image_files.iter().map(run).collect()
    };

    let summary = pipeline.log_summary(&results);
    let summary_path = write_batch_summary(&results, &output_base)?;
    log::info!("Batch summary written to {}", summary_path.display());

    log::info!("Processing completed in {:.2} seconds", start_time.elapsed().as_secs_f64());

    if summary.failed > 0 {
        log::warn!("{} of {} images failed, see {}", summary.failed, summary.total, summary_path.display());
    }

    Ok(())
}

/// Load, measure and export one image
fn process_file(pipeline: &Pipeline, path: &Path, calibration: &CalibrationTable, output_base: &Path) -> ImageResult {
    log::info!("Processing: {}", path.display());
    let input = BatchInput::load(path);
    let result = pipeline.process_input(&input, calibration);

    if let Ok(image) = &input.image {
        if let Err(e) = write_image_results(&result, image, output_base, pipeline.config().save_masks) {
            log::error!("Failed to write results for {}: {}", result.image_id, e);
        }
    }

    result
}

fn dry_run(config: &Config) -> anyhow::Result<()> {
    let report = validate_inputs(&config.input_path, &config.calibration_path);

    for message in &report.info {
        log::info!("{}", message);
    }
    for message in &report.warnings {
        log::warn!("{}", message);
    }
    for message in &report.fatal {
        log::error!("{}", message);
    }

    if !report.is_ok() {
        bail!("validation failed with {} fatal error(s)", report.fatal.len());
    }

    log::info!("Validation passed, ready to process");
    Ok(())
}
