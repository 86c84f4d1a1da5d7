// src/pipeline.rs - Per-image measurement pipeline and batch driver

use image::{GrayImage, Luma, RgbImage};
use serde::Serialize;
use std::path::Path;

use crate::calibration::{CalibrationEntry, CalibrationTable};
use crate::config::Config;
use crate::errors::{Result, SproutError};
use crate::image_io::{image_id_for, load_image, InputImage};
use crate::image_utils::FOREGROUND;
use crate::measurement::{measure, SproutMeasurement};
use crate::path_algorithms::{extend_path_to_boundary, longest_path};
use crate::preprocessing::preprocess;
use crate::regions::{extract_regions, SproutRegion};
use crate::simplification::simplify;
use crate::skeleton::skeletonize_region;

/// Receives human-readable progress messages
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Receives the completed fraction of a batch, in `[0, 1]`
pub trait ProgressSink: Send + Sync {
    fn progress(&self, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn progress(&self, fraction: f64) {
        self(fraction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// Non-fatal observation made while analysing an image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Geometry produced for one sprout, all in image coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct SproutArtifacts {
    pub index: usize,
    pub contour: Vec<(u32, u32)>,
    pub centroid: (f64, f64),
    pub skeleton_points: Vec<(u32, u32)>,
    /// Longest skeleton path between two graph endpoints, before tip
    /// extension and simplification
    pub skeleton_path: Vec<(u32, u32)>,
    /// Simplified measurement path; empty when unmeasurable
    pub path: Vec<(u32, u32)>,
}

/// Everything computed for a successfully analysed image
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub measurements: Vec<SproutMeasurement>,
    pub sprouts: Vec<SproutArtifacts>,
    /// Cleaned binary mask the regions were extracted from
    pub mask: GrayImage,
    /// Union of all region skeletons, full image size
    pub skeleton_mask: GrayImage,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub enum ImageOutcome {
    Completed(ImageAnalysis),
    Failed { reason: String },
}

/// Result of processing one image of a batch
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub image_id: String,
    pub outcome: ImageOutcome,
}

impl ImageResult {
    pub fn failed(image_id: &str, reason: impl Into<String>) -> Self {
        Self {
            image_id: image_id.to_string(),
            outcome: ImageOutcome::Failed { reason: reason.into() },
        }
    }

    pub fn analysis(&self) -> Option<&ImageAnalysis> {
        match &self.outcome {
            ImageOutcome::Completed(analysis) => Some(analysis),
            ImageOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            ImageOutcome::Completed(_) => None,
            ImageOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.analysis().is_some()
    }
}

/// One image handed to a batch run. Loading may already have failed.
#[derive(Debug)]
pub struct BatchInput {
    pub image_id: String,
    pub image: Result<RgbImage>,
}

impl BatchInput {
    /// Load an image file, keeping a load failure for the batch to report
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let image_id = image_id_for(path).unwrap_or_else(|_| path.display().to_string());
        Self {
            image_id,
            image: load_image(path).map(|input| input.image),
        }
    }
}

impl From<InputImage> for BatchInput {
    fn from(input: InputImage) -> Self {
        Self {
            image_id: input.image_id,
            image: Ok(input.image),
        }
    }
}

/// Counts over a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub sprouts: usize,
    pub unmeasurable: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[ImageResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.analysis() {
                Some(analysis) => {
                    summary.completed += 1;
                    summary.sprouts += analysis.measurements.len();
                    summary.unmeasurable += analysis
                        .measurements
                        .iter()
                        .filter(|m| !m.measurable)
                        .count();
                }
                None => summary.failed += 1,
            }
        }
        summary
    }
}

/// Sprout length pipeline. Holds configuration and optional sinks only, so
/// one instance can serve any number of images, also from several threads.
pub struct Pipeline {
    config: Config,
    log_sink: Option<Box<dyn LogSink>>,
    progress_sink: Option<Box<dyn ProgressSink>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            log_sink: None,
            progress_sink: None,
        }
    }

    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Some(Box::new(sink));
        self
    }

    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress_sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send a message to the log sink, if any
    pub fn log(&self, message: &str) {
        if let Some(sink) = &self.log_sink {
            sink.log(message);
        }
    }

    /// Report batch progress, clamped to `[0, 1]`
    pub fn report_progress(&self, fraction: f64) {
        if let Some(sink) = &self.progress_sink {
            sink.progress(fraction.clamp(0.0, 1.0));
        }
    }

    /// Measure every sprout in one image
    pub fn process_image(&self, image: &RgbImage, calibration: &CalibrationEntry) -> ImageResult {
        let image_id = calibration.image_id.as_str();
        match self.analyze(image, calibration.mm_per_pixel) {
            Ok(analysis) => {
                let message = format!("Found {} sprouts in {}", analysis.measurements.len(), image_id);
                log::info!("{}", message);
                self.log(&message);
                ImageResult {
                    image_id: image_id.to_string(),
                    outcome: ImageOutcome::Completed(analysis),
                }
            }
            Err(e) => {
                let message = format!("Error processing {}: {}", image_id, e);
                log::error!("{}", message);
                self.log(&message);
                ImageResult::failed(image_id, e.to_string())
            }
        }
    }

    /// Resolve calibration for one batch input and process it
    pub fn process_input(&self, input: &BatchInput, calibration: &CalibrationTable) -> ImageResult {
        let image_id = input.image_id.as_str();

        let image = match &input.image {
            Ok(image) => image,
            Err(e) => {
                let message = format!("Error loading {}: {}", image_id, e);
                log::error!("{}", message);
                self.log(&message);
                return ImageResult::failed(image_id, e.to_string());
            }
        };

        match calibration.resolve(image_id) {
            Ok(entry) => self.process_image(image, &entry),
            Err(e) => {
                let message = format!("Skipping {}: {}", image_id, e);
                log::warn!("{}", message);
                self.log(&message);
                ImageResult::failed(image_id, e.to_string())
            }
        }
    }

    /// Process a batch in order. A failing image never stops the batch;
    /// progress is reported after every image.
    pub fn process_batch<I>(&self, inputs: I, calibration: &CalibrationTable) -> Vec<ImageResult>
    where
        I: IntoIterator<Item = BatchInput>,
        I::IntoIter: ExactSizeIterator,
    {
        let inputs = inputs.into_iter();
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);

        for (i, input) in inputs.enumerate() {
            let message = format!("Processing [{}/{}]: {}", i + 1, total, input.image_id);
            log::info!("{}", message);
            self.log(&message);

            results.push(self.process_input(&input, calibration));
            self.report_progress((i + 1) as f64 / total as f64);
        }

        self.log_summary(&results);
        results
    }

    /// Log the counts of a finished batch
    pub fn log_summary(&self, results: &[ImageResult]) -> BatchSummary {
        let summary = BatchSummary::from_results(results);
        let message = format!(
            "Processed {} images: {} completed, {} failed, {} sprouts measured ({} unmeasurable)",
            summary.total, summary.completed, summary.failed,
            summary.sprouts - summary.unmeasurable, summary.unmeasurable
        );
        log::info!("{}", message);
        self.log(&message);
        summary
    }

    fn analyze(&self, image: &RgbImage, mm_per_pixel: f64) -> Result<ImageAnalysis> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SproutError::InvalidImage(format!(
                "image has zero area ({}x{})", width, height
            )));
        }
        if !mm_per_pixel.is_finite() || mm_per_pixel <= 0.0 {
            return Err(SproutError::Calibration(format!(
                "conversion factor must be positive and finite, got {}", mm_per_pixel
            )));
        }

        let mut diagnostics = Vec::new();
        let config = &self.config;

        let preprocessed = preprocess(image, config)?;
        if preprocessed.threshold.degenerate {
            self.note(&mut diagnostics, DiagnosticLevel::Warning, format!(
                "image is nearly uniform, thresholded at fixed level {}",
                preprocessed.threshold.level
            ));
        }

        let regions = extract_regions(&preprocessed.mask, config);
        if regions.is_empty() {
            self.note(&mut diagnostics, DiagnosticLevel::Warning, "no sprouts detected".to_string());
        }

        let mut skeleton_mask = GrayImage::new(width, height);
        let mut measurements = Vec::with_capacity(regions.len());
        let mut sprouts = Vec::with_capacity(regions.len());

        for region in &regions {
            let (measurement, artifacts) = self.measure_region(region, mm_per_pixel, &mut diagnostics);
            for &(x, y) in &artifacts.skeleton_points {
                skeleton_mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
            measurements.push(measurement);
            sprouts.push(artifacts);
        }

        Ok(ImageAnalysis {
            measurements,
            sprouts,
            mask: preprocessed.mask,
            skeleton_mask,
            diagnostics,
        })
    }

    fn measure_region(
        &self,
        region: &SproutRegion,
        mm_per_pixel: f64,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (SproutMeasurement, SproutArtifacts) {
        let config = &self.config;
        let skeleton = skeletonize_region(region);
        let skeleton_points = skeleton.points();

        let skeleton_path = longest_path(&skeleton);
        let mut path = skeleton_path.clone();
        let measurement = if path.is_empty() {
            self.note(diagnostics, DiagnosticLevel::Warning, format!(
                "sprout {} has no measurable skeleton path ({} skeleton pixels)",
                region.index, skeleton_points.len()
            ));
            SproutMeasurement::unmeasurable(region.index)
        } else {
            if config.extend_path_to_boundary {
                path = extend_path_to_boundary(&path, region, config.boundary_extension_lookback);
            }
            path = simplify(&path, config.path_simplification_tolerance);
            let measurement = measure(region.index, &path, mm_per_pixel);
            log::debug!("Sprout {}: {:.2} px, {:.2} mm ({} path points)",
                region.index, measurement.pixel_length, measurement.physical_length, path.len());
            measurement
        };

        let artifacts = SproutArtifacts {
            index: region.index,
            contour: region.contour.clone(),
            centroid: region.centroid,
            skeleton_points,
            skeleton_path,
            path,
        };

        (measurement, artifacts)
    }

    fn note(&self, diagnostics: &mut Vec<Diagnostic>, level: DiagnosticLevel, message: String) {
        match level {
            DiagnosticLevel::Info => log::info!("{}", message),
            DiagnosticLevel::Warning => log::warn!("{}", message),
        }
        self.log(&message);
        diagnostics.push(Diagnostic { level, message });
    }
}
