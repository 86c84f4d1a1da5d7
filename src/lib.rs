// src/lib.rs - Library interface for the sprout length pipeline

pub mod calibration;
pub mod config;
pub mod errors;
pub mod image_io;
pub mod image_utils;
pub mod measurement;
pub mod morphology;
pub mod output;
pub mod path_algorithms;
pub mod pipeline;
pub mod preprocessing;
pub mod regions;
pub mod simplification;
pub mod skeleton;
pub mod validation;

// Re-export commonly used types and functions
pub use errors::{SproutError, Result};
pub use config::{Config, MorphologyShape};
pub use calibration::{CalibrationEntry, CalibrationTable};
pub use image_io::{InputImage, get_image_files_in_dir, load_image};
pub use measurement::{SproutMeasurement, measure};
pub use pipeline::{
    BatchInput,
    BatchSummary,
    Diagnostic,
    DiagnosticLevel,
    ImageAnalysis,
    ImageOutcome,
    ImageResult,
    LogSink,
    Pipeline,
    ProgressSink,
    SproutArtifacts,
};

// Re-export the individual pipeline stages
pub use preprocessing::{mean_shift_smooth, preprocess, Preprocessed, ThresholdOutcome};
pub use regions::{extract_regions, BoundingBox, SproutRegion};
pub use skeleton::{skeletonize, skeletonize_region, SkeletonMask};
pub use path_algorithms::{extend_path_to_boundary, longest_path, path_length, SkeletonGraph};
pub use simplification::simplify;
pub use validation::{validate_inputs, ValidationReport};
