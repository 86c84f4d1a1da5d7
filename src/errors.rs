use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for the sprout length pipeline
#[derive(Error, Debug)]
pub enum SproutError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("No calibration entry for image '{0}'")]
    MissingCalibration(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, SproutError>;
