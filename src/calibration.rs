// src/calibration.rs - Per-image pixel to millimetre calibration

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::errors::{Result, SproutError};

/// Conversion factor resolved for one image
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEntry {
    pub image_id: String,
    pub mm_per_pixel: f64,
}

impl CalibrationEntry {
    /// Build an entry from a reference measurement: `pixel` pixels span
    /// `distance` millimetres. Both must be finite and positive.
    pub fn from_measurement(image_id: &str, pixel: f64, distance: f64) -> Result<Self> {
        if !pixel.is_finite() || !distance.is_finite() || pixel <= 0.0 || distance <= 0.0 {
            return Err(SproutError::Calibration(format!(
                "invalid calibration for '{}': pixel={}, distance={} (must be positive)",
                image_id, pixel, distance
            )));
        }

        Ok(Self {
            image_id: image_id.to_string(),
            mm_per_pixel: distance / pixel,
        })
    }
}

/// One row of the calibration CSV
#[derive(Debug, Clone, Deserialize)]
struct CalibrationRecord {
    file_name: String,
    pixel: f64,
    distance: f64,
}

/// Calibration rows keyed by image id (file name without extension).
///
/// Built once per batch and only read afterwards. Rows are validated when
/// resolved so one bad row only fails its own image.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    rows: HashMap<String, (f64, f64)>,
}

impl CalibrationTable {
    /// Load a calibration CSV with `file_name`, `pixel` and `distance` columns
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SproutError::InvalidPath(path.to_path_buf()));
        }

        log::debug!("Loading calibration CSV: {}", path.display());
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        log::info!("Loaded calibration for {} images", table.len());
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = HashMap::new();
        for record in csv_reader.deserialize() {
            let record: CalibrationRecord = record.map_err(|e| {
                SproutError::Calibration(format!("malformed calibration row: {}", e))
            })?;

            if rows.contains_key(&record.file_name) {
                log::warn!("Duplicate calibration row for '{}', keeping the first", record.file_name);
                continue;
            }
            rows.insert(record.file_name, (record.pixel, record.distance));
        }

        if rows.is_empty() {
            return Err(SproutError::Calibration("calibration CSV has no rows".to_string()));
        }

        Ok(Self { rows })
    }

    pub fn insert(&mut self, image_id: &str, pixel: f64, distance: f64) {
        self.rows.insert(image_id.to_string(), (pixel, distance));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Conversion factor for an image id
    pub fn resolve(&self, image_id: &str) -> Result<CalibrationEntry> {
        match self.rows.get(image_id) {
            Some(&(pixel, distance)) => {
                let entry = CalibrationEntry::from_measurement(image_id, pixel, distance)?;
                log::debug!("Calibration ratio for '{}': {:.6} mm/pixel", image_id, entry.mm_per_pixel);
                Ok(entry)
            }
            None => Err(SproutError::MissingCalibration(image_id.to_string())),
        }
    }

    /// Ids from `image_ids` that have no calibration row, in input order
    pub fn missing<'a, I>(&self, image_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        image_ids
            .into_iter()
            .filter(|id| !self.rows.contains_key(*id))
            .map(str::to_string)
            .collect()
    }
}
