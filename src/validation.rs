// src/validation.rs - Pre-flight checks of batch inputs

use std::path::Path;

use crate::calibration::CalibrationTable;
use crate::image_io::{get_image_files_in_dir, image_id_for};

/// Findings of a dry run, grouped by severity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Problems that make a batch run pointless
    pub fatal: Vec<String>,
    /// Issues that only affect some images
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.fatal.is_empty()
    }
}

/// Check that the image folder and calibration CSV can drive a batch,
/// without processing any image
pub fn validate_inputs<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, calibration_path: Q) -> ValidationReport {
    let mut report = ValidationReport::default();

    let images = match get_image_files_in_dir(input_dir.as_ref()) {
        Ok(images) if images.is_empty() => {
            report.fatal.push(format!("No images found in {}", input_dir.as_ref().display()));
            Vec::new()
        }
        Ok(images) => {
            report.info.push(format!("Found {} image(s) to process", images.len()));
            images
        }
        Err(e) => {
            report.fatal.push(format!("Cannot read image folder: {}", e));
            Vec::new()
        }
    };

    let table = match CalibrationTable::from_csv_path(calibration_path.as_ref()) {
        Ok(table) => {
            report.info.push(format!("Calibration CSV loaded with {} row(s)", table.len()));
            table
        }
        Err(e) => {
            report.fatal.push(format!("Cannot load calibration CSV: {}", e));
            return report;
        }
    };

    let ids: Vec<String> = images.iter().filter_map(|p| image_id_for(p).ok()).collect();
    let missing = table.missing(ids.iter().map(String::as_str));
    if !missing.is_empty() {
        report.warnings.push(format!(
            "Missing calibration for {} image(s): {}", missing.len(), missing.join(", ")
        ));
    }

    for id in ids.iter().filter(|id| !missing.contains(id)) {
        if let Err(e) = table.resolve(id) {
            report.warnings.push(e.to_string());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_folder_and_csv_are_fatal() {
        let report = validate_inputs("/no/such/folder", "/no/such/file.csv");
        assert!(!report.is_ok());
        assert_eq!(report.fatal.len(), 2);
    }

    #[test]
    fn uncalibrated_images_are_warnings() {
        let dir = std::env::temp_dir().join(format!("sprout_validation_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        image::RgbImage::new(4, 4).save(dir.join("a.png")).unwrap();
        image::RgbImage::new(4, 4).save(dir.join("b.png")).unwrap();
        let csv = dir.join("calibration.csv");
        fs::write(&csv, "file_name,pixel,distance\na,100,10\n").unwrap();

        let report = validate_inputs(&dir, &csv);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("b"));

        let _ = fs::remove_dir_all(&dir);
    }
}
