use csv::Writer;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::image_io::{save_image, save_mask};
use crate::image_utils::FOREGROUND;
use crate::measurement::SproutMeasurement;
use crate::pipeline::{Diagnostic, ImageAnalysis, ImageResult};

/// Overlay colour for sprout boundaries
pub const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Overlay colour for measurement paths
pub const PATH_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Overlay colour for the label anchor of each sprout
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

#[derive(Debug, Serialize)]
struct IndexedPoints<'a> {
    index: usize,
    points: &'a [(u32, u32)],
}

#[derive(Debug, Serialize)]
struct Label {
    index: usize,
    text: String,
    position: (i32, i32),
}

/// Machine-readable overlay description of one image
#[derive(Debug, Serialize)]
struct OverlayData<'a> {
    image_id: &'a str,
    contours: Vec<IndexedPoints<'a>>,
    skeleton_points: Vec<IndexedPoints<'a>>,
    longest_paths: Vec<IndexedPoints<'a>>,
    skeleton_paths: Vec<IndexedPoints<'a>>,
    labels: Vec<Label>,
    measurements: &'a [SproutMeasurement],
    diagnostics: &'a [Diagnostic],
}

/// Output directory of one image
pub fn image_output_dir<P: AsRef<Path>>(output_base: P, image_id: &str) -> PathBuf {
    output_base.as_ref().join(image_id)
}

/// Write all artifacts of a completed image into `<output_base>/<image_id>/`.
/// Failed results produce no files.
pub fn write_image_results<P: AsRef<Path>>(
    result: &ImageResult,
    image: &RgbImage,
    output_base: P,
    save_masks: bool,
) -> Result<()> {
    let analysis = match result.analysis() {
        Some(analysis) => analysis,
        None => return Ok(()),
    };

    let image_id = result.image_id.as_str();
    let output_dir = image_output_dir(output_base, image_id);
    fs::create_dir_all(&output_dir)?;

    write_measurements_csv(&analysis.measurements, &output_dir, image_id)?;
    write_overlay_json(analysis, &output_dir, image_id)?;

    if save_masks {
        save_mask(&analysis.mask, output_dir.join(format!("mask_binary_{}.png", image_id)))?;
        save_mask(&analysis.skeleton_mask, output_dir.join(format!("mask_skeleton_{}.png", image_id)))?;
        let contours = contour_mask(analysis, image.width(), image.height());
        save_mask(&contours, output_dir.join(format!("mask_contour_{}.png", image_id)))?;
    }

    let overlay = render_measurement_overlay(image, analysis);
    save_image(&overlay, output_dir.join(format!("length_measurement_{}.png", image_id)))?;

    log::debug!("Saved results for {} to {}", image_id, output_dir.display());
    Ok(())
}

/// Write per-sprout lengths to `sprout_lengths_<image_id>.csv`
pub fn write_measurements_csv<P: AsRef<Path>>(
    measurements: &[SproutMeasurement],
    output_dir: P,
    image_id: &str,
) -> Result<PathBuf> {
    let output_path = output_dir.as_ref().join(format!("sprout_lengths_{}.csv", image_id));
    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record(["Sprout Number", "Pixels", "Millimeters", "Measurable"])?;
    for m in measurements {
        writer.write_record(&[
            m.index.to_string(),
            format!("{:.2}", m.pixel_length),
            format!("{:.2}", m.physical_length),
            m.measurable.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(output_path)
}

/// Write contours, skeletons, paths and labels to `overlay_data_<image_id>.json`
pub fn write_overlay_json<P: AsRef<Path>>(
    analysis: &ImageAnalysis,
    output_dir: P,
    image_id: &str,
) -> Result<PathBuf> {
    let output_path = output_dir.as_ref().join(format!("overlay_data_{}.json", image_id));

    let labels = analysis
        .sprouts
        .iter()
        .zip(analysis.measurements.iter())
        .map(|(sprout, m)| Label {
            index: sprout.index,
            text: format!("{}: {:.2} mm", sprout.index, m.physical_length),
            position: (sprout.centroid.0.round() as i32, sprout.centroid.1.round() as i32),
        })
        .collect();

    let overlay = OverlayData {
        image_id,
        contours: analysis
            .sprouts
            .iter()
            .map(|s| IndexedPoints { index: s.index, points: &s.contour })
            .collect(),
        skeleton_points: analysis
            .sprouts
            .iter()
            .map(|s| IndexedPoints { index: s.index, points: &s.skeleton_points })
            .collect(),
        longest_paths: analysis
            .sprouts
            .iter()
            .filter(|s| !s.skeleton_path.is_empty())
            .map(|s| IndexedPoints { index: s.index, points: &s.skeleton_path })
            .collect(),
        skeleton_paths: analysis
            .sprouts
            .iter()
            .filter(|s| !s.path.is_empty())
            .map(|s| IndexedPoints { index: s.index, points: &s.path })
            .collect(),
        labels,
        measurements: &analysis.measurements,
        diagnostics: &analysis.diagnostics,
    };

    let file = fs::File::create(&output_path)?;
    serde_json::to_writer_pretty(file, &overlay)?;
    Ok(output_path)
}

fn closed_segments(points: &[(u32, u32)]) -> impl Iterator<Item = ((f32, f32), (f32, f32))> + '_ {
    let n = points.len();
    (0..n).map(move |i| {
        let a = points[i];
        let b = points[(i + 1) % n];
        ((a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32))
    })
}

fn open_segments(points: &[(u32, u32)]) -> impl Iterator<Item = ((f32, f32), (f32, f32))> + '_ {
    points
        .windows(2)
        .map(|w| ((w[0].0 as f32, w[0].1 as f32), (w[1].0 as f32, w[1].1 as f32)))
}

/// Mask with every sprout boundary drawn as a closed outline
pub fn contour_mask(analysis: &ImageAnalysis, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for sprout in &analysis.sprouts {
        for (a, b) in closed_segments(&sprout.contour) {
            draw_line_segment_mut(&mut mask, a, b, Luma([FOREGROUND]));
        }
    }
    mask
}

/// Copy of the input with boundaries, measurement paths and label anchors drawn on top
pub fn render_measurement_overlay(image: &RgbImage, analysis: &ImageAnalysis) -> RgbImage {
    let mut overlay = image.clone();

    for sprout in &analysis.sprouts {
        for (a, b) in closed_segments(&sprout.contour) {
            draw_line_segment_mut(&mut overlay, a, b, CONTOUR_COLOR);
        }
        for (a, b) in open_segments(&sprout.path) {
            draw_line_segment_mut(&mut overlay, a, b, PATH_COLOR);
        }
        let anchor = (sprout.centroid.0.round() as i32, sprout.centroid.1.round() as i32);
        draw_filled_circle_mut(&mut overlay, anchor, 2, LABEL_COLOR);
    }

    overlay
}

/// Write one row per image to `<output_base>/summary.csv`
pub fn write_batch_summary<P: AsRef<Path>>(results: &[ImageResult], output_base: P) -> Result<PathBuf> {
    fs::create_dir_all(output_base.as_ref())?;
    let output_path = output_base.as_ref().join("summary.csv");
    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record(["Image", "Status", "Sprouts", "Measurable", "Total Millimeters", "Reason"])?;
    for result in results {
        let record = match result.analysis() {
            Some(analysis) => {
                let measurable = analysis.measurements.iter().filter(|m| m.measurable).count();
                let total_mm: f64 = analysis.measurements.iter().map(|m| m.physical_length).sum();
                [
                    result.image_id.clone(),
                    "completed".to_string(),
                    analysis.measurements.len().to_string(),
                    measurable.to_string(),
                    format!("{:.2}", total_mm),
                    String::new(),
                ]
            }
            None => [
                result.image_id.clone(),
                "failed".to_string(),
                "0".to_string(),
                "0".to_string(),
                "0.00".to_string(),
                result.failure_reason().unwrap_or_default().to_string(),
            ],
        };
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ImageOutcome, SproutArtifacts};

    fn square_analysis() -> ImageAnalysis {
        let contour = vec![(2, 2), (7, 2), (7, 7), (2, 7)];
        ImageAnalysis {
            measurements: vec![SproutMeasurement {
                index: 1,
                pixel_length: 5.0,
                physical_length: 0.5,
                measurable: true,
            }],
            sprouts: vec![SproutArtifacts {
                index: 1,
                contour,
                centroid: (4.5, 4.5),
                skeleton_points: vec![(4, 3), (4, 4), (4, 5)],
                skeleton_path: vec![(4, 3), (4, 4), (4, 5)],
                path: vec![(4, 2), (4, 7)],
            }],
            mask: GrayImage::new(10, 10),
            skeleton_mask: GrayImage::new(10, 10),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn contour_mask_draws_closed_outline() {
        let mask = contour_mask(&square_analysis(), 10, 10);
        assert_eq!(mask.get_pixel(2, 5)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(5, 7)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn overlay_uses_path_and_contour_colours() {
        let image = RgbImage::new(10, 10);
        let overlay = render_measurement_overlay(&image, &square_analysis());
        assert_eq!(*overlay.get_pixel(7, 3), CONTOUR_COLOR);
        // Paths are drawn over the boundary
        assert_eq!(*overlay.get_pixel(4, 2), PATH_COLOR);
        assert_eq!(*overlay.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn writes_csv_json_and_summary() {
        let dir = std::env::temp_dir().join(format!("sprout_output_test_{}", std::process::id()));
        let result = ImageResult {
            image_id: "plate".to_string(),
            outcome: ImageOutcome::Completed(square_analysis()),
        };
        let image = RgbImage::new(10, 10);

        write_image_results(&result, &image, &dir, true).unwrap();
        let image_dir = image_output_dir(&dir, "plate");

        let csv = fs::read_to_string(image_dir.join("sprout_lengths_plate.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Sprout Number,Pixels,Millimeters,Measurable"));
        assert_eq!(lines.next(), Some("1,5.00,0.50,true"));

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(image_dir.join("overlay_data_plate.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["contours"][0]["index"], 1);
        assert_eq!(json["skeleton_paths"][0]["points"][1][1], 7);
        assert_eq!(json["longest_paths"][0]["points"][0][1], 3);
        assert_eq!(json["longest_paths"][0]["points"][2][1], 5);
        assert_eq!(json["labels"][0]["text"], "1: 0.50 mm");

        for name in ["mask_binary_plate.png", "mask_skeleton_plate.png", "mask_contour_plate.png", "length_measurement_plate.png"] {
            assert!(image_dir.join(name).is_file(), "missing {}", name);
        }

        let failed = ImageResult::failed("other", "no calibration");
        let summary_path = write_batch_summary(&[result, failed], &dir).unwrap();
        let summary = fs::read_to_string(summary_path).unwrap();
        assert!(summary.contains("plate,completed,1,1,0.50,"));
        assert!(summary.contains("other,failed,0,0,0.00,no calibration"));

        let _ = fs::remove_dir_all(&dir);
    }
}
