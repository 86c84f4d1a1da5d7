use std::fs;
use std::path::{Path, PathBuf};
use image::{GrayImage, ImageFormat, RgbImage};

use crate::errors::{SproutError, Result};

/// File extensions accepted as input photographs
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Represents an input image with its metadata
#[derive(Debug, Clone)]
pub struct InputImage {
    pub image: RgbImage,
    pub path: PathBuf,
    /// File name without extension, used as the calibration key
    pub image_id: String,
}

/// Whether a path has one of the supported image extensions
pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|&s| s == ext)
        })
        .unwrap_or(false)
}

/// Get all supported image files directly inside a directory, sorted by path
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(SproutError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(SproutError::Config(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let mut image_files = Vec::new();
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            image_files.push(path);
        }
    }
    image_files.sort();

    Ok(image_files)
}

/// Image id of a path: the file name without its extension
pub fn image_id_for<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| SproutError::InvalidPath(path.to_path_buf()))
}

/// Load an image as 8-bit RGB
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();
    let image_id = image_id_for(path)?;

    let image = image::open(path)?.to_rgb8();

    Ok(InputImage {
        image,
        path: path.to_path_buf(),
        image_id,
    })
}

/// Save a binary mask as PNG
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<()> {
    mask.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save an RGB image as PNG
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_image("a/sprout_01.JPG"));
        assert!(is_supported_image("sprout.tiff"));
        assert!(!is_supported_image("notes.txt"));
        assert!(!is_supported_image("no_extension"));
    }

    #[test]
    fn image_id_drops_extension() {
        assert_eq!(image_id_for("data/plate_3.png").unwrap(), "plate_3");
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(matches!(
            get_image_files_in_dir("/definitely/not/here"),
            Err(SproutError::InvalidPath(_))
        ));
    }
}
