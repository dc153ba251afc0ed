//! Image decoding and normalisation into encoder input.

use crate::error::{CaptionError, Result};
use crate::tensor::Tensor;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage};
use rayon::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// ImageNet channel means.
pub const IMAGE_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGE_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Where the image to caption comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, BMP, ...), e.g. a screenshot.
    Bytes(Vec<u8>),
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::Bytes(bytes.to_vec())
    }
}

/// Decode an image source, sniffing the format from its content.
pub fn load_image(source: &ImageSource) -> Result<DynamicImage> {
    let decoded = match source {
        ImageSource::Path(path) => ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| CaptionError::ImageDecode(format!("{}: {e}", path.display())))?
            .decode(),
        ImageSource::Bytes(bytes) => ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| CaptionError::ImageDecode(e.to_string()))?
            .decode(),
    };
    decoded.map_err(|e| CaptionError::ImageDecode(e.to_string()))
}

/// Resize and normalise an image to a `(1, 3, size, size)` pixel tensor.
pub fn preprocess_image(image: &DynamicImage, size: u32) -> Result<Tensor> {
    if size == 0 {
        return Err(CaptionError::Configuration("target image size must be > 0".into()));
    }
    let rgb: RgbImage = image.to_rgb8();
    let resized = if rgb.dimensions() == (size, size) {
        rgb
    } else {
        imageops::resize(&rgb, size, size, FilterType::Lanczos3)
    };

    let side = size as usize;
    let plane = side * side;
    let pixels = resized.as_raw();
    let mut data = vec![0.0f32; 3 * plane];

    // HWC -> CHW, one channel plane per task
    data.par_chunks_mut(plane)
        .enumerate()
        .for_each(|(c, out)| {
            for (i, v) in out.iter_mut().enumerate() {
                let x = f32::from(pixels[i * 3 + c]) / 255.0;
                *v = ((f64::from(x) - IMAGE_MEAN[c]) / IMAGE_STD[c]) as f32;
            }
        });

    Tensor::new(vec![1, 3, side, side], data)
}

/// Decode `source` and build the encoder input for `size`.
pub fn prepare(source: &ImageSource, size: u32) -> Result<Tensor> {
    let image = load_image(source)?;
    preprocess_image(&image, size)
}
