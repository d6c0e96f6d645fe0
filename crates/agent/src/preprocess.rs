// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::fs;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use model_runtime::{InputTensor, INPUT_HEIGHT, INPUT_WIDTH};
use thiserror::Error;

/// ImageNet per-channel mean, RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet per-channel standard deviation, RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("unsupported image format: {channels} channel(s) cannot be mapped to RGB")]
    UnsupportedFormat { channels: u8 },
}

/// read and preprocess an image file. an unreadable file counts as a
/// decode failure; the format is sniffed from content, not the extension.
pub fn preprocess_path(path: &Path) -> Result<InputTensor, PreprocessError> {
    let bytes = fs::read(path)
        .map_err(|e| PreprocessError::ImageDecode(format!("{}: {e}", path.display())))?;
    preprocess_bytes(&bytes)
}

pub fn preprocess_bytes(bytes: &[u8]) -> Result<InputTensor, PreprocessError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| PreprocessError::ImageDecode(e.to_string()))?;
    preprocess(&image)
}

/// preprocess an undecoded 8-bit frame, samples interleaved row by row.
/// grey, grey+alpha, RGB and RGBA map to RGB; any other channel count is
/// unsupported.
pub fn preprocess_pixels(
    width: u32,
    height: u32,
    channels: u8,
    data: &[u8],
) -> Result<InputTensor, PreprocessError> {
    let raw = data.to_vec();
    let image = match channels {
        1 => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(width, height, raw).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
        _ => return Err(PreprocessError::UnsupportedFormat { channels }),
    }
    .ok_or_else(|| {
        PreprocessError::ImageDecode(format!(
            "{} bytes do not fill a {width}x{height} frame of {channels} channel(s)",
            data.len()
        ))
    })?;
    preprocess(&image)
}

/// RGB → 224×224 → `[0,1]` → ImageNet normalisation → `1×3×224×224`.
pub fn preprocess(image: &DynamicImage) -> Result<InputTensor, PreprocessError> {
    // grey is expanded and alpha dropped here.
    let rgb = image.to_rgb8();
    let (w, h) = (INPUT_WIDTH as u32, INPUT_HEIGHT as u32);
    let resized = if rgb.dimensions() == (w, h) {
        rgb
    } else {
        imageops::resize(&rgb, w, h, FilterType::Triangle)
    };

    Ok(InputTensor::from_fn(|c, y, x| {
        let sample = resized.get_pixel(x as u32, y as u32)[c];
        (f32::from(sample) / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    }))
}
