use std::{fs, path::Path};

use anyhow::{Context, Result};
use base64::Engine;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

fn quantize(pixels: &[f32]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(pixels.len());
    for &value in pixels {
        let clamped = value.clamp(0.0, 1.0);
        encoded.push((clamped * 255.0).round() as u8);
    }
    encoded
}

fn encode_png(width: u32, height: u32, pixels: &[f32], color: ColorType) -> Result<Vec<u8>> {
    let channels = match color {
        ColorType::L8 => 1,
        ColorType::Rgb8 => 3,
        other => anyhow::bail!("unsupported color type {:?}", other),
    };
    let expected_len = (width * height) as usize * channels;
    if pixels.len() != expected_len {
        anyhow::bail!(
            "pixel buffer length {} does not match {}-channel image size {}x{}",
            pixels.len(),
            channels,
            width,
            height
        );
    }

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    encoder
        .write_image(&quantize(pixels), width, height, color)
        .context("failed to encode PNG data")?;
    Ok(buffer)
}

/// Encode a grayscale image (values in [0, 1]) as a PNG data URL.
pub fn encode_luma_png_data_url(width: u32, height: u32, pixels: &[f32]) -> Result<String> {
    let buffer = encode_png(width, height, pixels, ColorType::L8)?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/png;base64,{base64}"))
}

/// Encode an RGB image (values in [0, 1]) as a PNG data URL.
pub fn encode_rgb_png_data_url(width: u32, height: u32, pixels: &[f32]) -> Result<String> {
    let buffer = encode_png(width, height, pixels, ColorType::Rgb8)?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/png;base64,{base64}"))
}

/// Write a grayscale image (values in [0, 1]) to disk as a PNG.
pub fn write_luma_png(path: &Path, width: u32, height: u32, pixels: &[f32]) -> Result<()> {
    let buffer = encode_png(width, height, pixels, ColorType::L8)?;
    fs::write(path, buffer).with_context(|| format!("failed to write {}", path.display()))
}

/// Write an RGB image (values in [0, 1]) to disk as a PNG.
pub fn write_rgb_png(path: &Path, width: u32, height: u32, pixels: &[f32]) -> Result<()> {
    let buffer = encode_png(width, height, pixels, ColorType::Rgb8)?;
    fs::write(path, buffer).with_context(|| format!("failed to write {}", path.display()))
}

/// Re-encode an existing PNG file as a data URL for report embedding.
pub fn encode_png_file_data_url(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:image/png;base64,{base64}"))
}
