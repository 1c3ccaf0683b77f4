use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};

use crate::config::SourceSettings;
use crate::frame::Frame;

/// Bring every frame to the working size, mirroring live feeds.
#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
}

impl Normalizer {
    pub fn new(width: u32, height: u32, mirror: bool) -> Self {
        Self {
            width,
            height,
            mirror,
        }
    }

    /// Working size from the settings; mirroring only applies to live sources.
    pub fn for_source(settings: &SourceSettings, live: bool) -> Self {
        Self::new(settings.width, settings.height, live && settings.mirror_live)
    }

    pub fn apply(&self, frame: Frame) -> Frame {
        let (width, height, mirror) = (self.width, self.height, self.mirror);
        frame.map_image(|mut image| {
            if mirror {
                imageops::flip_horizontal_in_place(&mut image);
            }
            if image.dimensions() != (width, height) {
                image = imageops::resize(&image, width, height, FilterType::Triangle);
            }
            image
        })
    }
}

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Yuyv,
}

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = width
                .checked_mul(height)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
            if pixels.len() != expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok(pixels.to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!(
            "NV12 frame needs even dimensions, got {}x{}",
            width,
            height
        ));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            write_rgb(&mut rgb, j * w + i, y, u, v);
        }
    }

    Ok(rgb)
}

/// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if count % 2 != 0 || pixels.len() != count * 2 {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            count * 2,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; count * 3];
    for (pair, chunk) in pixels.chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        write_rgb(&mut rgb, pair * 2, chunk[0] as f32, u, v);
        write_rgb(&mut rgb, pair * 2 + 1, chunk[2] as f32, u, v);
    }
    Ok(rgb)
}

fn write_rgb(rgb: &mut [u8], pixel: usize, y: f32, u: f32, v: f32) {
    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    let offset = pixel * 3;
    rgb[offset] = clamp_to_u8(r);
    rgb[offset + 1] = clamp_to_u8(g);
    rgb[offset + 2] = clamp_to_u8(b);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
