//! Pixel-level image transformations for enhancement jobs.
//!
//! Each kind is deterministic, consumes one source image, and produces one
//! PNG artifact plus a quality score. Background removal and style transfer
//! are deliberately simplified stand-ins: the former normalizes the source to
//! PNG without segmentation, the latter applies a fixed warm tint. Both are
//! documented placeholders, not content-adaptive models.

use anyhow::Context;
use image::RgbaImage;
use uuid::Uuid;

use crate::foundation::error::{PlatenError, PlatenResult};
use crate::render::effects;

const DEFAULT_UPSCALE: f64 = 2.0;
/// Target edge when a computed upscale dimension degenerates to zero.
const FALLBACK_EDGE: u32 = 1000;

/// Enhancement-job input: one source image, one transformation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransformRequest {
    pub source: Uuid,
    #[serde(flatten)]
    pub kind: TransformKind,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformKind {
    Upscale {
        #[serde(default = "default_scale")]
        scale: f64,
    },
    BackgroundRemoval,
    NoiseReduction,
    ColorCorrection,
    Sharpen,
    StyleTransfer,
}

fn default_scale() -> f64 {
    DEFAULT_UPSCALE
}

impl TransformKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upscale { .. } => "upscale",
            Self::BackgroundRemoval => "background-removal",
            Self::NoiseReduction => "noise-reduction",
            Self::ColorCorrection => "color-correction",
            Self::Sharpen => "sharpen",
            Self::StyleTransfer => "style-transfer",
        }
    }
}

/// Result of one transformation: the encoded artifact and its score.
pub struct TransformOutput {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality_score: u8,
}

/// Decode, transform, score, and re-encode as PNG.
pub fn apply_transform(source: &[u8], kind: &TransformKind) -> PlatenResult<TransformOutput> {
    let img = image::load_from_memory(source)
        .context("decode transform source image")?
        .to_rgba8();

    let out = match kind {
        TransformKind::Upscale { scale } => upscale(&img, *scale)?,
        TransformKind::BackgroundRemoval => img,
        TransformKind::NoiseReduction => median3(&img),
        TransformKind::ColorCorrection => color_correct(&img),
        TransformKind::Sharpen => sharpen(&img),
        TransformKind::StyleTransfer => warm_tint(&img),
    };

    let quality_score = quality_score(&out);
    let (width, height) = (out.width(), out.height());
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(out)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .context("encode transform output")?;
    Ok(TransformOutput {
        png,
        width,
        height,
        quality_score,
    })
}

fn upscale(img: &RgbaImage, scale: f64) -> PlatenResult<RgbaImage> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(PlatenError::invalid_request(format!(
            "upscale factor must be finite and > 0, got {scale}"
        )));
    }
    let target = |dim: u32| -> u32 {
        let scaled = (f64::from(dim) * scale).round() as u32;
        if scaled == 0 { FALLBACK_EDGE } else { scaled }
    };
    Ok(image::imageops::resize(
        img,
        target(img.width()),
        target(img.height()),
        image::imageops::FilterType::Lanczos3,
    ))
}

/// 3x3 median filter per color channel; alpha passes through.
fn median3(img: &RgbaImage) -> RgbaImage {
    let (w, h) = (img.width(), img.height());
    let mut out = img.clone();
    if w == 0 || h == 0 {
        return out;
    }
    for y in 0..h {
        for x in 0..w {
            let mut samples = [[0u8; 9]; 3];
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (i64::from(x) + dx).clamp(0, i64::from(w) - 1) as u32;
                    let sy = (i64::from(y) + dy).clamp(0, i64::from(h) - 1) as u32;
                    let px = img.get_pixel(sx, sy);
                    for c in 0..3 {
                        samples[c][n] = px.0[c];
                    }
                    n += 1;
                }
            }
            let dst = out.get_pixel_mut(x, y);
            for c in 0..3 {
                samples[c].sort_unstable();
                dst.0[c] = samples[c][4];
            }
        }
    }
    out
}

/// Fixed, non-adaptive boost: brightness x1.1 then saturation x1.15.
fn color_correct(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    effects::apply_brightness(&mut out, 1.1);
    effects::apply_saturation(&mut out, 1.15);
    out
}

fn sharpen(img: &RgbaImage) -> RgbaImage {
    image::imageops::filter3x3(img, &[0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0])
}

/// Blend 25% toward a fixed warm tone.
fn warm_tint(img: &RgbaImage) -> RgbaImage {
    const TINT: [f64; 3] = [255.0, 170.0, 60.0];
    const STRENGTH: f64 = 0.25;
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            let blended = f64::from(px.0[c]) * (1.0 - STRENGTH) + TINT[c] * STRENGTH;
            px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Start at 50; each color channel whose mean falls strictly inside (50, 200)
/// adds 5; clamp to [0, 100].
pub fn quality_score(img: &RgbaImage) -> u8 {
    let n = u64::from(img.width()) * u64::from(img.height());
    if n == 0 {
        return 50;
    }
    let mut sums = [0u64; 3];
    for px in img.pixels() {
        for c in 0..3 {
            sums[c] += u64::from(px.0[c]);
        }
    }
    let mut score: i32 = 50;
    for sum in sums {
        let mean = sum as f64 / n as f64;
        if mean > 50.0 && mean < 200.0 {
            score += 5;
        }
    }
    score.clamp(0, 100) as u8
}
