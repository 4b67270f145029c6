//! Photometric effects on straight-alpha RGBA8 buffers.
//!
//! Brightness and saturation are multiplicative modulation factors
//! (1.0 = unchanged). Contrast is a linear adjustment about mid-gray:
//! `out = (in - 128) * c + 128`. This single definition is used everywhere a
//! contrast adjustment appears. Application order is fixed: brightness, then
//! contrast, then saturation; absent effects are no-ops.

use crate::doc::model::EffectSet;

pub fn apply_effects(rgba: &mut [u8], fx: &EffectSet) {
    if let Some(b) = fx.brightness {
        apply_brightness(rgba, b);
    }
    if let Some(c) = fx.contrast {
        apply_contrast(rgba, c);
    }
    if let Some(s) = fx.saturation {
        apply_saturation(rgba, s);
    }
}

pub fn apply_brightness(rgba: &mut [u8], factor: f64) {
    let factor = sanitize(factor);
    for px in rgba.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = clamp_u8(f64::from(*c) * factor);
        }
    }
}

pub fn apply_contrast(rgba: &mut [u8], factor: f64) {
    let factor = sanitize(factor);
    for px in rgba.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = clamp_u8((f64::from(*c) - 128.0) * factor + 128.0);
        }
    }
}

pub fn apply_saturation(rgba: &mut [u8], factor: f64) {
    let factor = sanitize(factor);
    for px in rgba.chunks_exact_mut(4) {
        // Rec. 601 luma as the desaturation target.
        let luma = 0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]);
        for c in &mut px[..3] {
            *c = clamp_u8(luma + (f64::from(*c) - luma) * factor);
        }
    }
}

fn sanitize(factor: f64) -> f64 {
    if factor.is_finite() { factor.max(0.0) } else { 1.0 }
}

fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
