//! Tone mapping for e-ink: BT.601 luma and an optional contrast stretch.
//!
//! Works in place on the RGBA workspace produced by the resize stage. All
//! arithmetic is `f32`; each channel is rounded once, when it is written
//! back. Alpha is never touched.

use crate::config::ConversionOptions;
use image::RgbaImage;

/// ITU-R BT.601 luma weights (not BT.709).
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Mid-tone pivot of the contrast stretch.
pub const CONTRAST_PIVOT: f32 = 128.0;

/// Gain of the contrast stretch.
pub const CONTRAST_GAIN: f32 = 1.2;

/// Luma of an RGB triple.
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    LUMA_WEIGHTS[0] * f32::from(r) + LUMA_WEIGHTS[1] * f32::from(g) + LUMA_WEIGHTS[2] * f32::from(b)
}

/// Linear stretch around the pivot, clamped to `[0, 255]`.
pub fn stretch(value: f32) -> f32 {
    ((value - CONTRAST_PIVOT) * CONTRAST_GAIN + CONTRAST_PIVOT).clamp(0.0, 255.0)
}

/// Apply the tone options to `raster`. A no-op when grayscale is off.
pub fn apply(raster: &mut RgbaImage, options: &ConversionOptions) {
    if !options.grayscale() {
        return;
    }
    let high_contrast = options.high_contrast();
    for px in raster.pixels_mut() {
        let [r, g, b, _] = px.0;
        let mut v = luma(r, g, b);
        if high_contrast {
            v = stretch(v);
        }
        let out = v.round().clamp(0.0, 255.0) as u8;
        px.0[0] = out;
        px.0[1] = out;
        px.0[2] = out;
    }
}
