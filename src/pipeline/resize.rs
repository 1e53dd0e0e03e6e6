//! Geometric resize to an e-reader size tier.
//!
//! Width is authoritative: every page of a tiered run is exactly the tier's
//! width, and the height follows the source aspect ratio with no clamp. A
//! very wide strip produces a short page; a tall scan a long one.

use crate::config::ResizeTarget;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};
use tracing::debug;

/// Page dimensions for a `width` × `height` source under `target`.
///
/// `ResizeTarget::None` keeps the source dimensions. Otherwise the width is
/// the tier width and the height is `round(height * tier_width / width)`,
/// never less than one pixel.
pub fn target_dimensions(width: u32, height: u32, target: ResizeTarget) -> (u32, u32) {
    let Some(tier_width) = target.width() else {
        return (width, height);
    };
    if width == 0 {
        return (width, height);
    }
    let scale = f64::from(tier_width) / f64::from(width);
    let scaled = (f64::from(height) * scale).round() as u32;
    (tier_width, scaled.max(1))
}

/// The run's RGBA raster, recycled from one image to the next.
///
/// Images are processed strictly one after another, so a single allocation
/// serves the whole run: [`Workspace::resample`] hands the buffer out as an
/// [`RgbaImage`] and [`Workspace::recycle`] takes it back once the page has
/// been encoded. Resampled rasters come from `imageops::resize`, which
/// always allocates; the workspace keeps the largest buffer it has seen.
#[derive(Debug, Default)]
pub struct Workspace {
    pixels: Vec<u8>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held for reuse.
    pub fn capacity(&self) -> usize {
        self.pixels.capacity()
    }

    /// Resample `img` to `width` × `height` into the workspace.
    ///
    /// One bilinear pass, no mip chain, read straight from the decoded image.
    /// When the size already matches, the pixels are only converted to RGBA.
    pub fn resample(&mut self, img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
        if img.dimensions() == (width, height) {
            return self.convert(img);
        }
        debug!(
            "Resampling {}x{} → {}x{}",
            img.width(),
            img.height(),
            width,
            height
        );
        match img.as_rgba8() {
            Some(rgba) => imageops::resize(rgba, width, height, FilterType::Triangle),
            None => imageops::resize(img, width, height, FilterType::Triangle),
        }
    }

    /// Return a raster produced by [`Workspace::resample`].
    pub fn recycle(&mut self, raster: RgbaImage) {
        let pixels = raster.into_raw();
        if pixels.capacity() >= self.pixels.capacity() {
            self.pixels = pixels;
        }
    }

    fn convert(&mut self, img: &DynamicImage) -> RgbaImage {
        let (width, height) = img.dimensions();
        let mut pixels = std::mem::take(&mut self.pixels);
        pixels.clear();
        pixels.reserve(width as usize * height as usize * 4);
        for (_, _, px) in img.pixels() {
            pixels.extend_from_slice(&px.0);
        }
        wrap(width, height, pixels)
    }
}

// `pixels` always holds exactly width * height RGBA pixels here.
fn wrap(width: u32, height: u32, pixels: Vec<u8>) -> RgbaImage {
    match RgbaImage::from_raw(width, height, pixels) {
        Some(raster) => raster,
        None => RgbaImage::new(width, height),
    }
}
