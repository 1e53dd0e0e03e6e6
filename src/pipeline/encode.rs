//! Lossy re-encode: RGBA workspace → baseline JPEG.
//!
//! JPEG has no alpha channel. Transparent pixels are composited over black,
//! which is what a canvas JPEG export produces. Grayscale runs are encoded as
//! single-channel JPEG: the file is about a third smaller and the PDF image
//! carries `DeviceGray`, which e-ink readers render without a colour pass.

use crate::error::KindlePdfError;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbaImage};
use tracing::debug;

/// Colour layout of an encoded JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColor {
    Gray,
    Rgb,
}

impl JpegColor {
    /// PDF colour space name for an image XObject.
    pub fn pdf_color_space(self) -> &'static str {
        match self {
            JpegColor::Gray => "DeviceGray",
            JpegColor::Rgb => "DeviceRGB",
        }
    }

    fn channels(self) -> usize {
        match self {
            JpegColor::Gray => 1,
            JpegColor::Rgb => 3,
        }
    }
}

/// A JPEG stream ready to be embedded as a page image.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color: JpegColor,
}

/// Reusable JPEG encoder for one run.
///
/// Holds the flattened pixel buffer handed to the JPEG encoder so that a run
/// over many pages allocates it once and only grows it for larger pages.
#[derive(Debug)]
pub struct JpegWriter {
    quality: u8,
    color: JpegColor,
    scratch: Vec<u8>,
}

/// Largest width or height a baseline JPEG frame can describe.
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Reject page sizes the JPEG encoder cannot represent.
///
/// Runs before any pixel buffer is allocated for the page, so an extreme
/// aspect ratio fails fast instead of materialising a huge raster.
pub fn check_dimensions(name: &str, width: u32, height: u32) -> Result<(), KindlePdfError> {
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(KindlePdfError::EncodeFailed {
            name: name.to_string(),
            detail: format!(
                "page of {width}x{height} exceeds the JPEG limit of {MAX_JPEG_DIMENSION} px per side"
            ),
        });
    }
    Ok(())
}

impl JpegWriter {
    /// `quality` is the 1..=100 JPEG quality factor.
    pub fn new(quality: u8, color: JpegColor) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            color,
            scratch: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn color(&self) -> JpegColor {
        self.color
    }

    /// Encode `raster` for the entry called `name`.
    pub fn encode(&mut self, name: &str, raster: &RgbaImage) -> Result<EncodedImage, KindlePdfError> {
        let (width, height) = raster.dimensions();
        check_dimensions(name, width, height)?;
        self.flatten(raster);

        let color_type = match self.color {
            JpegColor::Gray => ExtendedColorType::L8,
            JpegColor::Rgb => ExtendedColorType::Rgb8,
        };

        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, self.quality)
            .encode(&self.scratch, width, height, color_type)
            .map_err(|e| KindlePdfError::EncodeFailed {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        debug!(
            "Encoded '{}' {}x{} → {} bytes JPEG (q={}, {:?})",
            name,
            width,
            height,
            data.len(),
            self.quality,
            self.color
        );

        Ok(EncodedImage {
            data,
            width,
            height,
            color: self.color,
        })
    }

    /// Composite over black and drop to the target channel count.
    fn flatten(&mut self, raster: &RgbaImage) {
        let channels = self.color.channels();
        self.scratch.clear();
        self.scratch.reserve(raster.as_raw().len() / 4 * channels);
        for px in raster.pixels() {
            let [r, g, b, a] = px.0;
            match self.color {
                // Tone mapping has already made R = G = B.
                JpegColor::Gray => self.scratch.push(premultiply(r, a)),
                JpegColor::Rgb => self.scratch.extend_from_slice(&[
                    premultiply(r, a),
                    premultiply(g, a),
                    premultiply(b, a),
                ]),
            }
        }
    }
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    match alpha {
        255 => channel,
        0 => 0,
        _ => ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba};

    fn decode(data: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn oversized_pages_are_rejected_up_front() {
        assert!(check_dimensions("ok", 758, MAX_JPEG_DIMENSION).is_ok());
        let err = check_dimensions("tall.png", 758, 15_160_000).unwrap_err();
        assert!(matches!(
            err,
            KindlePdfError::EncodeFailed { ref name, .. } if name == "tall.png"
        ));
        assert!(check_dimensions("wide", MAX_JPEG_DIMENSION + 1, 1).is_err());
    }

    #[test]
    fn rgb_run_produces_colour_jpeg() {
        let img = RgbaImage::from_pixel(16, 8, Rgba([200, 40, 40, 255]));
        let mut w = JpegWriter::new(90, JpegColor::Rgb);
        let enc = w.encode("red.png", &img).unwrap();
        assert_eq!((enc.width, enc.height), (16, 8));
        assert_eq!(&enc.data[..2], &[0xFF, 0xD8]);
        let back = decode(&enc.data);
        assert_eq!(back.color(), image::ColorType::Rgb8);
        let p = back.to_rgb8().get_pixel(4, 4).0;
        assert!(p[0] > 180 && p[1] < 70, "got {p:?}");
    }

    #[test]
    fn gray_run_produces_single_channel_jpeg() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([90, 90, 90, 255]));
        let mut w = JpegWriter::new(80, JpegColor::Gray);
        let enc = w.encode("g.png", &img).unwrap();
        let back = decode(&enc.data);
        assert_eq!(back.color(), image::ColorType::L8);
        assert_eq!(enc.color.pdf_color_space(), "DeviceGray");
    }

    #[test]
    fn transparency_composites_over_black() {
        assert_eq!(premultiply(200, 0), 0);
        assert_eq!(premultiply(200, 255), 200);
        assert_eq!(premultiply(255, 128), 128);

        let img = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0]));
        let mut w = JpegWriter::new(95, JpegColor::Rgb);
        let back = decode(&w.encode("clear.png", &img).unwrap().data);
        assert!(back.to_rgb8().pixels().all(|p| p.0.iter().all(|&c| c < 8)));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8, 255])
        });
        let mut hi = JpegWriter::new(95, JpegColor::Rgb);
        let mut lo = JpegWriter::new(10, JpegColor::Rgb);
        let big = hi.encode("n", &img).unwrap();
        let small = lo.encode("n", &img).unwrap();
        assert!(small.data.len() < big.data.len());
    }

    #[test]
    fn scratch_buffer_is_reused_across_pages() {
        let mut w = JpegWriter::new(60, JpegColor::Rgb);
        w.encode("a", &RgbaImage::from_pixel(32, 32, Rgba([1, 1, 1, 255])))
            .unwrap();
        let cap = w.scratch.capacity();
        w.encode("b", &RgbaImage::from_pixel(16, 16, Rgba([1, 1, 1, 255])))
            .unwrap();
        assert_eq!(w.scratch.capacity(), cap);
        assert_eq!(w.scratch.len(), 16 * 16 * 3);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(JpegWriter::new(0, JpegColor::Rgb).quality(), 1);
        assert_eq!(JpegWriter::new(250, JpegColor::Gray).quality(), 100);
    }
}
