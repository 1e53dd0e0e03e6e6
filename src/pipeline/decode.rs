//! Payload decoding: raw bytes → `DynamicImage`.
//!
//! The format is sniffed from the magic bytes, not taken from the MIME type
//! or the file extension, so a mislabelled file still decodes if its content
//! is a supported raster. Unsupported or corrupt content becomes
//! [`KindlePdfError::DecodeFailed`] carrying the file name.

use crate::error::KindlePdfError;
use crate::image_set::{ImageSource, ManagedImage};
use image::DynamicImage;
use std::path::PathBuf;
use tracing::debug;

/// Decode the payload of a set entry.
pub fn decode_image(image: &ManagedImage) -> Result<DynamicImage, KindlePdfError> {
    decode_source(&image.name, &image.source)
}

/// Decode a payload, reading it from disk first when it is file-backed.
///
/// A file that cannot be read is reported as
/// [`KindlePdfError::SourceUnreadable`], distinct from content that does not
/// decode.
pub fn decode_source(name: &str, source: &ImageSource) -> Result<DynamicImage, KindlePdfError> {
    let bytes = source
        .load()
        .map_err(|e| KindlePdfError::SourceUnreadable {
            name: name.to_string(),
            path: source.path().map(PathBuf::from).unwrap_or_default(),
            source: e,
        })?;

    let img = image::load_from_memory(&bytes).map_err(|e| KindlePdfError::DecodeFailed {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    debug!(
        "Decoded '{}' → {}x{} px ({:?})",
        name,
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}
