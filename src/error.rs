//! Error types for the kindle-pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`KindlePdfError`] (**fatal**): the run cannot produce a document
//!   (nothing selected, an image failed to decode under the default abort
//!   policy, the output file could not be written). Returned as
//!   `Err(KindlePdfError)` from the `process` / `convert*` entry points.
//!
//! * [`ImageError`] (**non-fatal**): a single image was dropped while the
//!   run was configured with [`crate::config::DecodeFailurePolicy::Skip`].
//!   Stored inside [`crate::output::PageResult`] so callers can report
//!   partial success instead of losing the whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the kindle-pdf library.
///
/// Per-image failures in skip mode use [`ImageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum KindlePdfError {
    // ── Selection errors ──────────────────────────────────────────────────
    /// Conversion was requested with no image-typed entries.
    #[error("No image files selected.\nAdd at least one image (image/*) before converting.")]
    EmptySelection,

    /// `reorder` was called with an index outside the current bounds.
    #[error("Index {index} is out of range (set has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    // ── Per-image errors (fatal under the abort policy) ───────────────────
    /// The payload could not be interpreted as a raster image.
    #[error("Failed to decode image '{name}': {detail}")]
    DecodeFailed { name: String, detail: String },

    /// A file-backed payload could not be read from disk.
    #[error("Failed to read image '{name}' from '{path}': {source}")]
    SourceUnreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JPEG re-encoding of a processed raster failed.
    #[error("Failed to re-encode image '{name}': {detail}")]
    EncodeFailed { name: String, detail: String },

    // ── Run-level errors ──────────────────────────────────────────────────
    /// Every image failed in skip mode; the document would be empty.
    #[error("All {total} images failed to convert.\nFirst error: {first_error}")]
    AllImagesFailed { total: usize, first_error: String },

    /// The run was stopped through its cancel flag.
    #[error("Conversion cancelled after {processed}/{total} images")]
    Cancelled { processed: usize, total: usize },

    /// The PDF document could not be assembled or serialised.
    #[error("Failed to build PDF document: {0}")]
    DocumentFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or setter validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KindlePdfError {
    /// Name of the image this error refers to, if any.
    pub fn image_name(&self) -> Option<&str> {
        match self {
            KindlePdfError::DecodeFailed { name, .. }
            | KindlePdfError::SourceUnreadable { name, .. }
            | KindlePdfError::EncodeFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A non-fatal error for a single image.
///
/// Only produced when the run is configured to skip undecodable images.
/// The run continues unless ALL images fail.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// Decoding the payload failed.
    #[error("Image {index} ('{name}'): decode failed: {detail}")]
    DecodeFailed {
        index: usize,
        name: String,
        detail: String,
    },

    /// Re-encoding the processed raster failed.
    #[error("Image {index} ('{name}'): encode failed: {detail}")]
    EncodeFailed {
        index: usize,
        name: String,
        detail: String,
    },
}

impl ImageError {
    /// Demote a fatal per-image error to its skip-mode counterpart.
    ///
    /// Returns the original error back when it is not an image-level failure.
    pub(crate) fn from_fatal(index: usize, err: KindlePdfError) -> Result<Self, KindlePdfError> {
        match err {
            KindlePdfError::DecodeFailed { name, detail } => Ok(ImageError::DecodeFailed {
                index,
                name,
                detail,
            }),
            KindlePdfError::EncodeFailed { name, detail } => Ok(ImageError::EncodeFailed {
                index,
                name,
                detail,
            }),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failed_names_the_file() {
        let e = KindlePdfError::DecodeFailed {
            name: "page_003.png".into(),
            detail: "invalid signature".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page_003.png"), "got: {msg}");
        assert_eq!(e.image_name(), Some("page_003.png"));
    }

    #[test]
    fn cancelled_display() {
        let e = KindlePdfError::Cancelled {
            processed: 2,
            total: 5,
        };
        assert!(e.to_string().contains("2/5"));
        assert_eq!(e.image_name(), None);
    }

    #[test]
    fn index_out_of_range_display() {
        let e = KindlePdfError::IndexOutOfRange { index: 7, len: 3 };
        assert!(e.to_string().contains("Index 7"));
        assert!(e.to_string().contains("3 entries"));
    }

    #[test]
    fn fatal_decode_error_demotes_to_image_error() {
        let fatal = KindlePdfError::DecodeFailed {
            name: "a.jpg".into(),
            detail: "truncated".into(),
        };
        let demoted = ImageError::from_fatal(4, fatal).unwrap();
        assert_eq!(
            demoted,
            ImageError::DecodeFailed {
                index: 4,
                name: "a.jpg".into(),
                detail: "truncated".into(),
            }
        );
    }

    #[test]
    fn unreadable_source_is_not_demoted() {
        let fatal = KindlePdfError::SourceUnreadable {
            name: "gone.png".into(),
            path: PathBuf::from("/nope/gone.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let back = ImageError::from_fatal(0, fatal).unwrap_err();
        assert!(matches!(back, KindlePdfError::SourceUnreadable { .. }));
    }
}
