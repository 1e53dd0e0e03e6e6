//! Output types produced by a conversion run.

use crate::error::ImageError;
use crate::image_set::ImageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orientation recorded for a page: portrait only when strictly taller than wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

impl PageOrientation {
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if height > width {
            PageOrientation::Portrait
        } else {
            PageOrientation::Landscape
        }
    }
}

impl fmt::Display for PageOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageOrientation::Portrait => f.write_str("portrait"),
            PageOrientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// Outcome of one image in a run.
///
/// For a converted image `error` is `None` and `width`/`height` are the page
/// dimensions in pixels. In skip mode a dropped image keeps its slot with
/// zeroed dimensions and the error that caused it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-based position of the image in the run.
    pub index: usize,
    pub id: ImageId,
    pub name: String,
    pub source_width: u32,
    pub source_height: u32,
    /// Page width in pixels (1 px = 1 pt in the document).
    pub width: u32,
    pub height: u32,
    pub orientation: PageOrientation,
    /// Size of the embedded JPEG stream.
    pub encoded_bytes: usize,
    pub error: Option<ImageError>,
}

impl PageResult {
    pub fn is_converted(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_images: usize,
    pub converted_images: usize,
    pub skipped_images: usize,
    pub document_bytes: usize,
    pub duration_ms: u64,
}

/// The document artifact and per-image results of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Serialised PDF. Not included in JSON output.
    #[serde(skip)]
    pub document: Vec<u8>,
    /// One entry per input image, in input order.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Pages that made it into the document, in document order.
    pub fn converted_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| p.is_converted())
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.converted_pages().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_pages_are_landscape() {
        assert_eq!(
            PageOrientation::for_dimensions(1072, 1448),
            PageOrientation::Portrait
        );
        assert_eq!(
            PageOrientation::for_dimensions(1072, 600),
            PageOrientation::Landscape
        );
        assert_eq!(
            PageOrientation::for_dimensions(500, 500),
            PageOrientation::Landscape
        );
    }
}
