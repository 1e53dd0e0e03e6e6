//! Progress-callback trait for per-image conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while a run processes each image. The run executes on a blocking
//! worker thread, so implementations must be `Send + Sync`; forward events to
//! a UI through a channel rather than touching UI state directly
//! ([`crate::stream::convert_stream`] does exactly that).
//!
//! # Example
//!
//! ```rust
//! use kindle_pdf::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct LastPercent(Mutex<u8>);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, percent: u8, _message: &str) {
//!         *self.0.lock().unwrap() = percent;
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(LastPercent::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ImageError;
use crate::output::PageResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Message emitted before an image starts processing.
pub fn processing_message(name: &str) -> String {
    format!("Processing: {name}")
}

/// Message emitted with the final 100 % event.
pub const COMPLETE_MESSAGE: &str = "PDF generation complete";

/// Called by the conversion pipeline as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Within one run the calls arrive in order from a
/// single thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first image is decoded.
    ///
    /// # Arguments
    /// * `total_images`: number of images the run will process
    fn on_conversion_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Percent/message pair for a progress indicator.
    ///
    /// Emitted before each image with `floor(100 * index / total)` and once
    /// more with `100` after the last image. Percentages never decrease.
    fn on_progress(&self, percent: u8, message: &str) {
        let _ = (percent, message);
    }

    /// Called after an image has been appended as a page.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the image in the run
    /// * `total`: total images in the run
    /// * `page`: dimensions and size of the produced page
    fn on_image_complete(&self, index: usize, total: usize, page: &PageResult) {
        let _ = (index, total, page);
    }

    /// Called when an image is dropped in skip mode.
    fn on_image_error(&self, index: usize, total: usize, error: &ImageError) {
        let _ = (index, total, error);
    }

    /// Called once after the document has been assembled.
    ///
    /// # Arguments
    /// * `total_images`: images in the run
    /// * `converted`: images that became pages
    fn on_conversion_complete(&self, total_images: usize, converted: usize) {
        let _ = (total_images, converted);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is what the pipeline uses when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Percent reported before processing the image at `index` of `total`.
pub(crate) fn percent_before(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((100 * index) / total).min(100) as u8
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag a caller can raise to stop a run between images.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop before its next image.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
