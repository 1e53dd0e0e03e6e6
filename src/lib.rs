//! # kindle-pdf
//!
//! Turn an ordered set of images (scans, manga pages, screenshots) into a
//! single PDF sized and tone-mapped for e-ink readers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! OrderedImageSet ──snapshot──▶ Vec<ManagedImage>
//!                                   │
//!  ├─ 1. Decode   sniff format, decode payload (file or memory)
//!  ├─ 2. Resize   force the tier width, keep aspect ratio
//!  ├─ 3. Tone     BT.601 grayscale + optional contrast stretch
//!  ├─ 4. Encode   JPEG at the configured quality
//!  └─ 5. Page     one full-bleed page per image, in order
//! ```
//!
//! Images are processed one at a time on a blocking thread; progress is
//! reported before each image and once more at 100 %.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kindle_pdf::{convert_to_file, ConversionConfig, OrderedImageSet, RawFile, ResizeTarget, SortKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut set = OrderedImageSet::new();
//!     set.append([
//!         RawFile::from_path("chapter1/002.png")?,
//!         RawFile::from_path("chapter1/001.png")?,
//!     ]);
//!     set.sort_by(SortKey::NameAsc);
//!
//!     let config = ConversionConfig::builder()
//!         .resize_target(ResizeTarget::Medium)
//!         .quality(0.6)
//!         .build()?;
//!     let output = convert_to_file(set.image_only_snapshot(), "kindle_optimized.pdf", &config).await?;
//!     eprintln!("{} pages", output.page_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2kindle` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! kindle-pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Size tiers
//!
//! | Tier | Page width | Nominal height |
//! |------|-----------|----------------|
//! | `small`  | 758 px  | 1024 px |
//! | `medium` | 1072 px | 1448 px |
//! | `large`  | 1272 px | 1696 px |
//!
//! Only the width is enforced; the page height follows the image.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod display;
pub mod error;
pub mod image_set;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    output_file_name, ConversionConfig, ConversionConfigBuilder, ConversionOptions,
    DecodeFailurePolicy, ResizeTarget, DEFAULT_OUTPUT_NAME,
};
pub use convert::{convert, convert_set, convert_to_file, process};
pub use display::{format_date, format_size};
pub use error::{ImageError, KindlePdfError};
pub use image_set::{
    ImageId, ImageSource, ManagedImage, NoPreviews, OrderedImageSet, PreviewStore, RawFile,
    SortKey, ThumbnailPreviews,
};
pub use output::{ConversionOutput, ConversionStats, PageOrientation, PageResult};
pub use progress::{CancelFlag, ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ConversionStream, ProgressEvent};
