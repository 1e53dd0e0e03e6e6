//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ resize ──▶ tone ──▶ encode ──▶ document
//! (bytes)    (tier)     (luma)   (JPEG)     (lopdf)
//! ```
//!
//! 1. [`decode`]: read the payload and decode it into a raster
//! 2. [`resize`]: compute the tier dimensions and resample into an RGBA
//!    workspace
//! 3. [`tone`]: BT.601 grayscale and contrast stretch, in place
//! 4. [`encode`]: composite alpha and re-encode as JPEG at the run quality
//! 5. [`document`]: append a full-bleed page sized to the image
//!
//! The stages are CPU-bound and synchronous; [`crate::convert`] drives them
//! one image at a time on a blocking thread.

pub mod decode;
pub mod document;
pub mod encode;
pub mod resize;
pub mod tone;
