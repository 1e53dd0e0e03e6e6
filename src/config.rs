//! Configuration types for image-to-PDF conversion.
//!
//! The per-image transform is controlled by [`ConversionOptions`], the small
//! set of knobs a user flips in the settings panel. Everything about the run
//! itself (failure policy, progress reporting, cancellation, document title)
//! lives in [`ConversionConfig`], built via its [`ConversionConfigBuilder`].
//!
//! `ConversionOptions` keeps its fields private: `high_contrast` only makes
//! sense on a grayscale page, and that dependency is enforced by the setters
//! at the moment of mutation rather than patched up when the value is read.

use crate::error::KindlePdfError;
use crate::progress::{CancelFlag, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base name used for the output document when the user leaves it blank.
pub const DEFAULT_OUTPUT_NAME: &str = "kindle_optimized";

/// Extension appended to the output base name.
pub const OUTPUT_EXTENSION: &str = "pdf";

const MIN_QUALITY: f32 = 0.1;
const MAX_QUALITY: f32 = 1.0;
const DEFAULT_QUALITY: f32 = 0.6;

// ── Conversion options ───────────────────────────────────────────────────

/// User-facing transform options applied to every image in a run.
///
/// # Example
/// ```rust
/// use kindle_pdf::{ConversionOptions, ResizeTarget};
///
/// let mut options = ConversionOptions::default();
/// options.set_resize_target(ResizeTarget::Large);
/// options.set_grayscale(false);
/// assert!(!options.high_contrast());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "OptionsRepr", into = "OptionsRepr")]
pub struct ConversionOptions {
    grayscale: bool,
    high_contrast: bool,
    resize_target: ResizeTarget,
    quality: f32,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            grayscale: true,
            high_contrast: true,
            resize_target: ResizeTarget::Medium,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ConversionOptions {
    /// Options that leave every image untouched apart from re-encoding.
    pub fn passthrough() -> Self {
        Self {
            grayscale: false,
            high_contrast: false,
            resize_target: ResizeTarget::None,
            quality: MAX_QUALITY,
        }
    }

    pub fn grayscale(&self) -> bool {
        self.grayscale
    }

    pub fn high_contrast(&self) -> bool {
        self.high_contrast
    }

    pub fn resize_target(&self) -> ResizeTarget {
        self.resize_target
    }

    /// Re-encoding quality factor in `[0.1, 1.0]`.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Turning grayscale off also turns high contrast off.
    pub fn set_grayscale(&mut self, on: bool) {
        self.grayscale = on;
        if !on {
            self.high_contrast = false;
        }
    }

    /// High contrast can only be switched on while grayscale is on.
    pub fn set_high_contrast(&mut self, on: bool) {
        self.high_contrast = on && self.grayscale;
    }

    pub fn set_resize_target(&mut self, target: ResizeTarget) {
        self.resize_target = target;
    }

    /// Set the quality factor, clamped to `[0.1, 1.0]`.
    pub fn set_quality(&mut self, quality: f32) -> Result<(), KindlePdfError> {
        if !quality.is_finite() {
            return Err(KindlePdfError::InvalidConfig(format!(
                "quality must be a finite number, got {quality}"
            )));
        }
        self.quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        Ok(())
    }

    /// JPEG encoder quality (1–100) corresponding to [`Self::quality`].
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Wire shape of [`ConversionOptions`]; deserialising goes through the
/// setters so a stored `high_contrast: true, grayscale: false` cannot leak in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsRepr {
    grayscale: bool,
    high_contrast: bool,
    resize_target: ResizeTarget,
    quality: f32,
}

impl From<OptionsRepr> for ConversionOptions {
    fn from(repr: OptionsRepr) -> Self {
        let mut options = ConversionOptions::default();
        options.set_grayscale(repr.grayscale);
        options.set_high_contrast(repr.high_contrast);
        options.set_resize_target(repr.resize_target);
        if options.set_quality(repr.quality).is_err() {
            options.quality = DEFAULT_QUALITY;
        }
        options
    }
}

impl From<ConversionOptions> for OptionsRepr {
    fn from(options: ConversionOptions) -> Self {
        Self {
            grayscale: options.grayscale,
            high_contrast: options.high_contrast,
            resize_target: options.resize_target,
            quality: options.quality,
        }
    }
}

// ── Resize target ────────────────────────────────────────────────────────

/// Fixed e-reader resolutions an image can be scaled to.
///
/// Only the width is authoritative: height follows the source aspect ratio,
/// so the nominal height is informational.
///
/// | Tier | Width × Height |
/// |------|----------------|
/// | `Small`  | 758 × 1024  |
/// | `Medium` | 1072 × 1448 |
/// | `Large`  | 1272 × 1696 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeTarget {
    /// Keep the original pixel dimensions.
    None,
    Small,
    /// Default tier.
    #[default]
    Medium,
    Large,
}

impl ResizeTarget {
    /// `(width, height)` of the tier, or `None` when no resizing applies.
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            ResizeTarget::None => None,
            ResizeTarget::Small => Some((758, 1024)),
            ResizeTarget::Medium => Some((1072, 1448)),
            ResizeTarget::Large => Some((1272, 1696)),
        }
    }

    /// Fixed output width of the tier.
    pub fn width(self) -> Option<u32> {
        self.dimensions().map(|(w, _)| w)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeTarget::None => "none",
            ResizeTarget::Small => "small",
            ResizeTarget::Medium => "medium",
            ResizeTarget::Large => "large",
        }
    }
}

impl fmt::Display for ResizeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeTarget {
    type Err = KindlePdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ResizeTarget::None),
            "small" => Ok(ResizeTarget::Small),
            "medium" => Ok(ResizeTarget::Medium),
            "large" => Ok(ResizeTarget::Large),
            other => Err(KindlePdfError::InvalidConfig(format!(
                "unknown resize target '{other}' (expected none, small, medium or large)"
            ))),
        }
    }
}

// ── Failure policy ───────────────────────────────────────────────────────

/// What a run does when one image cannot be decoded or re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecodeFailurePolicy {
    /// Abort the whole run on the first failure; no document is produced. (default)
    #[default]
    Abort,
    /// Drop the failing image, record an [`crate::error::ImageError`] and
    /// carry on. The run still fails if no image survives.
    Skip,
}

// ── Run configuration ────────────────────────────────────────────────────

/// Configuration for one conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use kindle_pdf::{ConversionConfig, ResizeTarget};
///
/// let config = ConversionConfig::builder()
///     .resize_target(ResizeTarget::Small)
///     .grayscale(true)
///     .quality(0.8)
///     .build()
///     .unwrap();
/// assert_eq!(config.options.jpeg_quality(), 80);
/// ```
#[derive(Clone, Default)]
pub struct ConversionConfig {
    /// Per-image transform options.
    pub options: ConversionOptions,

    /// Behaviour on a per-image decode/encode failure. Default: abort.
    pub failure_policy: DecodeFailurePolicy,

    /// Title written into the PDF Info dictionary. Default: [`DEFAULT_OUTPUT_NAME`].
    pub title: Option<String>,

    /// Receives progress events while the run executes.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked before each image; once set the run stops with
    /// [`KindlePdfError::Cancelled`]. Without a flag a run cannot be stopped.
    pub cancel_flag: Option<CancelFlag>,
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("options", &self.options)
            .field("failure_policy", &self.failure_policy)
            .field("title", &self.title)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancel_flag", &self.cancel_flag)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            quality: None,
        }
    }

    /// Document title, falling back to [`DEFAULT_OUTPUT_NAME`].
    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_NAME)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    quality: Option<f32>,
}

impl ConversionConfigBuilder {
    pub fn options(mut self, options: ConversionOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn grayscale(mut self, on: bool) -> Self {
        self.config.options.set_grayscale(on);
        self
    }

    pub fn high_contrast(mut self, on: bool) -> Self {
        self.config.options.set_high_contrast(on);
        self
    }

    pub fn resize_target(mut self, target: ResizeTarget) -> Self {
        self.config.options.set_resize_target(target);
        self
    }

    /// Validated in [`Self::build`].
    pub fn quality(mut self, q: f32) -> Self {
        self.quality = Some(q);
        self
    }

    pub fn failure_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.config.cancel_flag = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConversionConfig, KindlePdfError> {
        if let Some(q) = self.quality {
            self.config.options.set_quality(q)?;
        }
        Ok(self.config)
    }
}

// ── Output naming ────────────────────────────────────────────────────────

/// File name for the produced document: `"{base}.pdf"`.
///
/// A blank base falls back to [`DEFAULT_OUTPUT_NAME`]; a base that already
/// ends in `.pdf` is not extended again.
pub fn output_file_name(base: &str) -> String {
    let base = base.trim();
    let base = if base.is_empty() {
        DEFAULT_OUTPUT_NAME
    } else {
        base
    };
    let suffix = format!(".{OUTPUT_EXTENSION}");
    if base.len() > suffix.len() && base.to_ascii_lowercase().ends_with(&suffix) {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_settings_panel() {
        let o = ConversionOptions::default();
        assert!(o.grayscale());
        assert!(o.high_contrast());
        assert_eq!(o.resize_target(), ResizeTarget::Medium);
        assert!((o.quality() - 0.6).abs() < f32::EPSILON);
        assert_eq!(o.jpeg_quality(), 60);
    }

    #[test]
    fn disabling_grayscale_forces_high_contrast_off() {
        let mut o = ConversionOptions::default();
        o.set_grayscale(false);
        assert!(!o.high_contrast());

        // Re-enabling grayscale does not resurrect the old contrast flag.
        o.set_grayscale(true);
        assert!(!o.high_contrast());
    }

    #[test]
    fn high_contrast_requires_grayscale() {
        let mut o = ConversionOptions::passthrough();
        o.set_high_contrast(true);
        assert!(!o.high_contrast());
        o.set_grayscale(true);
        o.set_high_contrast(true);
        assert!(o.high_contrast());
    }

    #[test]
    fn quality_is_clamped() {
        let mut o = ConversionOptions::default();
        o.set_quality(0.0).unwrap();
        assert!((o.quality() - 0.1).abs() < f32::EPSILON);
        assert_eq!(o.jpeg_quality(), 10);
        o.set_quality(7.5).unwrap();
        assert!((o.quality() - 1.0).abs() < f32::EPSILON);
        assert_eq!(o.jpeg_quality(), 100);
        assert!(o.set_quality(f32::NAN).is_err());
    }

    #[test]
    fn tier_dimensions() {
        assert_eq!(ResizeTarget::None.dimensions(), None);
        assert_eq!(ResizeTarget::Small.dimensions(), Some((758, 1024)));
        assert_eq!(ResizeTarget::Medium.dimensions(), Some((1072, 1448)));
        assert_eq!(ResizeTarget::Large.dimensions(), Some((1272, 1696)));
    }

    #[test]
    fn resize_target_parses() {
        assert_eq!("Large".parse::<ResizeTarget>().unwrap(), ResizeTarget::Large);
        assert_eq!(" none ".parse::<ResizeTarget>().unwrap(), ResizeTarget::None);
        assert!("huge".parse::<ResizeTarget>().is_err());
    }

    #[test]
    fn deserialising_normalises_dependent_flags() {
        let json = r#"{"grayscale":false,"highContrast":true,"resizeTarget":"small","quality":3.0}"#;
        let o: ConversionOptions = serde_json::from_str(json).unwrap();
        assert!(!o.grayscale());
        assert!(!o.high_contrast());
        assert_eq!(o.resize_target(), ResizeTarget::Small);
        assert!((o.quality() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_validates_quality() {
        assert!(ConversionConfig::builder()
            .quality(f32::INFINITY)
            .build()
            .is_err());
        let c = ConversionConfig::builder()
            .grayscale(false)
            .high_contrast(true)
            .build()
            .unwrap();
        assert!(!c.options.high_contrast());
    }

    #[test]
    fn title_falls_back_to_default() {
        let c = ConversionConfig::builder().title("   ").build().unwrap();
        assert_eq!(c.title(), DEFAULT_OUTPUT_NAME);
        let c = ConversionConfig::builder().title("manga_vol1").build().unwrap();
        assert_eq!(c.title(), "manga_vol1");
    }

    #[test]
    fn output_names() {
        assert_eq!(output_file_name(""), "kindle_optimized.pdf");
        assert_eq!(output_file_name("scans"), "scans.pdf");
        assert_eq!(output_file_name("scans.PDF"), "scans.PDF");
        assert_eq!(output_file_name(".pdf"), ".pdf.pdf");
    }
}
