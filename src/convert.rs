//! Conversion entry points.
//!
//! [`process`] is the synchronous core: it walks the images in order and
//! drives each one through the pipeline stages, one image fully before the
//! next. [`convert`] runs it on tokio's blocking pool so async callers stay
//! responsive, and [`convert_to_file`] adds an atomic write of the result.
//! Use [`crate::stream::convert_stream`] to receive progress as a channel.

use crate::config::{ConversionConfig, DecodeFailurePolicy};
use crate::error::{ImageError, KindlePdfError};
use crate::image_set::{ManagedImage, OrderedImageSet, PreviewStore};
use crate::output::{ConversionOutput, ConversionStats, PageOrientation, PageResult};
use crate::pipeline::document::PdfBuilder;
use crate::pipeline::encode::{self, EncodedImage, JpegColor, JpegWriter};
use crate::pipeline::resize::{self, Workspace};
use crate::pipeline::{decode, tone};
use crate::progress::{
    percent_before, processing_message, ConversionProgressCallback, NoopProgressCallback,
    COMPLETE_MESSAGE,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert `images` into one PDF, in order, on the current thread.
///
/// `images` is the run's snapshot: normally
/// [`OrderedImageSet::image_only_snapshot`]. Progress goes to the configured
/// callback, if any.
///
/// # Errors
/// - [`KindlePdfError::EmptySelection`] when `images` is empty; nothing is
///   reported to the callback
/// - the first decode/encode failure, under the default abort policy
/// - [`KindlePdfError::AllImagesFailed`] when every image failed in skip mode
/// - [`KindlePdfError::Cancelled`] when the cancel flag was raised
pub fn process(
    images: &[ManagedImage],
    config: &ConversionConfig,
) -> Result<ConversionOutput, KindlePdfError> {
    if images.is_empty() {
        return Err(KindlePdfError::EmptySelection);
    }

    let start = Instant::now();
    let total = images.len();
    let options = &config.options;
    let noop = NoopProgressCallback;
    let progress: &dyn ConversionProgressCallback = match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &noop,
    };

    info!(
        "Starting conversion: {} images (resize={}, grayscale={}, high_contrast={}, quality={})",
        total,
        options.resize_target(),
        options.grayscale(),
        options.high_contrast(),
        options.quality()
    );
    progress.on_conversion_start(total);

    let color = if options.grayscale() {
        JpegColor::Gray
    } else {
        JpegColor::Rgb
    };
    let mut workspace = Workspace::new();
    let mut writer = JpegWriter::new(options.jpeg_quality(), color);
    let mut builder = PdfBuilder::new(config.title());
    let mut pages = Vec::with_capacity(total);

    for (index, image) in images.iter().enumerate() {
        if config
            .cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.is_cancelled())
        {
            info!("Conversion cancelled after {}/{} images", index, total);
            return Err(KindlePdfError::Cancelled {
                processed: index,
                total,
            });
        }

        progress.on_progress(percent_before(index, total), &processing_message(&image.name));

        match convert_image(image, config, &mut workspace, &mut writer) {
            Ok((encoded, (source_width, source_height))) => {
                let (width, height) = (encoded.width, encoded.height);
                let encoded_bytes = encoded.data.len();
                let orientation = builder.add_page(encoded)?;
                let page = PageResult {
                    index,
                    id: image.id,
                    name: image.name.clone(),
                    source_width,
                    source_height,
                    width,
                    height,
                    orientation,
                    encoded_bytes,
                    error: None,
                };
                progress.on_image_complete(index, total, &page);
                pages.push(page);
            }
            Err(err) => {
                if config.failure_policy == DecodeFailurePolicy::Abort {
                    warn!("Aborting conversion at image {}: {}", index + 1, err);
                    return Err(err);
                }
                let image_err = ImageError::from_fatal(index, err)?;
                warn!("Skipping image {}/{}: {}", index + 1, total, image_err);
                progress.on_image_error(index, total, &image_err);
                pages.push(PageResult {
                    index,
                    id: image.id,
                    name: image.name.clone(),
                    source_width: 0,
                    source_height: 0,
                    width: 0,
                    height: 0,
                    orientation: PageOrientation::Landscape,
                    encoded_bytes: 0,
                    error: Some(image_err),
                });
            }
        }
    }

    let converted = builder.page_count();
    if converted == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(KindlePdfError::AllImagesFailed { total, first_error });
    }

    let document = builder.finish()?;
    progress.on_progress(100, COMPLETE_MESSAGE);

    let stats = ConversionStats {
        total_images: total,
        converted_images: converted,
        skipped_images: total - converted,
        document_bytes: document.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} pages, {} bytes, {}ms",
        converted, total, stats.document_bytes, stats.duration_ms
    );
    progress.on_conversion_complete(total, converted);

    Ok(ConversionOutput {
        document,
        pages,
        stats,
    })
}

/// Convert `images` on tokio's blocking pool.
///
/// The images are moved into the task; the caller's set is never borrowed
/// across the await.
///
/// # Example
/// ```rust,no_run
/// use kindle_pdf::{convert, ConversionConfig, OrderedImageSet, RawFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut set = OrderedImageSet::new();
/// set.append([RawFile::from_path("scan_001.jpg")?, RawFile::from_path("scan_002.jpg")?]);
/// let output = convert(set.image_only_snapshot(), &ConversionConfig::default()).await?;
/// std::fs::write("kindle_optimized.pdf", &output.document)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    images: Vec<ManagedImage>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, KindlePdfError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || process(&images, &config))
        .await
        .map_err(|e| KindlePdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Snapshot the image entries of `set` and convert them.
///
/// Non-image entries are left out; an empty snapshot is rejected before the
/// pipeline starts.
pub async fn convert_set<P: PreviewStore>(
    set: &OrderedImageSet<P>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, KindlePdfError> {
    convert(set.image_only_snapshot(), config).await
}

/// Convert and write the document to `output_path`.
///
/// The bytes go to a temporary file in the destination directory which is
/// then renamed over `output_path`, so a failed run never leaves a partial
/// document behind.
pub async fn convert_to_file(
    images: Vec<ManagedImage>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, KindlePdfError> {
    let output = convert(images, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let document = output.document.clone();

    tokio::task::spawn_blocking(move || write_atomically(&path, &document))
        .await
        .map_err(|e| KindlePdfError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(output)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// decode → resize → tone → encode for one image.
///
/// Returns the encoded page and the source dimensions.
fn convert_image(
    image: &ManagedImage,
    config: &ConversionConfig,
    workspace: &mut Workspace,
    writer: &mut JpegWriter,
) -> Result<(EncodedImage, (u32, u32)), KindlePdfError> {
    let options = &config.options;
    let decoded = decode::decode_image(image)?;
    let source = (decoded.width(), decoded.height());

    let (width, height) = resize::target_dimensions(source.0, source.1, options.resize_target());
    encode::check_dimensions(&image.name, width, height)?;
    let mut raster = workspace.resample(&decoded, width, height);
    drop(decoded);
    tone::apply(&mut raster, options);

    let encoded = writer.encode(&image.name, &raster);
    workspace.recycle(raster);
    let encoded = encoded?;
    debug!(
        "'{}': {}x{} → {}x{} ({} bytes)",
        image.name,
        source.0,
        source.1,
        width,
        height,
        encoded.data.len()
    );
    Ok((encoded, source))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), KindlePdfError> {
    let write_err = |source: std::io::Error| KindlePdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizeTarget;
    use crate::image_set::RawFile;
    use crate::progress::CancelFlag;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn png(name: &str, w: u32, h: u32) -> ManagedImage {
        let img = RgbImage::from_pixel(w, h, Rgb([120, 80, 40]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        ManagedImage::from_raw(RawFile::from_bytes(name, buf))
    }

    fn broken(name: &str) -> ManagedImage {
        ManagedImage::from_raw(
            RawFile::from_bytes(name, b"not an image".to_vec()).with_mime_type("image/jpeg"),
        )
    }

    #[derive(Default)]
    struct Recorder {
        percents: Mutex<Vec<u8>>,
        errors: Mutex<Vec<ImageError>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_progress(&self, percent: u8, _message: &str) {
            self.percents.lock().unwrap().push(percent);
        }

        fn on_image_error(&self, _index: usize, _total: usize, error: &ImageError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    #[test]
    fn empty_selection_is_rejected_without_events() {
        let rec = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .progress_callback(rec.clone())
            .build()
            .unwrap();
        let err = process(&[], &config).unwrap_err();
        assert!(matches!(err, KindlePdfError::EmptySelection));
        assert!(rec.percents.lock().unwrap().is_empty());
    }

    #[test]
    fn progress_is_floored_then_hits_100() {
        let rec = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .resize_target(ResizeTarget::None)
            .progress_callback(rec.clone())
            .build()
            .unwrap();
        let images = [png("a", 4, 4), png("b", 4, 4), png("c", 4, 4)];
        let out = process(&images, &config).unwrap();
        assert_eq!(out.page_count(), 3);
        assert_eq!(*rec.percents.lock().unwrap(), [0, 33, 66, 100]);
    }

    #[test]
    fn abort_policy_propagates_first_failure() {
        let config = ConversionConfig::default();
        let images = [png("ok.png", 8, 8), broken("bad.jpg"), png("later.png", 8, 8)];
        let err = process(&images, &config).unwrap_err();
        assert_eq!(err.image_name(), Some("bad.jpg"));
    }

    #[test]
    fn skip_policy_keeps_good_pages_in_order() {
        let rec = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .resize_target(ResizeTarget::Small)
            .failure_policy(DecodeFailurePolicy::Skip)
            .progress_callback(rec.clone())
            .build()
            .unwrap();
        let images = [png("one", 100, 200), broken("two"), png("three", 200, 100)];
        let out = process(&images, &config).unwrap();

        assert_eq!(out.page_count(), 2);
        assert_eq!(out.stats.skipped_images, 1);
        let names: Vec<&str> = out.converted_pages().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["one", "three"]);
        assert!(matches!(
            out.pages[1].error,
            Some(ImageError::DecodeFailed { index: 1, .. })
        ));
        assert_eq!(rec.errors.lock().unwrap().len(), 1);
        assert_eq!(*rec.percents.lock().unwrap().last().unwrap(), 100);
    }

    #[test]
    fn extreme_aspect_ratio_fails_before_resampling() {
        // 1 x 100 at the small tier becomes 758 x 75800.
        let err = process(
            &[png("strip.png", 1, 100)],
            &ConversionConfig::builder()
                .resize_target(ResizeTarget::Small)
                .build()
                .unwrap(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KindlePdfError::EncodeFailed { ref name, .. } if name == "strip.png"
        ));

        let config = ConversionConfig::builder()
            .resize_target(ResizeTarget::Small)
            .failure_policy(DecodeFailurePolicy::Skip)
            .build()
            .unwrap();
        let out = process(&[png("strip.png", 1, 100), png("page.png", 10, 10)], &config).unwrap();
        assert_eq!(out.page_count(), 1);
        assert!(matches!(
            out.pages[0].error,
            Some(ImageError::EncodeFailed { index: 0, .. })
        ));
    }

    #[test]
    fn skip_policy_with_nothing_left_fails() {
        let config = ConversionConfig::builder()
            .failure_policy(DecodeFailurePolicy::Skip)
            .build()
            .unwrap();
        let err = process(&[broken("x"), broken("y")], &config).unwrap_err();
        assert!(matches!(
            err,
            KindlePdfError::AllImagesFailed { total: 2, .. }
        ));
    }

    #[test]
    fn raised_cancel_flag_stops_before_first_image() {
        let flag = CancelFlag::new();
        flag.cancel();
        let config = ConversionConfig::builder()
            .cancel_flag(flag)
            .build()
            .unwrap();
        let err = process(&[png("a", 2, 2)], &config).unwrap_err();
        assert!(matches!(
            err,
            KindlePdfError::Cancelled {
                processed: 0,
                total: 1
            }
        ));
    }

    #[test]
    fn page_results_record_source_and_page_sizes() {
        let config = ConversionConfig::builder()
            .resize_target(ResizeTarget::Medium)
            .build()
            .unwrap();
        let out = process(&[png("wide", 2144, 1000)], &config).unwrap();
        let page = &out.pages[0];
        assert_eq!((page.source_width, page.source_height), (2144, 1000));
        assert_eq!((page.width, page.height), (1072, 500));
        assert_eq!(page.orientation, PageOrientation::Landscape);
        assert!(page.encoded_bytes > 0);
        assert_eq!(out.stats.document_bytes, out.document.len());
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.pdf");
        write_atomically(&path, b"%PDF-1.5 test").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 test");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn convert_set_uses_image_entries_only() {
        let mut set = OrderedImageSet::new();
        set.append([RawFile::from_bytes("notes.txt", b"hello".to_vec())]);
        let err = convert_set(&set, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, KindlePdfError::EmptySelection));

        let img = png("a", 10, 20);
        set.append([RawFile {
            name: img.name,
            source: img.source,
            size_bytes: img.size_bytes,
            modified_at: img.modified_at,
            mime_type: img.mime_type,
        }]);
        let out = convert_set(&set, &ConversionConfig::default()).await.unwrap();
        assert_eq!(out.page_count(), 1);
    }
}
