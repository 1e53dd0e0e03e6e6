//! Channel-based conversion API: progress as a stream of events.
//!
//! [`convert_stream`] starts a run on tokio's blocking pool and hands back
//! the receiving end of a bounded channel of [`ProgressEvent`]s plus a handle
//! to the final result. This is the shape a UI event loop wants: it awaits
//! events on its own task and never shares state with the worker.
//!
//! The channel applies back-pressure: once [`EVENT_CHANNEL_CAPACITY`] events
//! are buffered the worker waits for the consumer. Either drain
//! [`ConversionStream::events`] or drop it; a dropped receiver does not fail
//! the run.

use crate::config::ConversionConfig;
use crate::convert::process;
use crate::error::{ImageError, KindlePdfError};
use crate::image_set::ManagedImage;
use crate::output::{ConversionOutput, PageResult};
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Buffered events before the worker blocks on a slow consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// One progress event of a run, mirroring [`ConversionProgressCallback`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Progress {
        percent: u8,
        message: String,
    },
    ImageComplete {
        index: usize,
        total: usize,
        page: PageResult,
    },
    ImageFailed {
        index: usize,
        total: usize,
        error: ImageError,
    },
    Finished {
        total: usize,
        converted: usize,
    },
}

/// A running conversion.
pub struct ConversionStream {
    /// Events in emission order; closes when the run ends.
    pub events: mpsc::Receiver<ProgressEvent>,
    result: JoinHandle<Result<ConversionOutput, KindlePdfError>>,
}

impl ConversionStream {
    /// Split into a `Stream` of events and the result handle.
    pub fn into_parts(
        self,
    ) -> (
        ReceiverStream<ProgressEvent>,
        JoinHandle<Result<ConversionOutput, KindlePdfError>>,
    ) {
        (ReceiverStream::new(self.events), self.result)
    }

    /// Drop the event receiver and wait for the result.
    pub async fn output(self) -> Result<ConversionOutput, KindlePdfError> {
        drop(self.events);
        join(self.result).await
    }

    /// Drain every event, then wait for the result.
    pub async fn collect(mut self) -> (Vec<ProgressEvent>, Result<ConversionOutput, KindlePdfError>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        (events, join(self.result).await)
    }
}

/// Start converting `images` and stream its progress.
///
/// Events also reach the callback configured on `config`, if any. Must be
/// called from within a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use kindle_pdf::{convert_stream, ConversionConfig, OrderedImageSet, ProgressEvent};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let set = OrderedImageSet::new();
/// let mut run = convert_stream(set.image_only_snapshot(), &ConversionConfig::default());
/// while let Some(event) = run.events.recv().await {
///     if let ProgressEvent::Progress { percent, message } = event {
///         eprintln!("{percent:>3}% {message}");
///     }
/// }
/// let output = run.output().await?;
/// # Ok(())
/// # }
/// ```
pub fn convert_stream(images: Vec<ManagedImage>, config: &ConversionConfig) -> ConversionStream {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut run_config = config.clone();
    run_config.progress_callback = Some(Arc::new(ChannelCallback {
        tx,
        inner: config.progress_callback.clone(),
    }));

    let result = tokio::task::spawn_blocking(move || process(&images, &run_config));
    ConversionStream { events: rx, result }
}

async fn join(
    handle: JoinHandle<Result<ConversionOutput, KindlePdfError>>,
) -> Result<ConversionOutput, KindlePdfError> {
    handle
        .await
        .map_err(|e| KindlePdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Forwards callback events into the channel and to the caller's callback.
///
/// Runs on the blocking worker, where `blocking_send` is allowed.
struct ChannelCallback {
    tx: mpsc::Sender<ProgressEvent>,
    inner: Option<ProgressCallback>,
}

impl ChannelCallback {
    fn send(&self, event: ProgressEvent) {
        // A closed channel only means nobody is listening any more.
        let _ = self.tx.blocking_send(event);
    }
}

impl ConversionProgressCallback for ChannelCallback {
    fn on_conversion_start(&self, total_images: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_conversion_start(total_images);
        }
        self.send(ProgressEvent::Started {
            total: total_images,
        });
    }

    fn on_progress(&self, percent: u8, message: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_progress(percent, message);
        }
        self.send(ProgressEvent::Progress {
            percent,
            message: message.to_string(),
        });
    }

    fn on_image_complete(&self, index: usize, total: usize, page: &PageResult) {
        if let Some(ref cb) = self.inner {
            cb.on_image_complete(index, total, page);
        }
        self.send(ProgressEvent::ImageComplete {
            index,
            total,
            page: page.clone(),
        });
    }

    fn on_image_error(&self, index: usize, total: usize, error: &ImageError) {
        if let Some(ref cb) = self.inner {
            cb.on_image_error(index, total, error);
        }
        self.send(ProgressEvent::ImageFailed {
            index,
            total,
            error: error.clone(),
        });
    }

    fn on_conversion_complete(&self, total_images: usize, converted: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_conversion_complete(total_images, converted);
        }
        self.send(ProgressEvent::Finished {
            total: total_images,
            converted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_set::RawFile;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png(name: &str) -> ManagedImage {
        let img = RgbImage::from_pixel(6, 9, Rgb([30, 60, 90]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        ManagedImage::from_raw(RawFile::from_bytes(name, buf))
    }

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl ConversionProgressCallback for Count {
        fn on_progress(&self, _percent: u8, _message: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_end_with_finished() {
        let run = convert_stream(vec![png("a"), png("b")], &ConversionConfig::default());
        let (events, result) = run.collect().await;
        let output = result.unwrap();
        assert_eq!(output.page_count(), 2);

        assert!(matches!(events.first(), Some(ProgressEvent::Started { total: 2 })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Finished {
                total: 2,
                converted: 2
            })
        ));
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, [0, 50, 100]);
    }

    #[tokio::test]
    async fn configured_callback_still_receives_events() {
        let count = Arc::new(Count::default());
        let config = ConversionConfig::builder()
            .progress_callback(count.clone())
            .build()
            .unwrap();
        let output = convert_stream(vec![png("a")], &config).output().await.unwrap();
        assert_eq!(output.page_count(), 1);
        assert_eq!(count.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_fail_run() {
        let images: Vec<ManagedImage> = (0..40).map(|i| png(&format!("p{i}"))).collect();
        let output = convert_stream(images, &ConversionConfig::default())
            .output()
            .await
            .unwrap();
        assert_eq!(output.page_count(), 40);
    }

    #[tokio::test]
    async fn empty_run_reports_error_through_handle() {
        let (events, result) = convert_stream(Vec::new(), &ConversionConfig::default())
            .collect()
            .await;
        assert!(events.is_empty());
        assert!(matches!(result, Err(KindlePdfError::EmptySelection)));
    }

    #[tokio::test]
    async fn into_parts_yields_a_stream() {
        use tokio_stream::StreamExt;

        let (events, handle) =
            convert_stream(vec![png("a")], &ConversionConfig::default()).into_parts();
        let events: Vec<ProgressEvent> = events.collect().await;
        assert_eq!(events.len(), 5);
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn events_serialise_with_tag() {
        let json = serde_json::to_string(&ProgressEvent::Progress {
            percent: 50,
            message: "Processing: a.png".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"progress","percent":50,"message":"Processing: a.png"}"#
        );
    }
}
