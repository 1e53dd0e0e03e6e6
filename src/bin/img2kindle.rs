//! CLI binary for kindle-pdf.
//!
//! A thin shim over the library crate: expands the inputs into an
//! `OrderedImageSet`, maps CLI flags to `ConversionConfig` and writes the
//! document.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use kindle_pdf::image_set::compare_names;
use kindle_pdf::{
    convert_to_file, format_date, format_size, output_file_name, ConversionConfig, ConversionStats,
    ConversionProgressCallback, DecodeFailurePolicy, ImageError, OrderedImageSet, PageResult,
    ProgressCallback, RawFile, ResizeTarget, SortKey, DEFAULT_OUTPUT_NAME,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a percent bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Remove the bar whatever the outcome of the run.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_images: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_images} images…"))
        ));
    }

    fn on_progress(&self, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, page: &PageResult) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            page.name,
            dim(&format!(
                "{}x{} → {}x{} {}",
                page.source_width, page.source_height, page.width, page.height, page.orientation
            )),
            dim(&format_size(page.encoded_bytes as u64)),
        ));
    }

    fn on_image_error(&self, index: usize, total: usize, error: &ImageError) {
        let error = error.to_string();
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
    }

    fn on_conversion_complete(&self, _total_images: usize, _converted: usize) {
        // The run summary is printed once by `main`, after the file is written.
        self.clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every image in a folder, name order, Kindle Paperwhite size
  img2kindle scans/ -o manga.pdf

  # Explicit files keep the order given on the command line
  img2kindle cover.png 001.jpg 002.jpg --name volume1

  # Oldest first, colour, original size, high quality
  img2kindle photos/ --sort date_asc --no-grayscale --size none --quality 0.9

  # Keep going past corrupt files
  img2kindle dump/ --skip-invalid

  # Inspect the ordered list without converting
  img2kindle scans/ --sort size_desc --list

SIZE TIERS:
  Tier     Width    Nominal height
  ──────   ──────   ──────────────
  small    758 px   1024 px
  medium   1072 px  1448 px   (default)
  large    1272 px  1696 px
  none     keep original dimensions

  Width is always forced to the tier width; height follows the image.

SORT KEYS:
  manual (default: command-line order), name_asc, name_desc,
  date_asc, date_desc, size_asc, size_desc

ENVIRONMENT VARIABLES:
  Every flag can also be set as IMG2KINDLE_<FLAG>, e.g. IMG2KINDLE_SIZE=large.
  RUST_LOG overrides the log filter.
"#;

/// Convert images to a PDF optimised for e-ink readers.
#[derive(Parser, Debug)]
#[command(
    name = "img2kindle",
    version,
    about = "Convert images to a PDF optimised for Kindle and other e-ink readers",
    long_about = "Convert an ordered set of images into one PDF. Each image becomes a full-bleed \
page resized to an e-reader width, optionally converted to grayscale with a contrast boost, \
and re-encoded as JPEG.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files or directories (directories expand to their files, by name).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the PDF here instead of `<name>.pdf` in the current directory.
    #[arg(short, long, env = "IMG2KINDLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Base name of the document; also used as its title.
    #[arg(long, env = "IMG2KINDLE_NAME", default_value = DEFAULT_OUTPUT_NAME)]
    name: String,

    /// Page width tier.
    #[arg(long, env = "IMG2KINDLE_SIZE", value_enum, default_value = "medium")]
    size: SizeArg,

    /// JPEG quality factor (0.1–1.0).
    #[arg(long, env = "IMG2KINDLE_QUALITY", default_value_t = 0.6)]
    quality: f32,

    /// Keep colour instead of converting to grayscale.
    #[arg(long, env = "IMG2KINDLE_NO_GRAYSCALE")]
    no_grayscale: bool,

    /// Skip the contrast stretch applied to grayscale pages.
    #[arg(long, env = "IMG2KINDLE_NO_HIGH_CONTRAST")]
    no_high_contrast: bool,

    /// Page order.
    #[arg(long, env = "IMG2KINDLE_SORT", default_value = "manual")]
    sort: SortKey,

    /// Drop images that fail to decode instead of aborting.
    #[arg(long, env = "IMG2KINDLE_SKIP_INVALID")]
    skip_invalid: bool,

    /// Print the ordered file list and exit.
    #[arg(long, env = "IMG2KINDLE_LIST")]
    list: bool,

    /// Print a JSON summary (ConversionOutput without the PDF bytes) to stdout.
    #[arg(long, env = "IMG2KINDLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2KINDLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2KINDLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2KINDLE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SizeArg {
    None,
    Small,
    Medium,
    Large,
}

impl From<SizeArg> for ResizeTarget {
    fn from(v: SizeArg) -> Self {
        match v {
            SizeArg::None => ResizeTarget::None,
            SizeArg::Small => ResizeTarget::Small,
            SizeArg::Medium => ResizeTarget::Medium,
            SizeArg::Large => ResizeTarget::Large,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build the ordered set ────────────────────────────────────────────
    let files = expand_inputs(&cli.inputs)?;
    let mut set = OrderedImageSet::new();
    set.append(files);
    set.sort_by(cli.sort);

    let snapshot = set.image_only_snapshot();
    let ignored = set.len() - snapshot.len();
    debug!(
        "{} entries, {} images, {} ignored",
        set.len(),
        snapshot.len(),
        ignored
    );

    if cli.list {
        print_listing(&set);
        return Ok(());
    }

    if ignored > 0 && !cli.quiet {
        eprintln!(
            "{} {} non-image file(s) will be left out",
            dim("ℹ"),
            ignored
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_file_name(&cli.name)));

    // ── Run conversion ───────────────────────────────────────────────────
    let result = convert_to_file(snapshot, &output_path, &config).await;
    if let Some(ref cb) = cli_progress {
        cb.clear();
    }
    let output = result.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        eprintln!("{}", summary_line(&output.stats, &output_path));
    }

    Ok(())
}

/// One-line result of a successful run.
fn summary_line(stats: &ConversionStats, path: &Path) -> String {
    let skipped = if stats.skipped_images == 0 {
        String::new()
    } else {
        format!("  ({} skipped)", red(&stats.skipped_images.to_string()))
    };
    format!(
        "{}  {}/{} pages{}  {}  {}ms  →  {}",
        if stats.skipped_images == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.converted_images,
        stats.total_images,
        skipped,
        format_size(stats.document_bytes as u64),
        stats.duration_ms,
        bold(&path.display().to_string()),
    )
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .grayscale(!cli.no_grayscale)
        .high_contrast(!cli.no_grayscale && !cli.no_high_contrast)
        .resize_target(cli.size.into())
        .quality(cli.quality)
        .title(cli.name.clone())
        .failure_policy(if cli.skip_invalid {
            DecodeFailurePolicy::Skip
        } else {
            DecodeFailurePolicy::Abort
        });

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Expand files and directories into raw files, in argument order.
///
/// A directory contributes its direct regular files, sorted by name.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<RawFile>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = read_dir_files(input)?;
            entries.sort_by(|a, b| compare_names(&a.name, &b.name));
            files.extend(entries);
        } else {
            files.push(
                RawFile::from_path(input)
                    .with_context(|| format!("Failed to read {}", input.display()))?,
            );
        }
    }
    Ok(files)
}

fn read_dir_files(dir: &Path) -> Result<Vec<RawFile>> {
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .path();
        if path.is_file() {
            files.push(
                RawFile::from_path(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
            );
        }
    }
    Ok(files)
}

fn print_listing(set: &OrderedImageSet) {
    println!(
        "{} entries  (sort: {})",
        bold(&set.len().to_string()),
        set.sort_mode()
    );
    for (i, entry) in set.iter().enumerate() {
        let marker = if entry.is_image() {
            green("•")
        } else {
            dim("–")
        };
        println!(
            "{marker} {:>4}  {:<40}  {:>9}  {}  {}",
            i + 1,
            entry.name,
            entry.display_size(),
            format_date(&entry.modified_at.with_timezone(&chrono::Local)),
            dim(&entry.mime_type),
        );
    }
}
