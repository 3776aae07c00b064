//! CLI binary for epub-illustrator.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IllustrationConfig` and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use epub_illustrator::{
    illustrate, DocumentOutcome, IllustrationConfig, IllustrationOutcome, IllustrationProgress,
    ImageSource, ProgressHook, RunStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

/// Truncate a message for single-line terminal output.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar across documents plus per-document
/// and per-illustration log lines.
struct CliProgress {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
}

impl CliProgress {
    /// Create a callback whose progress-bar length is set by `on_run_start`
    /// once the spine has been resolved.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Spinner only until the document count is known.
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening EPUB…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Illustrating");
    }
}

impl IllustrationProgress for CliProgress {
    fn on_run_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Processing {total_documents} content document(s)…"
            ))
        ));
    }

    fn on_document_start(&self, _doc_num: usize, _total: usize, path: &Path) {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(name);
    }

    fn on_document_complete(&self, doc_num: usize, total: usize, outcome: &DocumentOutcome) {
        let line = match outcome {
            DocumentOutcome::Rewritten { placed, failed } => format!(
                "  {} Document {:>3}/{:<3}  {} illustration(s) placed{}",
                green("✓"),
                doc_num,
                total,
                placed,
                if *failed > 0 {
                    red(&format!("  {failed} failed"))
                } else {
                    String::new()
                },
            ),
            DocumentOutcome::Skipped { chars } => format!(
                "  {} Document {:>3}/{:<3}  {}",
                dim("·"),
                doc_num,
                total,
                dim(&format!("skipped ({chars} chars)")),
            ),
            DocumentOutcome::NoMarkers => format!(
                "  {} Document {:>3}/{:<3}  {}",
                dim("·"),
                doc_num,
                total,
                dim("no markers"),
            ),
            DocumentOutcome::Failed { error } => format!(
                "  {} Document {:>3}/{:<3}  {}",
                red("✗"),
                doc_num,
                total,
                red(&truncate(&error.to_string(), 80)),
            ),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_illustration(&self, index: u64, description: &str, outcome: &IllustrationOutcome) {
        let line = match outcome {
            IllustrationOutcome::Placed { source } => format!(
                "      {} illustration_{index}.png  {}  {}",
                green("✓"),
                dim(match source {
                    ImageSource::Cached => "cached",
                    ImageSource::Generated => "generated",
                }),
                dim(&truncate(description, 60)),
            ),
            IllustrationOutcome::MarkerNotFound { .. } => format!(
                "      {} illustration_{index}.png  {}",
                cyan("⚠"),
                dim("image saved, but its marker was not found"),
            ),
            IllustrationOutcome::Failed { error } => format!(
                "      {} illustration_{index}  {}",
                red("✗"),
                red(&truncate(&error.to_string(), 70)),
            ),
        };
        self.bar.println(line);
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        let placed = stats.illustrations_generated + stats.illustrations_cached;

        if stats.documents_failed == 0 && stats.illustrations_failed == 0 {
            eprintln!(
                "{} {} document(s) processed, {} illustration(s) placed",
                green("✔"),
                bold(&stats.documents_total.to_string()),
                bold(&placed.to_string()),
            );
        } else {
            eprintln!(
                "{} {}/{} documents rewritten  ({} document failures, {} illustration failures)",
                cyan("⚠"),
                bold(&stats.documents_rewritten.to_string()),
                stats.documents_total,
                red(&stats.documents_failed.to_string()),
                red(&stats.illustrations_failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Illustrate a book (writes book_illustrated.epub next to the input)
  epub-illustrator book.epub

  # Explicit output path
  epub-illustrator book.epub -o illustrated.epub

  # Bounded test run: first 3 spine entries only
  epub-illustrator book.epub -m 3

  # Placement only (no STABILITY_API_KEY): markers inserted, images skipped
  GOOGLE_API_KEY=... epub-illustrator book.epub

  # Keep the working tree and print the full report as JSON
  epub-illustrator book.epub --keep-workdir --json > report.json

ILLUSTRATION CACHE:
  Generated images land in ./illustrations/illustration_<N>.png, keyed by
  the global generation index. A second run over the same book reuses them
  without contacting the image service. The key is positional, not
  content-addressed: if the book or the augmentation output changes between
  runs, clear the cache directory to avoid stale pairings.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY       Gemini API key (illustration placement)
  STABILITY_API_KEY    Stability AI API key (image generation)

  Either key may be omitted; that service is then skipped. Both missing is
  an error. Variables are also read from a .env file in the working
  directory.

SETUP:
  1. Set keys:      export GOOGLE_API_KEY=...  STABILITY_API_KEY=...
  2. Illustrate:    epub-illustrator book.epub
"#;

/// Illustrate EPUB books with AI-generated images.
#[derive(Parser, Debug)]
#[command(
    name = "epub-illustrator",
    version,
    about = "Illustrate EPUB books with AI-generated images",
    long_about = "Illustrate EPUB books end to end: Gemini reads each chapter and marks where \
a picture would help, Stability AI renders each description, and the tool rewrites the markup \
and repackages a valid EPUB. Images are cached in ./illustrations so repeat runs are cheap.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the EPUB file to illustrate.
    input: PathBuf,

    /// Write the illustrated EPUB here instead of `<input>_illustrated.epub`.
    #[arg(short, long, env = "EPUB_ILLUSTRATOR_OUTPUT")]
    output: Option<PathBuf>,

    /// Process only the first N spine entries (bounded test runs).
    #[arg(short = 'm', long, env = "EPUB_ILLUSTRATOR_MAX_FILES")]
    max_files: Option<usize>,

    /// Gemini model used for illustration placement.
    #[arg(long, env = "EPUB_ILLUSTRATOR_MODEL", default_value = "gemini-2.5-pro")]
    model: String,

    /// Stability AI engine used for image generation.
    #[arg(
        long,
        env = "EPUB_ILLUSTRATOR_ENGINE",
        default_value = "stable-diffusion-xl-1024-v1-0"
    )]
    engine: String,

    /// Directory for the persistent illustration cache.
    #[arg(
        long,
        env = "EPUB_ILLUSTRATOR_CACHE_DIR",
        default_value = "./illustrations"
    )]
    cache_dir: PathBuf,

    /// Skip documents with fewer characters than this.
    #[arg(long, env = "EPUB_ILLUSTRATOR_MIN_CHARS", default_value_t = 400)]
    min_chars: usize,

    /// Augmentation attempts per document (transient failures only).
    #[arg(long, env = "EPUB_ILLUSTRATOR_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Wait between augmentation attempts, in milliseconds.
    #[arg(long, env = "EPUB_ILLUSTRATOR_RETRY_BACKOFF_MS", default_value_t = 5000)]
    retry_backoff_ms: u64,

    /// Per-service-call HTTP timeout in seconds.
    #[arg(long, env = "EPUB_ILLUSTRATOR_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Keep the extracted working tree on disk for inspection.
    #[arg(long, env = "EPUB_ILLUSTRATOR_KEEP_WORKDIR")]
    keep_workdir: bool,

    /// Print the full run report as JSON to stdout.
    #[arg(long, env = "EPUB_ILLUSTRATOR_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "EPUB_ILLUSTRATOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EPUB_ILLUSTRATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EPUB_ILLUSTRATOR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a .env file; load it before clap reads env
    // defaults.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressHook> = if show_progress {
        let cb = CliProgress::new_dynamic();
        Some(cb as Arc<dyn IllustrationProgress>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = illustrate(&cli.input, &config)
        .await
        .context("Illustration failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialise run report")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet && !show_progress {
        // Plain summary when the progress callback did not already print one.
        let stats = &report.stats;
        eprintln!(
            "Rewrote {}/{} documents, {} illustration(s) placed, {} failed",
            stats.documents_rewritten,
            stats.documents_total,
            stats.illustrations_generated + stats.illustrations_cached,
            stats.illustrations_failed,
        );
    }

    if !cli.quiet {
        eprintln!(
            "   {}ms total  →  {}",
            report.stats.total_duration_ms,
            bold(&report.output_path.display().to_string()),
        );
        if let Some(ref tree) = report.working_tree {
            eprintln!("   working tree kept at {}", dim(&tree.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `IllustrationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressHook>) -> Result<IllustrationConfig> {
    let mut builder = IllustrationConfig::builder()
        .min_document_chars(cli.min_chars)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .cache_dir(&cli.cache_dir)
        .augment_model(cli.model.as_str())
        .image_engine(cli.engine.as_str())
        .keep_working_dir(cli.keep_workdir)
        .api_timeout_secs(cli.api_timeout);

    if let Some(n) = cli.max_files {
        builder = builder.max_files(n);
    }
    if let Some(ref output) = cli.output {
        builder = builder.output(output);
    }
    if let Some(cb) = progress {
        builder = builder.progress(cb);
    }

    builder.build().context("Invalid configuration")
}
