//! Run orchestration: the end-to-end illustration pipeline.
//!
//! ## Why strictly sequential?
//!
//! Documents are processed one at a time, and illustrations one at a time
//! within each document. The global illustration index doubles as the cache
//! key, so its assignment order must be deterministic across runs; parallel
//! generation would make index assignment racy and silently break cache
//! reuse. The pipeline is dominated by service latency anyway, and both
//! services throttle aggressively under concurrent load.

use crate::config::IllustrationConfig;
use crate::error::{DocumentError, IllustrateError};
use crate::output::{
    DocumentOutcome, DocumentReport, IllustrationOutcome, IllustrationReport, RunReport, RunStats,
};
use crate::pipeline::augment::augment_document;
use crate::pipeline::cache::IllustrationCache;
use crate::pipeline::extract::extract_package;
use crate::pipeline::markers;
use crate::pipeline::repack::repack_package;
use crate::prompts::augmentation_instruction;
use crate::services::{
    AugmentRequest, AugmentationService, GeminiAugmentor, ImageService, Services,
    StabilityImageService,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Subdirectory, next to each content document, that receives its images.
const IMAGES_DIR: &str = "Images";

/// Default output path: `<input-without-extension>_illustrated.epub`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    input.with_file_name(format!("{stem}_illustrated.epub"))
}

/// Illustrate an EPUB using service clients built from the environment.
///
/// This is the primary entry point for the library. Reads `GOOGLE_API_KEY`
/// and `STABILITY_API_KEY`; see [`crate::services::Services::from_env`].
///
/// # Arguments
/// * `input` — Path to the EPUB file to illustrate
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(RunReport)` on success, even if some documents or illustrations
/// failed (check `report.stats`).
///
/// # Errors
/// Returns `Err(IllustrateError)` only for fatal errors:
/// - Input file not found or not a readable zip archive
/// - Malformed package (no resolvable spine)
/// - Neither service configured
/// - Output archive could not be written
pub async fn illustrate(
    input: impl AsRef<Path>,
    config: &IllustrationConfig,
) -> Result<RunReport, IllustrateError> {
    let services: Services<GeminiAugmentor, StabilityImageService> = Services::from_env(config)?;
    illustrate_with(input, config, &services).await
}

/// Illustrate an EPUB with caller-supplied service clients.
///
/// Useful for tests (scripted services) and for callers that need custom
/// HTTP middleware or alternative providers behind the same traits.
pub async fn illustrate_with<A, S>(
    input: impl AsRef<Path>,
    config: &IllustrationConfig,
    services: &Services<A, S>,
) -> Result<RunReport, IllustrateError>
where
    A: AugmentationService,
    S: ImageService,
{
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Illustrating {}", input.display());

    // ── Step 1: Check capabilities ───────────────────────────────────────
    services.ensure_configured()?;

    // ── Step 2: Extract the package and resolve the spine ────────────────
    let input_owned = input.to_path_buf();
    let mut package = spawn_blocking(move || extract_package(&input_owned))
        .await
        .map_err(|e| IllustrateError::Internal(format!("extraction task failed: {e}")))??;

    if let Some(limit) = config.max_files {
        if package.spine().len() > limit {
            info!("Processing only the first {limit} spine entries");
            package.truncate_spine(limit);
        }
    }

    let book_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(ref cb) = config.progress {
        cb.on_run_start(package.spine().len());
    }

    // ── Step 3: Process documents in reading order ───────────────────────
    let cache = IllustrationCache::new(config.cache_dir.clone());
    let mut ctx = RunContext {
        next_index: 0,
        augment_ms: 0,
        generation_ms: 0,
    };

    let total = package.spine().len();
    let mut documents = Vec::with_capacity(total);
    for (doc_num, rel) in package.spine().iter().enumerate() {
        if let Some(ref cb) = config.progress {
            cb.on_document_start(doc_num + 1, total, rel);
        }

        let report = process_document(
            package.root(),
            rel,
            &book_name,
            config,
            services,
            &cache,
            &mut ctx,
        )
        .await;

        if let Some(ref cb) = config.progress {
            cb.on_document_complete(doc_num + 1, total, &report.outcome);
        }
        documents.push(report);
    }

    // ── Step 4: Repack the tree into the output archive ──────────────────
    let output_path = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    let root = package.root().to_path_buf();
    let out = output_path.clone();
    spawn_blocking(move || repack_package(&root, &out))
        .await
        .map_err(|e| IllustrateError::Internal(format!("repack task failed: {e}")))??;

    // ── Step 5: Working-tree disposition ─────────────────────────────────
    let working_tree = if config.keep_working_dir {
        let kept = package.keep();
        info!("Keeping working tree at {}", kept.display());
        Some(kept)
    } else {
        drop(package);
        None
    };

    // ── Step 6: Assemble the report ──────────────────────────────────────
    let mut stats = RunStats::tally(&documents);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    stats.augment_duration_ms = ctx.augment_ms;
    stats.generation_duration_ms = ctx.generation_ms;

    info!(
        "Run complete: {}/{} documents rewritten, {} illustration(s) placed, {}ms total",
        stats.documents_rewritten,
        stats.documents_total,
        stats.illustrations_generated + stats.illustrations_cached,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress {
        cb.on_run_complete(&stats);
    }

    Ok(RunReport {
        output_path,
        working_tree,
        documents,
        stats,
    })
}

/// Mutable state threaded through a run: the global illustration counter and
/// accumulated stage timings.
///
/// The counter is never reset between documents; it is the cache-key basis
/// and must advance for every extracted marker, failed or not.
struct RunContext {
    next_index: u64,
    augment_ms: u64,
    generation_ms: u64,
}

/// Drive one content document through augment → extract markers →
/// illustrate → rewrite.
///
/// Never propagates an error upward: every failure is recorded in the
/// returned report so one bad document cannot abort the run.
async fn process_document<A, S>(
    root: &Path,
    rel: &Path,
    book: &str,
    config: &IllustrationConfig,
    services: &Services<A, S>,
    cache: &IllustrationCache,
    ctx: &mut RunContext,
) -> DocumentReport
where
    A: AugmentationService,
    S: ImageService,
{
    let abs = root.join(rel);

    let text = match tokio::fs::read_to_string(&abs).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to read {}: {e}", rel.display());
            return DocumentReport {
                path: rel.to_path_buf(),
                outcome: DocumentOutcome::Failed {
                    error: DocumentError::Io {
                        detail: e.to_string(),
                    },
                },
                illustrations: vec![],
            };
        }
    };

    // Covers, tables of contents, and similar boilerplate pass through
    // byte-identical.
    let chars = text.chars().count();
    if chars < config.min_document_chars {
        debug!("Skipping {} ({chars} chars)", rel.display());
        return DocumentReport {
            path: rel.to_path_buf(),
            outcome: DocumentOutcome::Skipped { chars },
            illustrations: vec![],
        };
    }

    let Some(augmentor) = services.augmentor.as_ref() else {
        return DocumentReport {
            path: rel.to_path_buf(),
            outcome: DocumentOutcome::Failed {
                error: DocumentError::AugmentorMissing,
            },
            illustrations: vec![],
        };
    };

    let document_name = rel
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let instruction = match config.instruction {
        Some(ref custom) => custom.clone(),
        None => augmentation_instruction(book, &document_name),
    };
    let request = AugmentRequest {
        instruction: &instruction,
        text: &text,
    };

    let augment_start = Instant::now();
    let augmented = augment_document(augmentor, &request, &config.retry_policy()).await;
    ctx.augment_ms += augment_start.elapsed().as_millis() as u64;

    let augmented = match augmented {
        Ok(augmented) => augmented,
        Err(error) => {
            warn!("Augmentation failed for {}: {error}", rel.display());
            return DocumentReport {
                path: rel.to_path_buf(),
                outcome: DocumentOutcome::Failed { error },
                illustrations: vec![],
            };
        }
    };

    let descriptions = markers::extract_descriptions(&augmented);
    if descriptions.is_empty() {
        debug!("No markers in {}", rel.display());
        return DocumentReport {
            path: rel.to_path_buf(),
            outcome: DocumentOutcome::NoMarkers,
            illustrations: vec![],
        };
    }
    info!(
        "{}: {} illustration(s) to place",
        rel.display(),
        descriptions.len()
    );

    let doc_dir = abs
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let mut content = augmented;
    let mut illustrations = Vec::with_capacity(descriptions.len());
    let mut placed = 0usize;
    let mut failed = 0usize;

    for description in descriptions {
        // Index advances for every marker, success or not, so cache keys
        // stay aligned across runs.
        let index = ctx.next_index;
        ctx.next_index += 1;

        let file_name = IllustrationCache::entry_name(index);
        let destination = doc_dir.join(IMAGES_DIR).join(&file_name);
        let reference = format!("{IMAGES_DIR}/{file_name}");

        let generation_start = Instant::now();
        let result = cache
            .fetch_or_generate(services.imager.as_ref(), index, &description, &destination)
            .await;
        ctx.generation_ms += generation_start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(source) => match markers::replace_marker(&content, &description, &reference) {
                Some(rewritten) => {
                    content = rewritten;
                    placed += 1;
                    IllustrationOutcome::Placed { source }
                }
                None => {
                    warn!("Marker for '{description}' not found at replacement time");
                    failed += 1;
                    IllustrationOutcome::MarkerNotFound { source }
                }
            },
            Err(error) => {
                warn!("Illustration {index} failed: {error}");
                failed += 1;
                IllustrationOutcome::Failed { error }
            }
        };

        if let Some(ref cb) = config.progress {
            cb.on_illustration(index, &description, &outcome);
        }
        illustrations.push(IllustrationReport {
            index,
            description,
            outcome,
        });
    }

    if let Err(e) = tokio::fs::write(&abs, &content).await {
        warn!("Failed to write {}: {e}", rel.display());
        return DocumentReport {
            path: rel.to_path_buf(),
            outcome: DocumentOutcome::Failed {
                error: DocumentError::Io {
                    detail: e.to_string(),
                },
            },
            illustrations,
        };
    }

    DocumentReport {
        path: rel.to_path_buf(),
        outcome: DocumentOutcome::Rewritten { placed, failed },
        illustrations,
    }
}
