//! The on-disk illustration cache and the fetch-or-generate workflow.
//!
//! Generated images are stored under a persistent local directory keyed by
//! the **global generation index** (`illustration_<index>.png`), so a rerun
//! over the same book reuses images instead of paying for regeneration.
//!
//! The key is positional, not content-addressed: nothing ties a cache entry
//! to the description it was generated for. If augmentation output changes
//! between runs, an index can map to an image rendered for a different
//! description. This is long-standing, documented behaviour — callers who
//! need fresh images delete the cache directory.

use crate::error::GenerationError;
use crate::output::ImageSource;
use crate::services::ImageService;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Handle to the illustration cache directory.
///
/// Creating the handle never touches the filesystem; the directory is
/// created lazily on first store so that an uncreatable cache location
/// degrades a single illustration instead of aborting the run.
#[derive(Debug, Clone)]
pub struct IllustrationCache {
    dir: PathBuf,
}

impl IllustrationCache {
    /// Create a handle rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file name for a generation index.
    pub fn entry_name(index: u64) -> String {
        format!("illustration_{index}.png")
    }

    /// Full cache path for a generation index.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(Self::entry_name(index))
    }

    /// Whether an entry exists for the index.
    pub fn contains(&self, index: u64) -> bool {
        self.path_for(index).is_file()
    }

    /// Resolve one illustration: reuse the cached entry for `index` if
    /// present, otherwise generate from `description` via `imager`.
    ///
    /// On success the image bytes exist at `destination` and (for fresh
    /// generations) in the cache under the index key. On failure the
    /// destination is left unwritten and the caller keeps the marker in the
    /// document text.
    pub async fn fetch_or_generate<S: ImageService>(
        &self,
        imager: Option<&S>,
        index: u64,
        description: &str,
        destination: &Path,
    ) -> Result<ImageSource, GenerationError> {
        let cached = self.path_for(index);
        if cached.is_file() {
            debug!("Cache hit for illustration {index}: {}", cached.display());
            prepare_parent(destination).await?;
            tokio::fs::copy(&cached, destination)
                .await
                .map_err(|e| GenerationError::Storage {
                    detail: format!("copying cached {} failed: {e}", cached.display()),
                })?;
            return Ok(ImageSource::Cached);
        }

        let imager = imager.ok_or(GenerationError::GeneratorMissing)?;
        info!("Generating illustration {index}: {description}");
        let bytes = imager.generate(description).await?;

        prepare_parent(destination).await?;
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| GenerationError::Storage {
                detail: format!("writing {} failed: {e}", destination.display()),
            })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GenerationError::Storage {
                detail: format!("creating cache dir {} failed: {e}", self.dir.display()),
            })?;
        tokio::fs::copy(destination, &cached)
            .await
            .map_err(|e| GenerationError::Storage {
                detail: format!("storing cache entry {} failed: {e}", cached.display()),
            })?;

        debug!("Stored illustration {index} in cache");
        Ok(ImageSource::Generated)
    }
}

async fn prepare_parent(path: &Path) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GenerationError::Storage {
                detail: format!("creating {} failed: {e}", parent.display()),
            })?;
    }
    Ok(())
}
