//! Archive repackaging: turn the working tree back into a valid EPUB.
//!
//! ## Why is `mimetype` special?
//!
//! The EPUB container format requires the `mimetype` entry to be the first
//! entry in the archive and stored without compression, so readers can sniff
//! the container type from the leading bytes of the file. Every other entry
//! is deflated. The walk is sorted so repeated runs over the same tree emit
//! entries in the same order.

use crate::error::IllustrateError;
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Pack the working tree rooted at `root` into an EPUB archive at `output`.
///
/// Blocking (zip + file I/O); callers on an async runtime should wrap this
/// in `spawn_blocking`.
pub fn repack_package(root: &Path, output: &Path) -> Result<(), IllustrateError> {
    let file = File::create(output).map_err(|source| IllustrateError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    })?;
    let mut zip = ZipWriter::new(file);

    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let archive_err = |source| IllustrateError::ArchiveWrite {
        path: output.to_path_buf(),
        source,
    };
    let write_err = |source| IllustrateError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    };

    let mut packed = 0usize;

    // mimetype must be entry 0, uncompressed.
    let mimetype = root.join("mimetype");
    if mimetype.exists() {
        let bytes =
            std::fs::read(&mimetype).map_err(|source| IllustrateError::WorkingTree { source })?;
        zip.start_file("mimetype", options_stored)
            .map_err(archive_err)?;
        zip.write_all(&bytes).map_err(write_err)?;
        packed += 1;
    }
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let name = zip_entry_name(rel);
        // Already written as entry 0.
        if name == "mimetype" {
            continue;
        }

        let bytes = std::fs::read(entry.path())
            .map_err(|source| IllustrateError::WorkingTree { source })?;
        zip.start_file(&name, options_deflate).map_err(archive_err)?;
        zip.write_all(&bytes).map_err(write_err)?;
        debug!("Packed {name} ({} bytes)", bytes.len());
        packed += 1;
    }

    zip.finish().map_err(archive_err)?;
    info!("Wrote {packed} entries to {}", output.display());
    Ok(())
}

/// Archive entry name for a tree-relative path, always forward-slashed.
fn zip_entry_name(rel: &Path) -> String {
    let mut name = String::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            if !name.is_empty() {
                name.push('/');
            }
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mimetype"), "application/epub+zip").unwrap();
        fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        fs::write(dir.path().join("META-INF/container.xml"), "<container/>").unwrap();
        fs::create_dir_all(dir.path().join("OEBPS/Images")).unwrap();
        fs::write(dir.path().join("OEBPS/chapter1.xhtml"), "<html>one</html>").unwrap();
        fs::write(dir.path().join("OEBPS/Images/illustration_0.png"), b"png").unwrap();
        dir
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let tree = sample_tree();
        let out = TempDir::new().unwrap();
        let epub = out.path().join("book.epub");

        repack_package(tree.path(), &epub).unwrap();

        let mut archive = ZipArchive::new(File::open(&epub).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    }

    #[test]
    fn other_entries_are_deflated_and_mimetype_not_duplicated() {
        let tree = sample_tree();
        let out = TempDir::new().unwrap();
        let epub = out.path().join("book.epub");

        repack_package(tree.path(), &epub).unwrap();

        let mut archive = ZipArchive::new(File::open(&epub).unwrap()).unwrap();
        let mut mimetype_count = 0;
        for i in 0..archive.len() {
            let entry = archive.by_index(i).unwrap();
            if entry.name() == "mimetype" {
                mimetype_count += 1;
            } else {
                assert_eq!(
                    entry.compression(),
                    zip::CompressionMethod::Deflated,
                    "entry {} should be deflated",
                    entry.name()
                );
            }
        }
        assert_eq!(mimetype_count, 1);
    }

    #[test]
    fn traversal_order_is_stable_across_runs() {
        let tree = sample_tree();
        let out = TempDir::new().unwrap();

        let names = |path: &Path| -> Vec<String> {
            let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
            (0..archive.len())
                .map(|i| archive.by_index(i).unwrap().name().to_string())
                .collect()
        };

        let first = out.path().join("a.epub");
        let second = out.path().join("b.epub");
        repack_package(tree.path(), &first).unwrap();
        repack_package(tree.path(), &second).unwrap();

        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn tree_without_mimetype_still_packs() {
        let tree = TempDir::new().unwrap();
        fs::write(tree.path().join("chapter.xhtml"), "<html/>").unwrap();
        let out = TempDir::new().unwrap();
        let epub = out.path().join("book.epub");

        repack_package(tree.path(), &epub).unwrap();

        let mut archive = ZipArchive::new(File::open(&epub).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "chapter.xhtml");
    }

    #[test]
    fn unwritable_output_path_fails() {
        let tree = sample_tree();
        let err = repack_package(tree.path(), Path::new("/nonexistent/dir/book.epub")).unwrap_err();
        assert!(matches!(err, IllustrateError::OutputWriteFailed { .. }));
    }

    #[test]
    fn test_zip_entry_name() {
        assert_eq!(zip_entry_name(Path::new("OEBPS/ch1.xhtml")), "OEBPS/ch1.xhtml");
        assert_eq!(zip_entry_name(Path::new("mimetype")), "mimetype");
    }
}
