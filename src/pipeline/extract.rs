//! Package extraction: unpack the EPUB and resolve its spine.
//!
//! ## Why unpack to a temp directory?
//!
//! Documents are rewritten in place and images are dropped next to them, so
//! the pipeline needs a real file tree rather than streamed zip entries.
//! Unpacking to a [`TempDir`] gives every run an exclusively owned working
//! tree that is cleaned up automatically when [`ExtractedPackage`] is
//! dropped, even if the process panics. `keep_working_dir` hands the tree to
//! the caller instead via [`ExtractedPackage::keep`].
//!
//! Spine resolution follows the container spec: `META-INF/container.xml`
//! names the OPF document, the OPF manifest maps ids to hrefs, and the
//! `<spine>` lists `<itemref>` ids in reading order. Hrefs are resolved
//! relative to the OPF's own directory and normalized, so `../text/ch1.xhtml`
//! style references land where they should inside the tree.

use crate::error::IllustrateError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use zip::ZipArchive;

/// An EPUB unpacked to a temporary working tree, with its reading order
/// resolved.
///
/// Dropping this removes the working tree. Spine paths are relative to
/// [`root`](ExtractedPackage::root) and already normalized.
#[derive(Debug)]
pub struct ExtractedPackage {
    working: TempDir,
    spine: Vec<PathBuf>,
}

impl ExtractedPackage {
    /// Root of the unpacked working tree.
    pub fn root(&self) -> &Path {
        self.working.path()
    }

    /// Content documents in reading order, relative to [`root`](Self::root).
    pub fn spine(&self) -> &[PathBuf] {
        &self.spine
    }

    /// Truncate the spine to its first `n` entries.
    pub fn truncate_spine(&mut self, n: usize) {
        self.spine.truncate(n);
    }

    /// Disable cleanup and return the working tree path to the caller.
    pub fn keep(self) -> PathBuf {
        self.working.keep()
    }
}

/// Unpack `epub_path` and resolve its spine.
///
/// Blocking (zip + file I/O); callers on an async runtime should wrap this
/// in `spawn_blocking`.
pub fn extract_package(epub_path: &Path) -> Result<ExtractedPackage, IllustrateError> {
    if !epub_path.exists() {
        return Err(IllustrateError::FileNotFound {
            path: epub_path.to_path_buf(),
        });
    }

    let file = File::open(epub_path).map_err(|e| IllustrateError::ArchiveRead {
        path: epub_path.to_path_buf(),
        source: zip::result::ZipError::Io(e),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|source| IllustrateError::ArchiveRead {
        path: epub_path.to_path_buf(),
        source,
    })?;

    let working =
        TempDir::with_prefix("epub_extract_").map_err(|source| IllustrateError::WorkingTree { source })?;
    archive
        .extract(working.path())
        .map_err(|source| IllustrateError::ArchiveRead {
            path: epub_path.to_path_buf(),
            source,
        })?;
    debug!("Unpacked EPUB to {}", working.path().display());

    let opf_rel = locate_opf(working.path())?;
    let spine = resolve_spine(working.path(), &opf_rel)?;
    info!(
        "Resolved spine: {} content document(s) via {}",
        spine.len(),
        opf_rel.display()
    );

    Ok(ExtractedPackage { working, spine })
}

/// Find the OPF document path declared in `META-INF/container.xml`.
fn locate_opf(root: &Path) -> Result<PathBuf, IllustrateError> {
    let container = root.join("META-INF").join("container.xml");
    let xml = std::fs::read_to_string(&container).map_err(|_| IllustrateError::MalformedPackage {
        detail: "missing META-INF/container.xml".into(),
    })?;

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let full_path = String::from_utf8(attr.value.to_vec()).map_err(|_| {
                            IllustrateError::MalformedPackage {
                                detail: "rootfile full-path is not valid UTF-8".into(),
                            }
                        })?;
                        debug!("OPF document: {full_path}");
                        return Ok(PathBuf::from(full_path));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IllustrateError::MalformedPackage {
                    detail: format!("invalid container.xml: {e}"),
                })
            }
            _ => {}
        }
    }

    Err(IllustrateError::MalformedPackage {
        detail: "no rootfile entry in META-INF/container.xml".into(),
    })
}

/// Parse the OPF manifest and spine and resolve itemrefs to document paths.
///
/// Returned paths are relative to the working tree root, in `itemref`
/// document order.
fn resolve_spine(root: &Path, opf_rel: &Path) -> Result<Vec<PathBuf>, IllustrateError> {
    let opf_path = root.join(opf_rel);
    let xml = std::fs::read_to_string(&opf_path).map_err(|_| IllustrateError::MalformedPackage {
        detail: format!("missing OPF document '{}'", opf_rel.display()),
    })?;

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut manifest: HashMap<String, String> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut saw_spine = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"item" => {
                    let mut id = None;
                    let mut href = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"id" => id = String::from_utf8(attr.value.to_vec()).ok(),
                            b"href" => href = String::from_utf8(attr.value.to_vec()).ok(),
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(href)) = (id, href) {
                        manifest.insert(id, href);
                    }
                }
                b"spine" => saw_spine = true,
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"idref" {
                            if let Ok(idref) = String::from_utf8(attr.value.to_vec()) {
                                order.push(idref);
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IllustrateError::MalformedPackage {
                    detail: format!("invalid OPF document: {e}"),
                })
            }
            _ => {}
        }
    }

    if !saw_spine {
        return Err(IllustrateError::MalformedPackage {
            detail: "OPF document has no spine element".into(),
        });
    }

    // Hrefs are relative to the OPF's own directory.
    let opf_dir = opf_rel.parent().unwrap_or_else(|| Path::new(""));
    let mut spine = Vec::with_capacity(order.len());
    for idref in &order {
        let href = manifest
            .get(idref)
            .ok_or_else(|| IllustrateError::MalformedPackage {
                detail: format!("spine idref '{idref}' has no manifest entry"),
            })?;
        spine.push(normalize(&opf_dir.join(href)));
    }

    Ok(spine)
}

/// Collapse `.` and `..` segments without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Extract the local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
