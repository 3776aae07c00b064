//! Pipeline stages for EPUB illustration.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and keeps the
//! orchestrator in [`crate::illustrate`] a thin sequence of calls.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ augment ──▶ markers ──▶ cache ──▶ repack
//! (unzip+spine) (LLM)     (parse/     (image     (zip)
//!                          rewrite)    bytes)
//! ```
//!
//! 1. [`extract`] — unpack the archive to a working tree and resolve the
//!    spine; runs in `spawn_blocking` because zip extraction is blocking
//! 2. [`augment`] — drive the augmentation-service call with retry/backoff;
//!    inserts illustration markers into document text
//! 3. [`markers`] — pure parsing and rewriting of marker comments; no I/O
//! 4. [`cache`]   — per-illustration fetch-or-generate against the local
//!    cache directory
//! 5. [`repack`]  — pack the tree back into a valid EPUB archive; blocking,
//!    `spawn_blocking` again

pub mod augment;
pub mod cache;
pub mod extract;
pub mod markers;
pub mod repack;
