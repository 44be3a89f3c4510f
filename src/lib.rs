//! # abunpack
//!
//! Decode Android backup (`.ab`) files into tar archives and restore their
//! contents.
//!
//! The pipeline has two stages:
//!
//! 1. [`Decoder`] verifies the 24-byte backup header and streams the zlib
//!    payload into a tar file, chunk by chunk.
//! 2. [`TarExtractor`] extracts entries from that tar file lazily, either
//!    everything (reporting a target set) or only entries whose path matches
//!    a pattern. A failure on one entry is logged and skipped.
//!
//! ## Features
//!
//! - Chunk-size independent streaming inflate, never buffering the payload
//! - Detection and rejection of encrypted backups
//! - Header-only archive listing, in native archive order
//! - Lazy, failure-isolated extraction with path traversal protection
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! fn main() -> abunpack::Result<()> {
//!     let archive = abunpack::decode(Path::new("backup.ab"), true, abunpack::DEFAULT_CHUNK_SIZE)?;
//!
//!     for path in abunpack::extract_selected(&archive, Path::new("restore"), ["apps/com.example/_manifest"], false)? {
//!         println!("restored {path}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod error;
pub mod io;
pub mod report;

use std::path::Path;

pub use archive::{
    ArchiveEntry, EntryDescriptor, EntryKind, Extraction, PatternSelection, Selection,
    TarExtractor, TarParser, TargetSelection,
};
pub use backup::{
    ContainerHeader, DEFAULT_CHUNK_SIZE, DecodeReport, Decoder, Destination, EncryptionState,
    VariantPolicy, decode, verify,
};
pub use cli::Cli;
pub use error::{EntryError, Error, Result};
pub use io::{LocalFileReader, ReadAt, ReadAtStream};
pub use report::{ExtractLog, LogSink, NoopLog};

/// Extract every entry of the tar archive at `archive_path` into `dest_dir`,
/// lazily yielding the paths in `targets` (all paths with `full`) that were
/// written successfully.
pub fn extract_selected<I, T>(
    archive_path: &Path,
    dest_dir: &Path,
    targets: I,
    full: bool,
) -> Result<Extraction<LocalFileReader, TargetSelection, LogSink>>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    TarExtractor::open(archive_path)?.extract_selected(dest_dir, targets, full)
}

/// Extract the entries of the tar archive at `archive_path` whose path
/// matches `pattern` from its start, lazily yielding their descriptors.
/// Non-matching entries are never touched.
pub fn extract_matching(
    archive_path: &Path,
    dest_dir: &Path,
    pattern: &str,
) -> Result<Extraction<LocalFileReader, PatternSelection, LogSink>> {
    TarExtractor::open(archive_path)?.extract_matching(dest_dir, pattern)
}
