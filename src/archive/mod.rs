//! Tar archive listing and extraction.
//!
//! A decoded backup is a plain tar archive. This module lists it without
//! reading payloads and extracts entries lazily, one at a time, under a
//! pluggable [`Selection`] policy.
//!
//! ## Architecture
//!
//! - [`entry`]: entry descriptors produced by listing
//! - [`parser`]: header-only enumeration on top of the `tar` crate
//! - [`select`]: target-set and pattern selection policies
//! - [`extractor`]: the extraction engine and its lazy [`Extraction`] iterator
//!
//! ## Failure isolation
//!
//! Writing one entry can fail (path traversal, permissions, full disk)
//! without affecting the others. Such failures are handed to the caller's
//! [`ExtractLog`](crate::ExtractLog) and the entry is simply not yielded.

mod entry;
mod extractor;
mod parser;
mod sanitize;
mod select;

pub use entry::{ArchiveEntry, EntryDescriptor, EntryKind};
pub use extractor::{Extraction, TarExtractor};
pub use parser::TarParser;
pub use select::{PatternSelection, Selection, TargetSelection};
