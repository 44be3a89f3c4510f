//! Per-entry extraction reporting.
//!
//! Extraction never escalates a single entry's failure. Instead each outcome
//! is handed to an [`ExtractLog`] supplied by the caller; [`LogSink`] routes
//! them to the `log` facade and [`NoopLog`] drops them.

use crate::archive::ArchiveEntry;
use crate::error::EntryError;

/// Receiver for per-entry extraction outcomes.
pub trait ExtractLog {
    /// An entry was written to disk.
    fn extracted(&mut self, _entry: &ArchiveEntry) {}

    /// An entry could not be written and was skipped.
    fn failed(&mut self, entry: &ArchiveEntry, error: &EntryError);
}

impl<L: ExtractLog + ?Sized> ExtractLog for &mut L {
    fn extracted(&mut self, entry: &ArchiveEntry) {
        (**self).extracted(entry);
    }

    fn failed(&mut self, entry: &ArchiveEntry, error: &EntryError) {
        (**self).failed(entry, error);
    }
}

/// Forwards outcomes to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ExtractLog for LogSink {
    fn extracted(&mut self, entry: &ArchiveEntry) {
        log::debug!("{}", entry.path);
    }

    fn failed(&mut self, entry: &ArchiveEntry, error: &EntryError) {
        log::warn!("Failed extracting: {} > {}", entry.path, error);
    }
}

/// Discards outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLog;

impl ExtractLog for NoopLog {
    fn failed(&mut self, _entry: &ArchiveEntry, _error: &EntryError) {}
}
