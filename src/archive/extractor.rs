use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{EntryError, Error, Result};
use crate::io::{LocalFileReader, ReadAt, ReadAtStream};
use crate::report::{ExtractLog, LogSink};

use super::entry::{ArchiveEntry, EntryKind};
use super::parser::TarParser;
use super::sanitize::{check_symlink_target, resolve_entry_path, resolve_link_source};
use super::select::{PatternSelection, Selection, TargetSelection};

/// Tar archive extractor
pub struct TarExtractor<R: ReadAt> {
    parser: TarParser<R>,
    origin: PathBuf,
}

impl TarExtractor<LocalFileReader> {
    /// Open a tar archive on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = LocalFileReader::new(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::new(Arc::new(reader), path))
    }
}

impl<R: ReadAt> TarExtractor<R> {
    /// `origin` names the source in errors and log lines.
    pub fn new(reader: Arc<R>, origin: impl Into<PathBuf>) -> Self {
        Self {
            parser: TarParser::new(reader),
            origin: origin.into(),
        }
    }

    /// List all entries in the archive
    pub fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.parser.list_entries(&self.origin)
    }

    /// Write a single entry under `dest`, returning where it landed.
    pub fn extract_entry(
        &self,
        entry: &ArchiveEntry,
        dest: &Path,
    ) -> std::result::Result<PathBuf, EntryError> {
        materialize(self.parser.reader().as_ref(), entry, dest)
    }

    /// Start a lazy extraction into `dest` driven by `selection`.
    ///
    /// Headers are listed and `dest` is created up front; entries are then
    /// written one at a time as the returned iterator is pulled.
    pub fn extract<S, L>(&self, dest: &Path, selection: S, log: L) -> Result<Extraction<R, S, L>>
    where
        S: Selection,
        L: ExtractLog,
    {
        let entries = self.list_entries()?;
        fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

        Ok(Extraction {
            reader: Some(Arc::clone(self.parser.reader())),
            entries: entries.into_iter(),
            dest: dest.to_path_buf(),
            selection,
            log,
        })
    }

    /// Extract every entry, yielding the paths of those in `targets` (or of
    /// all entries with `full`).
    pub fn extract_selected<I, T>(
        &self,
        dest: &Path,
        targets: I,
        full: bool,
    ) -> Result<Extraction<R, TargetSelection, LogSink>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.extract(dest, TargetSelection::new(targets, full), LogSink)
    }

    /// Extract only entries whose path matches `pattern` from its start,
    /// yielding their descriptors.
    pub fn extract_matching(
        &self,
        dest: &Path,
        pattern: &str,
    ) -> Result<Extraction<R, PatternSelection, LogSink>> {
        self.extract(dest, PatternSelection::new(pattern)?, LogSink)
    }
}

/// Lazy extraction pass over one archive.
///
/// Each call to `next` writes entries until one is reported by the
/// selection, so the destination fills as the iterator is consumed. Dropping
/// it early leaves unvisited entries unwritten. The archive handle is
/// released on exhaustion or drop, whichever comes first.
pub struct Extraction<R: ReadAt, S, L> {
    reader: Option<Arc<R>>,
    entries: std::vec::IntoIter<ArchiveEntry>,
    dest: PathBuf,
    selection: S,
    log: L,
}

impl<R: ReadAt, S, L> Extraction<R, S, L> {
    pub fn destination(&self) -> &Path {
        &self.dest
    }

    /// Entries not yet visited.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl<R: ReadAt, S: Selection, L: ExtractLog> Iterator for Extraction<R, S, L> {
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        let reader = self.reader.as_ref()?;

        for entry in self.entries.by_ref() {
            if !self.selection.attempt(&entry) {
                continue;
            }

            match materialize(reader.as_ref(), &entry, &self.dest) {
                Ok(_) => {
                    self.log.extracted(&entry);
                    if let Some(item) = self.selection.report(entry) {
                        return Some(item);
                    }
                }
                Err(e) => self.log.failed(&entry, &e),
            }
        }

        self.reader = None;
        None
    }
}

fn materialize<R: ReadAt + ?Sized>(
    reader: &R,
    entry: &ArchiveEntry,
    dest: &Path,
) -> std::result::Result<PathBuf, EntryError> {
    let target = resolve_entry_path(dest, &entry.path)?;

    match &entry.kind {
        EntryKind::Directory => {
            fs::create_dir_all(&target).map_err(|e| EntryError::io(&target, e))?;
        }
        EntryKind::File => {
            create_parent(&target)?;
            unlink_symlink(&target)?;
            write_payload(reader, entry, &target)?;
            apply_metadata(entry, &target);
        }
        EntryKind::Symlink { target: link } => {
            check_symlink_target(&entry.path, link)?;
            create_parent(&target)?;
            replace_existing(&target)?;
            make_symlink(link, &target)?;
        }
        EntryKind::HardLink { target: source } => {
            let source = resolve_link_source(dest, source)?;
            create_parent(&target)?;
            replace_existing(&target)?;
            // Fall back to a copy where hard links are not possible
            if fs::hard_link(&source, &target).is_err() {
                fs::copy(&source, &target).map_err(|e| EntryError::io(&source, e))?;
            }
        }
        EntryKind::Other(flag) => {
            return Err(EntryError::Unsupported(format!(
                "type flag {:?}",
                char::from(*flag)
            )));
        }
    }

    Ok(target)
}

fn create_parent(target: &Path) -> std::result::Result<(), EntryError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| EntryError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Remove a symlink sitting where a regular file is about to be written, so
/// the write does not follow it.
fn unlink_symlink(target: &Path) -> std::result::Result<(), EntryError> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(target).map_err(|e| EntryError::io(target, e))
        }
        _ => Ok(()),
    }
}

fn replace_existing(target: &Path) -> std::result::Result<(), EntryError> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => {
            fs::remove_file(target).map_err(|e| EntryError::io(target, e))
        }
        _ => Ok(()),
    }
}

fn write_payload<R: ReadAt + ?Sized>(
    reader: &R,
    entry: &ArchiveEntry,
    target: &Path,
) -> std::result::Result<(), EntryError> {
    let file = File::create(target).map_err(|e| EntryError::io(target, e))?;
    let mut out = BufWriter::new(file);
    let mut payload = ReadAtStream::range(reader, entry.data_offset, entry.size);

    let copied = io::copy(&mut payload, &mut out).map_err(|e| EntryError::io(target, e))?;
    out.flush().map_err(|e| EntryError::io(target, e))?;

    if copied != entry.size {
        return Err(EntryError::io(
            target,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive holds {copied} of {} payload bytes", entry.size),
            ),
        ));
    }

    Ok(())
}

/// Best-effort permission and mtime restore.
fn apply_metadata(entry: &ArchiveEntry, target: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.mode {
            let perms = fs::Permissions::from_mode(mode & 0o7777);
            if let Err(e) = fs::set_permissions(target, perms) {
                log::debug!("Failed to set permissions on '{}': {}", target.display(), e);
            }
        }
    }

    if let Some(mtime) = entry.mtime {
        let time = filetime::FileTime::from_unix_time(mtime as i64, 0);
        if let Err(e) = filetime::set_file_mtime(target, time) {
            log::debug!("Failed to set mtime on '{}': {}", target.display(), e);
        }
    }
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> std::result::Result<(), EntryError> {
    std::os::unix::fs::symlink(link, target).map_err(|e| EntryError::io(target, e))
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, _target: &Path) -> std::result::Result<(), EntryError> {
    Err(EntryError::Unsupported("symlink".to_string()))
}
