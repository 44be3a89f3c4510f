//! Header-only tar enumeration.
//!
//! Listing walks the archive with seek-based skipping, so payload bytes are
//! never read. Entries come back in the archive's native order. Pseudo
//! entries (GNU long names, pax extension headers) are folded into the
//! entries they describe by the `tar` crate and never surface here.

use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::{ReadAt, ReadAtStream};

use super::entry::{ArchiveEntry, EntryKind};

/// Low-level tar lister over a [`ReadAt`] source.
pub struct TarParser<R: ReadAt> {
    reader: Arc<R>,
}

impl<R: ReadAt> TarParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// List all entries in archive order.
    ///
    /// An unreadable first header means the source is not a tar archive and
    /// fails with [`Error::Archive`]. A bad header further in usually means a
    /// truncated backup: listing stops there with a warning and the entries
    /// read so far are returned.
    pub fn list_entries(&self, origin: &Path) -> Result<Vec<ArchiveEntry>> {
        let stream = ReadAtStream::new(self.reader.as_ref());
        let mut archive = tar::Archive::new(stream);
        let entries = archive.entries_with_seek().map_err(|e| Error::Archive {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut listed = Vec::new();
        for item in entries {
            let described = item.and_then(|entry| describe(&entry));
            match described {
                Ok(Some(entry)) => listed.push(entry),
                Ok(None) => {}
                Err(e) if listed.is_empty() => {
                    return Err(Error::Archive {
                        path: origin.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    log::warn!(
                        "{}: stopping after {} entries, unreadable header: {}",
                        origin.display(),
                        listed.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(listed)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

fn describe<T: Read>(entry: &tar::Entry<'_, T>) -> io::Result<Option<ArchiveEntry>> {
    let header = entry.header();
    let entry_type = header.entry_type();

    if entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
    {
        return Ok(None);
    }

    let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

    let kind = if entry_type.is_dir() || (entry_type.is_file() && raw_path.ends_with('/')) {
        EntryKind::Directory
    } else if entry_type.is_symlink() {
        EntryKind::Symlink {
            target: link_target(entry)?,
        }
    } else if entry_type.is_hard_link() {
        EntryKind::HardLink {
            target: link_target(entry)?,
        }
    } else if entry_type.is_file() || entry_type.is_contiguous() {
        EntryKind::File
    } else {
        EntryKind::Other(entry_type.as_byte())
    };

    let path = if kind == EntryKind::Directory {
        raw_path.trim_end_matches('/').to_string()
    } else {
        raw_path
    };

    Ok(Some(ArchiveEntry {
        path,
        kind,
        size: entry.size(),
        mode: header.mode().ok(),
        mtime: header.mtime().ok(),
        header_offset: entry.raw_header_position(),
        data_offset: entry.raw_file_position(),
    }))
}

fn link_target<T: Read>(entry: &tar::Entry<'_, T>) -> io::Result<std::path::PathBuf> {
    entry
        .link_name()?
        .map(|target| target.into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "link entry without target"))
}
