use std::path::PathBuf;

/// Kind of an archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: PathBuf },
    HardLink { target: PathBuf },
    /// Devices, fifos and anything else, keyed by the raw type flag
    Other(u8),
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink { .. } => "symlink",
            EntryKind::HardLink { .. } => "hardlink",
            EntryKind::Other(_) => "other",
        }
    }
}

/// One entry of a decoded archive, as listed from its header.
///
/// Listing reads headers only; `data_offset` and `size` locate the payload
/// for later extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, without a trailing `/` for directories
    pub path: String,
    pub kind: EntryKind,
    /// Payload size in bytes
    pub size: u64,
    /// Permission bits, if the header carries a valid mode
    pub mode: Option<u32>,
    /// Modification time in seconds since the Unix epoch
    pub mtime: Option<u64>,
    /// Offset of this entry's header block
    pub header_offset: u64,
    /// Offset of this entry's payload
    pub data_offset: u64,
}

/// Entry descriptor handed back by pattern-driven extraction.
pub type EntryDescriptor = ArchiveEntry;

impl ArchiveEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl std::fmt::Display for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path, self.kind.as_str())
    }
}
