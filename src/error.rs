//! Error types for decoding backups and extracting their archives.
//!
//! Fatal conditions surface as [`Error`]. Failures confined to one archive
//! entry are [`EntryError`] values; they never abort an extraction and are
//! only reported through the [`ExtractLog`](crate::ExtractLog) side channel.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file does not start with the backup magic.
    #[error("not an Android backup file: {path}")]
    NotContainerFormat { path: PathBuf },

    /// The backup is AES encrypted, which is not supported.
    #[error("backup is encrypted: {path}")]
    EncryptedContainer { path: PathBuf },

    /// The encryption token is neither `none` nor `AES-`.
    #[error("unrecognized backup variant {token:?}: {path}")]
    UnrecognizedContainerVariant { path: PathBuf, token: String },

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// The compressed payload is corrupt or truncated. `output` holds
    /// whatever was inflated before the failure.
    #[error("corrupt compressed stream in {path} at byte {offset}: {reason} (partial output left in {output})")]
    Decompression {
        path: PathBuf,
        output: PathBuf,
        offset: u64,
        reason: String,
    },

    /// The decoded archive cannot be enumerated at all.
    #[error("unreadable archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("invalid entry pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single archive entry could not be materialized.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("path escapes the destination directory")]
    PathTraversal,

    #[error("link target {target:?} escapes the destination directory")]
    LinkEscape { target: PathBuf },

    #[error("unsupported entry type {0:?}")]
    Unsupported(String),

    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl EntryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
