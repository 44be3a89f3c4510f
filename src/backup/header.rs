//! Fixed backup header layout and verification.
//!
//! ```text
//! offset  len  field
//!      0   14  magic "ANDROID BACKUP"
//!     14    4  encryption token ("none", "AES-", ...)
//!     18    6  reserved, not validated
//!     24    -  zlib payload
//! ```

use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Backup magic.
pub const MAGIC: &[u8; 14] = b"ANDROID BACKUP";

/// Length of the encryption token following the magic.
pub const TOKEN_LEN: usize = 4;

/// Offset at which the compressed payload begins.
pub const PAYLOAD_OFFSET: u64 = 24;

const TOKEN_PLAIN: &[u8; TOKEN_LEN] = b"none";
const TOKEN_AES: &[u8; TOKEN_LEN] = b"AES-";

/// Encryption state declared by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionState {
    Plain,
    AesEncrypted,
    Unknown([u8; TOKEN_LEN]),
}

impl EncryptionState {
    pub fn from_token(token: [u8; TOKEN_LEN]) -> Self {
        match &token {
            TOKEN_PLAIN => EncryptionState::Plain,
            TOKEN_AES => EncryptionState::AesEncrypted,
            _ => EncryptionState::Unknown(token),
        }
    }

    pub fn token(&self) -> [u8; TOKEN_LEN] {
        match self {
            EncryptionState::Plain => *TOKEN_PLAIN,
            EncryptionState::AesEncrypted => *TOKEN_AES,
            EncryptionState::Unknown(token) => *token,
        }
    }
}

/// How to treat a token that is neither `none` nor `AES-`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariantPolicy {
    /// Reject with [`Error::UnrecognizedContainerVariant`].
    #[default]
    Strict,
    /// Accept as [`EncryptionState::Plain`], logging a warning.
    Lenient,
}

/// Parsed backup header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub encryption: EncryptionState,
}

impl ContainerHeader {
    /// Read the magic and encryption token from `source`.
    ///
    /// `source` must be positioned at offset 0. On success exactly
    /// `MAGIC.len() + TOKEN_LEN` bytes have been consumed. `origin` is only
    /// used to give errors context.
    pub fn read<R: Read>(source: &mut R, origin: &Path) -> Result<Self> {
        let mut magic = [0u8; MAGIC.len()];
        read_header_field(source, &mut magic, origin)?;
        if &magic != MAGIC {
            return Err(Error::NotContainerFormat {
                path: origin.to_path_buf(),
            });
        }

        let mut token = [0u8; TOKEN_LEN];
        read_header_field(source, &mut token, origin)?;

        Ok(Self {
            encryption: EncryptionState::from_token(token),
        })
    }

    /// Decide whether the payload may be decompressed under `policy`.
    pub fn check(&self, policy: VariantPolicy, origin: &Path) -> Result<EncryptionState> {
        match self.encryption {
            EncryptionState::Plain => Ok(EncryptionState::Plain),
            EncryptionState::AesEncrypted => Err(Error::EncryptedContainer {
                path: origin.to_path_buf(),
            }),
            EncryptionState::Unknown(token) => match policy {
                VariantPolicy::Strict => Err(Error::UnrecognizedContainerVariant {
                    path: origin.to_path_buf(),
                    token: String::from_utf8_lossy(&token).into_owned(),
                }),
                VariantPolicy::Lenient => {
                    log::warn!(
                        "{}: unrecognized backup variant {:?}, treating as unencrypted",
                        origin.display(),
                        String::from_utf8_lossy(&token)
                    );
                    Ok(EncryptionState::Plain)
                }
            },
        }
    }
}

/// Verify the header of `source` with the strict variant policy.
pub fn verify<R: Read>(source: &mut R, origin: &Path) -> Result<EncryptionState> {
    ContainerHeader::read(source, origin)?.check(VariantPolicy::Strict, origin)
}

fn read_header_field<R: Read>(source: &mut R, buf: &mut [u8], origin: &Path) -> Result<()> {
    match source.read_exact(buf) {
        Ok(()) => Ok(()),
        // A file too short to hold a header is not a backup
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::NotContainerFormat {
            path: origin.to_path_buf(),
        }),
        Err(e) => Err(Error::io(origin, e)),
    }
}
