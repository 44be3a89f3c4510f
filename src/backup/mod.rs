//! Android backup (`.ab`) container decoding.
//!
//! A backup is a fixed 24-byte header followed by a zlib stream whose
//! decompressed content is a plain tar archive.
//!
//! - [`header`]: magic and encryption-token verification
//! - [`decoder`]: chunked, streaming inflate of the payload into a tar file
//!
//! ## Limitations
//!
//! - No decryption: `AES-` backups are detected and rejected

mod decoder;
mod header;

pub use decoder::{DEFAULT_CHUNK_SIZE, DecodeReport, Decoder, Destination, decode};
pub use header::{
    ContainerHeader, EncryptionState, MAGIC, PAYLOAD_OFFSET, TOKEN_LEN, VariantPolicy, verify,
};
