use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::{Decompress, FlushDecompress, Status};

use super::header::{ContainerHeader, PAYLOAD_OFFSET, VariantPolicy};
use crate::error::{Error, Result};

/// Default number of payload bytes fed to the inflater per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Inflater output buffer size.
const OUT_BUF_SIZE: usize = 64 * 1024;

/// Where the decoded archive is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    /// `<input>.tar` next to the backup.
    #[default]
    Beside,
    /// A fresh temporary file with a `.tar` suffix, kept after decoding.
    Temp,
    /// An explicit path.
    Path(PathBuf),
}

/// Outcome of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    /// Path of the produced tar archive.
    pub archive: PathBuf,
    /// Compressed bytes consumed from the backup.
    pub payload_bytes: u64,
    /// Bytes written to the archive.
    pub archive_bytes: u64,
}

/// Streaming backup-to-tar decoder.
///
/// The payload is never held in memory as a whole: it is read in
/// `chunk_size` pieces and pushed through a single stateful inflater, so the
/// output does not depend on where chunk boundaries fall.
#[derive(Debug, Clone)]
pub struct Decoder {
    chunk_size: usize,
    destination: Destination,
    policy: VariantPolicy,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            destination: Destination::default(),
            policy: VariantPolicy::default(),
        }
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read chunk size. Zero is treated as one.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn policy(mut self, policy: VariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decode the backup at `input` into a tar archive.
    ///
    /// Header failures happen before anything is written. Once output has
    /// started, a failure leaves the partial archive in place; the caller
    /// decides whether to discard it.
    pub fn decode(&self, input: &Path) -> Result<DecodeReport> {
        let file = File::open(input).map_err(|e| Error::io(input, e))?;
        self.decode_from(file, input)
    }

    /// The header is read from the bare source so a rejected backup never
    /// has payload bytes pulled into a buffer.
    fn decode_from<S: Read + Seek>(&self, mut source: S, input: &Path) -> Result<DecodeReport> {
        ContainerHeader::read(&mut source, input)?.check(self.policy, input)?;

        source
            .seek(SeekFrom::Start(PAYLOAD_OFFSET))
            .map_err(|e| Error::io(input, e))?;

        let capacity = self.chunk_size.clamp(8 * 1024, DEFAULT_CHUNK_SIZE);
        let mut source = BufReader::with_capacity(capacity, source);

        let (output, path) = self.open_destination(input)?;
        let mut sink = BufWriter::new(output);

        let (payload_bytes, archive_bytes) = self.inflate(&mut source, &mut sink, input, &path)?;

        sink.into_inner()
            .map_err(|e| Error::io(&path, e.into_error()))?;

        log::debug!(
            "decoded {} -> {} ({} compressed bytes, {} archive bytes)",
            input.display(),
            path.display(),
            payload_bytes,
            archive_bytes
        );

        Ok(DecodeReport {
            archive: path,
            payload_bytes,
            archive_bytes,
        })
    }

    fn open_destination(&self, input: &Path) -> Result<(File, PathBuf)> {
        match &self.destination {
            Destination::Beside => {
                let mut name = input.as_os_str().to_owned();
                name.push(".tar");
                let path = PathBuf::from(name);
                let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
                Ok((file, path))
            }
            Destination::Path(path) => {
                let file = File::create(path).map_err(|e| Error::io(path, e))?;
                Ok((file, path.clone()))
            }
            Destination::Temp => {
                let tmp = tempfile::Builder::new()
                    .prefix("abunpack-")
                    .suffix(".tar")
                    .tempfile()
                    .map_err(|e| Error::io(std::env::temp_dir(), e))?;
                // The caller owns the archive's lifetime from here on
                let tmp_path = tmp.path().to_path_buf();
                tmp.keep().map_err(|e| Error::io(tmp_path, e.error))
            }
        }
    }

    /// Feed the payload through the inflater, returning the number of
    /// compressed bytes consumed and decompressed bytes written.
    fn inflate<R: Read, W: Write>(
        &self,
        source: &mut R,
        sink: &mut W,
        input: &Path,
        output: &Path,
    ) -> Result<(u64, u64)> {
        let mut inflater = Decompress::new(true);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut out = vec![0u8; OUT_BUF_SIZE];
        let mut finished = false;
        let mut ignored = 0u64;

        let corrupt = |inflater: &Decompress, reason: String| Error::Decompression {
            path: input.to_path_buf(),
            output: output.to_path_buf(),
            offset: PAYLOAD_OFFSET + inflater.total_in(),
            reason,
        };

        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(input, e)),
            };

            if finished {
                ignored += n as u64;
                continue;
            }

            let mut input_chunk = &chunk[..n];
            while !input_chunk.is_empty() {
                let before_in = inflater.total_in();
                let before_out = inflater.total_out();

                let status = inflater
                    .decompress(input_chunk, &mut out, FlushDecompress::None)
                    .map_err(|e| corrupt(&inflater, e.to_string()))?;

                let consumed = (inflater.total_in() - before_in) as usize;
                let produced = (inflater.total_out() - before_out) as usize;

                sink.write_all(&out[..produced])
                    .map_err(|e| Error::io(output, e))?;
                input_chunk = &input_chunk[consumed..];

                if status == Status::StreamEnd {
                    finished = true;
                    ignored += input_chunk.len() as u64;
                    break;
                }
                if consumed == 0 && produced == 0 {
                    return Err(corrupt(&inflater, "inflater made no progress".into()));
                }
            }
        }

        // Drain whatever the inflater still holds back
        while !finished {
            let before_out = inflater.total_out();
            let status = inflater
                .decompress(&[], &mut out, FlushDecompress::Finish)
                .map_err(|e| corrupt(&inflater, e.to_string()))?;
            let produced = (inflater.total_out() - before_out) as usize;

            sink.write_all(&out[..produced])
                .map_err(|e| Error::io(output, e))?;

            if status == Status::StreamEnd {
                finished = true;
            } else if produced == 0 {
                return Err(corrupt(&inflater, "compressed stream is truncated".into()));
            }
        }

        if ignored > 0 {
            log::warn!(
                "{}: ignoring {} bytes after the end of the compressed stream",
                input.display(),
                ignored
            );
        }

        Ok((inflater.total_in(), inflater.total_out()))
    }
}

/// Decode `input` with default settings, returning the archive path.
///
/// With `write_to_temp` the archive goes to a kept temporary file, otherwise
/// to `<input>.tar`.
pub fn decode(input: &Path, write_to_temp: bool, chunk_size: usize) -> Result<PathBuf> {
    let destination = if write_to_temp {
        Destination::Temp
    } else {
        Destination::Beside
    };

    Decoder::new()
        .chunk_size(chunk_size)
        .destination(destination)
        .decode(input)
        .map(|report| report.archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::fs;

    fn backup_bytes(token: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        let compressed = enc.finish().unwrap();

        let mut data = super::super::header::MAGIC.to_vec();
        data.extend_from_slice(token);
        data.extend_from_slice(b"\n1\nnon");
        data.extend_from_slice(&compressed);
        data
    }

    /// Counts how many bytes were pulled from the inner reader.
    struct Counting<R> {
        inner: R,
        read: u64,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read += n as u64;
            Ok(n)
        }
    }

    impl<R: Seek> Seek for Counting<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn sample_payload() -> Vec<u8> {
        (0..200_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
    }

    #[test]
    fn decodes_beside_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let payload = sample_payload();
        fs::write(&input, backup_bytes(b"none", &payload)).unwrap();

        let report = Decoder::new().decode(&input).unwrap();
        assert_eq!(report.archive, dir.path().join("backup.ab.tar"));
        assert_eq!(report.archive_bytes, payload.len() as u64);
        assert_eq!(fs::read(&report.archive).unwrap(), payload);
    }

    #[test]
    fn chunk_size_does_not_change_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let payload = sample_payload();
        fs::write(&input, backup_bytes(b"none", &payload)).unwrap();

        for size in [1, 17, 1024, 1 << 20] {
            let out = dir.path().join(format!("out-{size}.tar"));
            Decoder::new()
                .chunk_size(size)
                .destination(Destination::Path(out.clone()))
                .decode(&input)
                .unwrap();
            assert_eq!(fs::read(&out).unwrap(), payload, "chunk size {size}");
        }
    }

    #[test]
    fn temp_destination_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        fs::write(&input, backup_bytes(b"none", b"tiny")).unwrap();

        let archive = decode(&input, true, DEFAULT_CHUNK_SIZE).unwrap();
        assert!(archive.to_string_lossy().ends_with(".tar"));
        assert_eq!(fs::read(&archive).unwrap(), b"tiny");
        fs::remove_file(archive).unwrap();
    }

    #[test]
    fn encrypted_backup_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        fs::write(&input, backup_bytes(b"AES-", b"secret")).unwrap();

        let err = decode(&input, false, DEFAULT_CHUNK_SIZE).unwrap_err();
        assert!(matches!(err, Error::EncryptedContainer { .. }));
        assert!(!dir.path().join("backup.ab.tar").exists());
    }

    #[test]
    fn encrypted_backup_reads_only_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let mut source = Counting {
            inner: io::Cursor::new(backup_bytes(b"AES-", &sample_payload())),
            read: 0,
        };

        let err = Decoder::new().decode_from(&mut source, &input).unwrap_err();
        assert!(matches!(err, Error::EncryptedContainer { .. }));
        assert_eq!(source.read, 18);
    }

    #[test]
    fn lenient_policy_accepts_unknown_variant() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        fs::write(&input, backup_bytes(b"\n5\n1", b"legacy")).unwrap();

        assert!(matches!(
            Decoder::new().decode(&input),
            Err(Error::UnrecognizedContainerVariant { .. })
        ));

        let report = Decoder::new()
            .policy(VariantPolicy::Lenient)
            .decode(&input)
            .unwrap();
        assert_eq!(fs::read(report.archive).unwrap(), b"legacy");
    }

    #[test]
    fn truncated_stream_is_a_decompression_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let mut data = backup_bytes(b"none", &sample_payload());
        data.truncate(data.len() - 64);
        fs::write(&input, data).unwrap();

        let err = Decoder::new().chunk_size(4096).decode(&input).unwrap_err();
        match err {
            Error::Decompression { output, .. } => {
                assert_eq!(output, dir.path().join("backup.ab.tar"));
                // Partial output is left behind
                assert!(output.exists());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_payload_is_a_decompression_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let mut data = super::super::header::MAGIC.to_vec();
        data.extend_from_slice(b"none\n1\nnon");
        data.extend_from_slice(&[0xff; 128]);
        fs::write(&input, data).unwrap();

        let err = decode(&input, false, 16).unwrap_err();
        assert!(matches!(err, Error::Decompression { .. }), "{err}");
    }

    #[test]
    fn trailing_bytes_after_stream_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("backup.ab");
        let mut data = backup_bytes(b"none", b"body");
        data.extend_from_slice(b"trailing junk");
        fs::write(&input, data).unwrap();

        let archive = decode(&input, false, 3).unwrap();
        assert_eq!(fs::read(archive).unwrap(), b"body");
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode(&dir.path().join("absent.ab"), false, 1024).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
