use std::io::{self, Read, Seek, SeekFrom};

use super::ReadAt;

/// Sequential `Read + Seek` view over a [`ReadAt`] source.
///
/// The view covers a window `[start, end)` of the source. Positions reported
/// through [`Seek`] are relative to the window start, so a full-source view
/// behaves like an ordinary file handle and a bounded view behaves like a
/// standalone file holding just that byte range.
pub struct ReadAtStream<'a, R: ReadAt + ?Sized> {
    reader: &'a R,
    start: u64,
    end: u64,
    pos: u64,
}

impl<'a, R: ReadAt + ?Sized> ReadAtStream<'a, R> {
    /// View the whole source.
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            start: 0,
            end: reader.size(),
            pos: 0,
        }
    }

    /// View `len` bytes starting at `offset`, clamped to the source size.
    pub fn range(reader: &'a R, offset: u64, len: u64) -> Self {
        let size = reader.size();
        let start = offset.min(size);
        let end = offset.saturating_add(len).min(size);
        Self {
            reader,
            start,
            end,
            pos: 0,
        }
    }

    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: ReadAt + ?Sized> Read for ReadAtStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len().saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.start + self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: ReadAt + ?Sized> Seek for ReadAtStream<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
        };

        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
