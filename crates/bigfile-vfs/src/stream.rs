//! Seekable streams over disk files and archive entries.
//!
//! [`EntryStream`] makes an archive entry behave like a file of its own.
//! Offsets are relative to the entry, never to the archive:
//!
//! - an uncompressed entry is read straight from the shared archive stream
//!   at `entry.offset + position`;
//! - a compressed entry is decompressed once, when it is opened, and later
//!   reads copy from that buffer.
//!
//! [`DiskStream`] wraps a loose file with the same operations.

use crate::flags::Whence;
use crate::scratch::{DecompressedBuffer, ScratchPool};
use crate::{Result, VfsError};
use bigfile_archive::{ArchiveError, BigArchive, CatalogEntry, Decompressor};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::trace;

/// Bytes fetched per shared-stream read while scanning for a newline
const LINE_CHUNK: usize = 128;

/// Compute a seek target and check it lies in `0..=length`.
fn seek_target(position: u64, length: u64, offset: i64, whence: Whence) -> Option<u64> {
    let base = match whence {
        Whence::Start => 0,
        Whence::Current => i128::from(position),
        Whence::End => i128::from(length),
    };
    let target = base + i128::from(offset);
    u64::try_from(target).ok().filter(|&t| t <= length)
}

/// Accumulates one line from successive chunks of input.
#[derive(Debug)]
struct LineBuilder {
    line: Vec<u8>,
    max_len: usize,
    consumed_any: bool,
    awaiting_newline: bool,
}

impl LineBuilder {
    fn new(max_len: usize) -> Self {
        Self {
            line: Vec::new(),
            max_len: max_len.max(1),
            consumed_any: false,
            awaiting_newline: false,
        }
    }

    /// Take bytes from `chunk`, returning how many were consumed and
    /// whether the line is complete.
    fn feed(&mut self, chunk: &[u8]) -> (usize, bool) {
        let room = self.max_len - self.line.len();
        let window = &chunk[..chunk.len().min(room)];
        if !chunk.is_empty() {
            self.consumed_any = true;
        }

        if let Some(pos) = window.iter().position(|&b| b == b'\n') {
            self.line.extend_from_slice(&window[..pos]);
            return (pos + 1, true);
        }

        self.line.extend_from_slice(window);
        if self.line.len() < self.max_len {
            return (window.len(), false);
        }
        // Line is full; swallow a newline that ends it exactly here
        match chunk.get(window.len()) {
            Some(b'\n') => (window.len() + 1, true),
            Some(_) => (window.len(), true),
            None => {
                self.awaiting_newline = true;
                (window.len(), true)
            }
        }
    }

    /// Whether the line filled up at the very end of a chunk, so the
    /// caller must check the next byte for a newline to swallow.
    const fn awaits_newline(&self) -> bool {
        self.awaiting_newline
    }

    fn finish(mut self, text_mode: bool) -> Option<String> {
        if !self.consumed_any {
            return None;
        }
        if text_mode && self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Some(String::from_utf8_lossy(&self.line).into_owned())
    }
}

/// Where an entry's bytes come from.
#[derive(Debug)]
enum EntryData {
    /// Read through the shared archive stream
    Passthrough,
    /// Served from a buffer filled on open
    Decompressed(DecompressedBuffer),
}

/// An open archive entry with its own virtual offset.
#[derive(Debug)]
pub struct EntryStream {
    archive: Arc<BigArchive>,
    entry: CatalogEntry,
    position: u64,
    data: EntryData,
}

impl EntryStream {
    /// Open `entry` from `archive`.
    ///
    /// Compressed entries are decompressed here, into a buffer borrowed
    /// from `pool`. On failure the buffer goes straight back to the pool.
    pub fn open(
        archive: Arc<BigArchive>,
        entry: CatalogEntry,
        pool: &mut ScratchPool,
        decompressor: &dyn Decompressor,
    ) -> Result<Self> {
        archive.check_bounds(&entry)?;

        let data = if entry.compressed {
            let len = usize::try_from(entry.length).map_err(|_| {
                VfsError::DecompressionFailure(format!(
                    "{} is too large to decompress ({} bytes)",
                    entry.name, entry.length
                ))
            })?;
            let mut buffer = pool.borrow(len);
            if let Err(e) = archive.decompress_into(&entry, decompressor, buffer.as_mut_slice()) {
                pool.give_back(buffer);
                return Err(match e {
                    ArchiveError::Decompression(msg) => {
                        VfsError::DecompressionFailure(format!("{}: {msg}", entry.name))
                    }
                    other => VfsError::Archive(other),
                });
            }
            EntryData::Decompressed(buffer)
        } else {
            EntryData::Passthrough
        };

        Ok(Self {
            archive,
            entry,
            position: 0,
            data,
        })
    }

    /// Catalog metadata of the entry.
    pub const fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    /// Archive the entry was opened from.
    pub const fn archive(&self) -> &Arc<BigArchive> {
        &self.archive
    }

    /// Uncompressed length of the entry.
    pub const fn length(&self) -> u64 {
        self.entry.length
    }

    /// Current virtual offset.
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left between the offset and the end of the entry.
    pub const fn remaining(&self) -> u64 {
        self.entry.length - self.position
    }

    /// Whether the offset is at the end of the entry.
    pub const fn is_eof(&self) -> bool {
        self.position >= self.entry.length
    }

    /// Whether reads are served from a decompressed buffer.
    pub const fn is_decompressed(&self) -> bool {
        matches!(self.data, EntryData::Decompressed(_))
    }

    /// The decompressed buffer, when there is one.
    pub fn buffer(&self) -> Option<&DecompressedBuffer> {
        match &self.data {
            EntryData::Decompressed(buffer) => Some(buffer),
            EntryData::Passthrough => None,
        }
    }

    /// Move the virtual offset.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::SeekOutOfRange`] if the target falls outside
    /// `0..=length`; the offset is unchanged.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let target = seek_target(self.position, self.entry.length, offset, whence)
            .ok_or_else(|| {
                VfsError::SeekOutOfRange(format!(
                    "{} {:?} from {:?} in {} ({} bytes)",
                    offset, whence, self.position, self.entry.name, self.entry.length
                ))
            })?;
        if matches!(self.data, EntryData::Passthrough) {
            trace!("Seek in {} to {}", self.entry.name, target);
        }
        self.position = target;
        Ok(target)
    }

    /// Read up to `buf.len()` bytes, stopping at the end of the entry.
    ///
    /// Returns `Ok(0)` at end of entry.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = usize::try_from(self.remaining()).map_or(buf.len(), |r| r.min(buf.len()));
        if n == 0 {
            return Ok(0);
        }

        match &self.data {
            EntryData::Decompressed(buffer) => {
                let start = self.position as usize;
                buf[..n].copy_from_slice(&buffer.as_slice()[start..start + n]);
            }
            EntryData::Passthrough => {
                self.archive
                    .read_exact_at(self.entry.offset + self.position, &mut buf[..n])?;
            }
        }
        self.position += n as u64;
        Ok(n)
    }

    /// Read one byte, or `None` at end of entry.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Read one line of at most `max_len` bytes, without its newline.
    ///
    /// Returns `None` when the offset is already at the end of the entry.
    pub fn read_line(&mut self, max_len: usize, text_mode: bool) -> Result<Option<String>> {
        let mut builder = LineBuilder::new(max_len);

        match &self.data {
            EntryData::Decompressed(buffer) => {
                let start = self.position as usize;
                let end = self.entry.length as usize;
                let (consumed, _) = builder.feed(&buffer.as_slice()[start..end]);
                self.position += consumed as u64;
            }
            EntryData::Passthrough => {
                let mut chunk = [0u8; LINE_CHUNK];
                loop {
                    let want = usize::try_from(self.remaining())
                        .map_or(LINE_CHUNK, |r| r.min(LINE_CHUNK));
                    if want == 0 {
                        break;
                    }
                    self.archive
                        .read_exact_at(self.entry.offset + self.position, &mut chunk[..want])?;
                    let (consumed, done) = builder.feed(&chunk[..want]);
                    self.position += consumed as u64;
                    if done {
                        break;
                    }
                }

                if builder.awaits_newline() && self.remaining() > 0 {
                    let mut next = [0u8; 1];
                    self.archive
                        .read_exact_at(self.entry.offset + self.position, &mut next)?;
                    if next[0] == b'\n' {
                        self.position += 1;
                    }
                }
            }
        }

        Ok(builder.finish(text_mode))
    }

    /// Release the stream, handing back its buffer if it has one.
    pub fn into_buffer(self) -> Option<DecompressedBuffer> {
        match self.data {
            EntryData::Decompressed(buffer) => Some(buffer),
            EntryData::Passthrough => None,
        }
    }
}

/// A loose file on disk.
#[derive(Debug)]
pub enum DiskStream {
    /// Opened for reading
    Reader(BufReader<File>),
    /// Opened for writing or appending
    Writer(File),
}

impl DiskStream {
    /// Wrap a file opened for reading.
    pub fn reader(file: File) -> Self {
        Self::Reader(BufReader::new(file))
    }

    /// Wrap a file opened for writing.
    pub const fn writer(file: File) -> Self {
        Self::Writer(file)
    }

    fn file(&self) -> &File {
        match self {
            Self::Reader(reader) => reader.get_ref(),
            Self::Writer(file) => file,
        }
    }

    /// Current length of the file.
    pub fn length(&self) -> Result<u64> {
        Ok(self.file().metadata()?.len())
    }

    /// Current position in the file.
    pub fn position(&mut self) -> Result<u64> {
        let position = match self {
            Self::Reader(reader) => reader.stream_position()?,
            Self::Writer(file) => file.stream_position()?,
        };
        Ok(position)
    }

    /// Bytes between the position and the end of the file.
    pub fn remaining(&mut self) -> Result<u64> {
        let position = self.position()?;
        Ok(self.length()?.saturating_sub(position))
    }

    /// Move the file position.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::SeekOutOfRange`] for a negative target or when
    /// the OS rejects the seek.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let from = match whence {
            Whence::Start => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                VfsError::SeekOutOfRange(format!("negative offset {offset} from start"))
            })?),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let result = match self {
            Self::Reader(reader) => reader.seek(from),
            Self::Writer(file) => file.seek(from),
        };
        result.map_err(|e| VfsError::SeekOutOfRange(format!("{offset} {whence:?}: {e}")))
    }

    /// Read until `buf` is full or the file ends.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let result = match self {
                Self::Reader(reader) => reader.read(&mut buf[filled..]),
                Self::Writer(file) => file.read(&mut buf[filled..]),
            };
            match result {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Read one byte, or `None` at end of file.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Read one line of at most `max_len` bytes, without its newline.
    pub fn read_line(&mut self, max_len: usize, text_mode: bool) -> Result<Option<String>> {
        let Self::Reader(reader) = self else {
            return Err(VfsError::Io(std::io::Error::new(
                ErrorKind::Unsupported,
                "file was opened for writing",
            )));
        };

        let mut builder = LineBuilder::new(max_len);
        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            let (consumed, done) = builder.feed(chunk);
            reader.consume(consumed);
            if done {
                break;
            }
        }

        if builder.awaits_newline() && reader.fill_buf()?.first() == Some(&b'\n') {
            reader.consume(1);
        }
        Ok(builder.finish(text_mode))
    }

    /// Write all of `data` at the current position.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Writer(file) => Ok(file.write_all(data)?),
            Self::Reader(_) => Err(VfsError::Io(std::io::Error::new(
                ErrorKind::Unsupported,
                "file was opened for reading",
            ))),
        }
    }

    /// Flush pending writes.
    pub fn flush(&mut self) -> Result<()> {
        if let Self::Writer(file) = self {
            file.flush()?;
        }
        Ok(())
    }
}
