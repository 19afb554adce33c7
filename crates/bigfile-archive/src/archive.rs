//! Shared archive streams and archive generations.
//!
//! Each archive file is opened once and its stream is shared by every
//! handle that reads from it. A positioned read is a seek followed by a
//! read, so the stream sits behind a mutex and [`BigArchive::read_at`]
//! holds the lock for the whole pair.

use crate::catalog::{ArchiveCatalog, CatalogEntry};
use crate::decompress::Decompressor;
use crate::{ArchiveError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Readable, seekable stream that can move between threads.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Which archive generation satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveGeneration {
    /// Archive shipped with the game
    Main,
    /// Patch archive layered over the main archive
    Update,
}

impl fmt::Display for ArchiveGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// An open archive: its catalog plus one shared read-only stream.
pub struct BigArchive {
    /// Display name (usually the archive path)
    name: String,
    /// Generation this archive represents
    generation: ArchiveGeneration,
    /// Entry lookup
    catalog: Box<dyn ArchiveCatalog>,
    /// Shared stream, locked for each seek + read
    stream: Mutex<Box<dyn ReadSeek>>,
    /// Stream length in bytes
    size: u64,
}

impl BigArchive {
    /// Open an archive file from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or its length queried
    pub fn open(
        path: impl AsRef<Path>,
        catalog: impl ArchiveCatalog + 'static,
        generation: ArchiveGeneration,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let archive = Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
            catalog,
            generation,
        )?;
        info!(
            "Opened {} archive {} ({} entries, {} bytes)",
            generation,
            path.display(),
            archive.catalog.len(),
            archive.size
        );
        Ok(archive)
    }

    /// Wrap an already-open stream.
    ///
    /// # Errors
    ///
    /// Returns error if the stream length cannot be determined
    pub fn from_reader<R: ReadSeek + 'static>(
        name: impl Into<String>,
        mut reader: R,
        catalog: impl ArchiveCatalog + 'static,
        generation: ArchiveGeneration,
    ) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            name: name.into(),
            generation,
            catalog: Box::new(catalog),
            stream: Mutex::new(Box::new(reader)),
            size,
        })
    }

    /// Display name of the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation of the archive.
    pub const fn generation(&self) -> ArchiveGeneration {
        self.generation
    }

    /// Length of the archive stream in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Catalog backing this archive.
    pub fn catalog(&self) -> &dyn ArchiveCatalog {
        self.catalog.as_ref()
    }

    /// Look up an entry in this archive's catalog.
    pub fn lookup(&self, name: &str) -> Option<CatalogEntry> {
        self.catalog.lookup(name)
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only when the stream ends first.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut stream = self.stream.lock();
        stream.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let read = self.read_at(offset, buf)?;
        if read < buf.len() {
            return Err(ArchiveError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "archive {} ended after {read} of {} bytes at offset {offset}",
                    self.name,
                    buf.len()
                ),
            )));
        }
        Ok(())
    }

    /// Check that an entry lies entirely within the archive stream.
    ///
    /// Uncompressed entries must also store exactly their length.
    pub fn check_bounds(&self, entry: &CatalogEntry) -> Result<()> {
        if !entry.compressed && entry.stored_length != entry.length {
            return Err(ArchiveError::LengthMismatch {
                name: entry.name.clone(),
                stored_length: entry.stored_length,
                length: entry.length,
            });
        }
        if entry.offset.checked_add(entry.stored_length).is_none_or(|end| end > self.size) {
            return Err(ArchiveError::EntryOutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                length: entry.stored_length,
                archive_size: self.size,
            });
        }
        Ok(())
    }

    /// Read an entry's stored bytes without decompressing them.
    pub fn read_stored(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        self.check_bounds(entry)?;
        let length = usize::try_from(entry.stored_length).map_err(|_| {
            ArchiveError::EntryOutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                length: entry.stored_length,
                archive_size: self.size,
            }
        })?;
        let mut stored = vec![0u8; length];
        self.read_exact_at(entry.offset, &mut stored)?;
        Ok(stored)
    }

    /// Decompress a compressed entry into `output`.
    ///
    /// `output` must be exactly the entry's uncompressed length.
    pub fn decompress_into(
        &self,
        entry: &CatalogEntry,
        decompressor: &dyn Decompressor,
        output: &mut [u8],
    ) -> Result<()> {
        if output.len() as u64 != entry.length {
            return Err(ArchiveError::Decompression(format!(
                "output buffer is {} bytes, entry {} is {} bytes",
                output.len(),
                entry.name,
                entry.length
            )));
        }
        let stored = self.read_stored(entry)?;
        debug!(
            "Decompressing {} ({} -> {} bytes) from {}",
            entry.name, entry.stored_length, entry.length, self.name
        );
        decompressor.decompress(&stored, output)
    }
}

impl fmt::Debug for BigArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigArchive")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("entries", &self.catalog.len())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// The main archive plus an optional update archive.
///
/// Lookups consult the update archive first so patched entries shadow the
/// originals.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSet {
    main: Option<Arc<BigArchive>>,
    update: Option<Arc<BigArchive>>,
}

impl ArchiveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the main archive.
    #[must_use]
    pub fn with_main(mut self, archive: Arc<BigArchive>) -> Self {
        self.main = Some(archive);
        self
    }

    /// Set the update archive.
    #[must_use]
    pub fn with_update(mut self, archive: Arc<BigArchive>) -> Self {
        self.update = Some(archive);
        self
    }

    /// Replace the main archive.
    pub fn set_main(&mut self, archive: Option<Arc<BigArchive>>) {
        self.main = archive;
    }

    /// Replace the update archive.
    pub fn set_update(&mut self, archive: Option<Arc<BigArchive>>) {
        self.update = archive;
    }

    /// The main archive, if mounted.
    pub fn main(&self) -> Option<&Arc<BigArchive>> {
        self.main.as_ref()
    }

    /// The update archive, if mounted.
    pub fn update(&self) -> Option<&Arc<BigArchive>> {
        self.update.as_ref()
    }

    /// Whether no archive is mounted.
    pub const fn is_empty(&self) -> bool {
        self.main.is_none() && self.update.is_none()
    }

    /// Find an entry, update archive first.
    pub fn lookup(&self, name: &str) -> Option<(Arc<BigArchive>, CatalogEntry)> {
        [self.update.as_ref(), self.main.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|archive| {
                archive
                    .lookup(name)
                    .map(|entry| (Arc::clone(archive), entry))
            })
    }

    /// Whether any mounted archive holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builder::ArchiveBuilder;
    use crate::catalog::TableOfContents;
    use crate::decompress::ZlibDecompressor;
    use std::io::Cursor;

    fn memory_archive(
        entries: &[(&str, &[u8], bool)],
        generation: ArchiveGeneration,
    ) -> BigArchive {
        let mut builder = ArchiveBuilder::new();
        for (name, data, compress) in entries {
            builder.add(name, data, *compress).expect("add entry");
        }
        let (image, toc) = builder.finish();
        BigArchive::from_reader("memory", Cursor::new(image), toc, generation)
            .expect("open archive")
    }

    #[test]
    fn test_read_at_and_bounds() {
        let archive = memory_archive(
            &[("a.txt", b"hello", false), ("b.txt", b"world", false)],
            ArchiveGeneration::Main,
        );
        assert_eq!(archive.size(), 10);

        let entry = archive.lookup("b.txt").expect("entry");
        assert_eq!(entry.offset, 5);

        let mut buf = [0u8; 5];
        assert_eq!(archive.read_at(entry.offset, &mut buf).expect("read"), 5);
        assert_eq!(&buf, b"world");

        // Reads past the end come back short
        let mut buf = [0u8; 8];
        assert_eq!(archive.read_at(8, &mut buf).expect("read"), 2);
        assert!(archive.read_exact_at(8, &mut buf).is_err());

        let bogus = CatalogEntry::stored("bogus", 8, 5);
        assert!(matches!(
            archive.check_bounds(&bogus),
            Err(ArchiveError::EntryOutOfBounds { archive_size: 10, .. })
        ));
    }

    #[test]
    fn test_uncompressed_length_mismatch_is_rejected() {
        let archive = memory_archive(
            &[("a.txt", b"abc", false), ("secret.txt", b"XYZ", false)],
            ArchiveGeneration::Main,
        );
        let overlong = CatalogEntry {
            length: 6,
            ..CatalogEntry::stored("a.txt", 0, 3)
        };
        assert!(matches!(
            archive.check_bounds(&overlong),
            Err(ArchiveError::LengthMismatch {
                stored_length: 3,
                length: 6,
                ..
            })
        ));
        assert!(archive.read_stored(&overlong).is_err());

        // Compressed entries legitimately differ
        let packed = CatalogEntry::compressed("a.txt", 0, 3, 6);
        assert!(archive.check_bounds(&packed).is_ok());
    }

    #[test]
    fn test_decompress_into() {
        let content = b"line one\nline two\nline three\n".repeat(8);
        let archive = memory_archive(
            &[("level.script", content.as_slice(), true)],
            ArchiveGeneration::Main,
        );
        let entry = archive.lookup("LEVEL.SCRIPT").expect("entry");
        assert!(entry.compressed);
        assert_eq!(entry.length, content.len() as u64);

        let mut output = vec![0u8; content.len()];
        archive
            .decompress_into(&entry, &ZlibDecompressor, &mut output)
            .expect("decompress");
        assert_eq!(output, content);

        let mut wrong = vec![0u8; 3];
        assert!(archive
            .decompress_into(&entry, &ZlibDecompressor, &mut wrong)
            .is_err());
    }

    #[test]
    fn test_update_shadows_main() {
        let main = Arc::new(memory_archive(
            &[("shared.txt", b"main", false), ("only_main.txt", b"m", false)],
            ArchiveGeneration::Main,
        ));
        let update = Arc::new(memory_archive(
            &[("shared.txt", b"patched", false)],
            ArchiveGeneration::Update,
        ));
        let set = ArchiveSet::new().with_main(main).with_update(update);

        let (archive, entry) = set.lookup("shared.txt").expect("shared");
        assert_eq!(archive.generation(), ArchiveGeneration::Update);
        assert_eq!(entry.length, 7);

        let (archive, _) = set.lookup("only_main.txt").expect("main only");
        assert_eq!(archive.generation(), ArchiveGeneration::Main);

        assert!(!set.contains("missing.txt"));
        assert!(!set.is_empty());
        assert!(ArchiveSet::new().is_empty());
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("homeworld.big");

        let mut builder = ArchiveBuilder::new();
        builder.add("a.txt", b"on disk", false).expect("add");
        let toc: TableOfContents = builder.write_to(&path).expect("write");

        let archive = BigArchive::open(&path, toc, ArchiveGeneration::Main).expect("open");
        let entry = archive.lookup("a.txt").expect("entry");
        assert_eq!(archive.read_stored(&entry).expect("read"), b"on disk");
        assert!(archive.name().ends_with("homeworld.big"));
    }
}
