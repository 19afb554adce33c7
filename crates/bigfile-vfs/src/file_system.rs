//! Public access façade.

use crate::config::VfsConfig;
use crate::flags::{OpenFlags, Whence};
use crate::handle::{FileHandle, HandleTable};
use crate::resolver::{Candidate, PathResolver};
use crate::scratch::ScratchPool;
use crate::stream::{DiskStream, EntryStream};
use crate::{Result, VfsError};
use bigfile_archive::{
    ArchiveError, ArchiveSet, BigArchive, CatalogEntry, Decompressor, ZlibDecompressor,
};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Where a logical name resolved to.
enum Location {
    Disk(PathBuf),
    Archive(Arc<BigArchive>, CatalogEntry),
}

/// Bytes behind an open handle.
#[derive(Debug)]
enum Backing {
    Disk(DiskStream),
    Archive(EntryStream),
}

/// One occupied handle slot.
#[derive(Debug)]
struct OpenFile {
    /// Resolved disk path or archive entry name
    path: String,
    flags: OpenFlags,
    backing: Backing,
}

/// Virtual file system over loose files and mounted archives.
///
/// Every handle operation dispatches on whether the handle is backed by a
/// disk file or an archive entry.
pub struct FileSystem {
    config: VfsConfig,
    archives: ArchiveSet,
    decompressor: Box<dyn Decompressor>,
    handles: HandleTable<OpenFile>,
    scratch: ScratchPool,
}

impl FileSystem {
    /// Create a file system with no archives mounted.
    pub fn new(config: VfsConfig) -> Self {
        let scratch = ScratchPool::new(config.scratch_limit);
        Self {
            config,
            archives: ArchiveSet::new(),
            decompressor: Box::new(ZlibDecompressor),
            handles: HandleTable::new(),
            scratch,
        }
    }

    /// Mount archives.
    #[must_use]
    pub fn with_archives(mut self, archives: ArchiveSet) -> Self {
        self.archives = archives;
        self
    }

    /// Replace the decompressor used for compressed entries.
    #[must_use]
    pub fn with_decompressor(mut self, decompressor: Box<dyn Decompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    /// Active configuration.
    pub const fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Mounted archives.
    pub const fn archives(&self) -> &ArchiveSet {
        &self.archives
    }

    /// Mounted archives, for mounting or unmounting. Open handles keep the
    /// archive they were opened from.
    pub const fn archives_mut(&mut self) -> &mut ArchiveSet {
        &mut self.archives
    }

    /// Set the root prepended to relative names.
    pub fn set_prepend_path(&mut self, path: impl AsRef<Path>) {
        self.config.prepend_path = Some(path.as_ref().to_path_buf());
    }

    /// Set the CD-ROM root.
    pub fn set_cdrom_path(&mut self, path: impl AsRef<Path>) {
        self.config.cdrom_path = Some(path.as_ref().to_path_buf());
    }

    /// Set the user settings root.
    pub fn set_user_settings_path(&mut self, path: impl AsRef<Path>) {
        self.config.user_settings_path = Some(path.as_ref().to_path_buf());
    }

    /// Set the engine install root.
    pub fn set_engine_root_path(&mut self, path: impl AsRef<Path>) {
        self.config.engine_root_path = Some(path.as_ref().to_path_buf());
    }

    /// Number of open handles.
    pub const fn open_count(&self) -> usize {
        self.handles.in_use()
    }

    /// Open a file by logical name.
    ///
    /// Returns `Ok(None)` only when `RETURN_NULL_ON_FAIL` is set and the
    /// failure policy lists the error as recoverable. Every other failure
    /// is returned as an error.
    pub fn open(&mut self, name: &str, flags: OpenFlags) -> Result<Option<FileHandle>> {
        match self.open_handle(name, flags) {
            Ok(handle) => Ok(Some(handle)),
            Err(e)
                if flags.contains(OpenFlags::RETURN_NULL_ON_FAIL)
                    && self.config.failure_policy.is_recoverable(e.kind()) =>
            {
                warn!("Could not open {}: {}", name, e);
                Ok(None)
            }
            Err(e) => {
                error!("Failed to open {} ({}): {}", name, flags, e);
                Err(e)
            }
        }
    }

    fn open_handle(&mut self, name: &str, flags: OpenFlags) -> Result<FileHandle> {
        // Fail before any decompression work
        if self.handles.is_full() {
            return Err(VfsError::HandleTableExhausted(self.handles.capacity()));
        }

        let file = match self.locate(name, flags)? {
            Location::Disk(path) => {
                let stream = if flags.is_write() {
                    let file = if flags.contains(OpenFlags::APPEND_MODE) {
                        OpenOptions::new().append(true).create(true).open(&path)?
                    } else {
                        File::create(&path)?
                    };
                    DiskStream::writer(file)
                } else {
                    DiskStream::reader(File::open(&path)?)
                };
                OpenFile {
                    path: path.display().to_string(),
                    flags,
                    backing: Backing::Disk(stream),
                }
            }
            Location::Archive(archive, entry) => {
                let path = entry.name.clone();
                let stream = EntryStream::open(
                    archive,
                    entry,
                    &mut self.scratch,
                    self.decompressor.as_ref(),
                )?;
                OpenFile {
                    path,
                    flags,
                    backing: Backing::Archive(stream),
                }
            }
        };

        let source = match &file.backing {
            Backing::Disk(_) => "disk".to_string(),
            Backing::Archive(stream) => format!("{} archive", stream.archive().generation()),
        };
        let path = file.path.clone();
        let handle = self.handles.insert(file)?;
        debug!("Opened {} as {} from {}", path, handle, source);
        Ok(handle)
    }

    /// Resolve a logical name to the first location that holds it.
    ///
    /// Write opens take the first disk candidate whether or not the file
    /// exists yet.
    fn locate(&self, name: &str, flags: OpenFlags) -> Result<Location> {
        let resolver = PathResolver::new(&self.config);

        for candidate in resolver.candidates(name, flags) {
            match candidate {
                Candidate::Disk(path) => {
                    let found = if flags.is_write() {
                        Some(resolver.locate(&path).unwrap_or(path))
                    } else {
                        resolver.locate(&path)
                    };
                    if let Some(found) = found {
                        self.check_path_len(&found)?;
                        return Ok(Location::Disk(found));
                    }
                }
                Candidate::Archive(entry_name) => {
                    if flags.is_write() {
                        return Err(VfsError::WriteUnsupportedOnArchive(entry_name));
                    }
                    if let Some((archive, entry)) = self.archives.lookup(&entry_name) {
                        return Ok(Location::Archive(archive, entry));
                    }
                }
            }
        }

        Err(VfsError::NotFound(name.to_string()))
    }

    fn check_path_len(&self, path: &Path) -> Result<()> {
        let length = path.as_os_str().len();
        if length > self.config.max_path_len {
            return Err(VfsError::PathTooLong {
                path: path.display().to_string(),
                length,
                max: self.config.max_path_len,
            });
        }
        Ok(())
    }

    /// Close a handle, releasing everything it owns.
    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        let file = self.handles.release(handle)?;
        match file.backing {
            Backing::Disk(mut stream) => stream.flush()?,
            Backing::Archive(stream) => {
                if let Some(buffer) = stream.into_buffer() {
                    self.scratch.give_back(buffer);
                }
            }
        }
        debug!("Closed {} ({})", handle, file.path);
        Ok(())
    }

    /// Move the read position. Returns the new position.
    pub fn seek(&mut self, handle: FileHandle, offset: i64, whence: Whence) -> Result<u64> {
        match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => stream.seek(offset, whence),
            Backing::Archive(stream) => stream.seek(offset, whence),
        }
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `None` at end of file. A read that runs into the end returns
    /// the bytes it got; the next read reports end of file.
    pub fn block_read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<Option<usize>> {
        let read = match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => stream.read(buf)?,
            Backing::Archive(stream) => stream.read(buf)?,
        };
        Ok((read > 0 || buf.is_empty()).then_some(read))
    }

    /// Fill `buf` completely.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::UnexpectedEof`] if the file ends first. The bytes
    /// that were available have still been consumed.
    pub fn block_read_exact(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<()> {
        let read = self.block_read(handle, buf)?.unwrap_or(0);
        if read < buf.len() {
            return Err(VfsError::UnexpectedEof {
                expected: buf.len(),
                actual: read,
            });
        }
        Ok(())
    }

    /// Read one line of at most `max_len` bytes, without its newline.
    ///
    /// Returns `None` at end of file. Text-mode handles also drop a `\r`
    /// before the newline.
    pub fn line_read(&mut self, handle: FileHandle, max_len: usize) -> Result<Option<String>> {
        let file = self.handles.get_mut(handle)?;
        let text_mode = file.flags.is_text();
        match &mut file.backing {
            Backing::Disk(stream) => stream.read_line(max_len, text_mode),
            Backing::Archive(stream) => stream.read_line(max_len, text_mode),
        }
    }

    /// Read one byte, or `None` at end of file.
    pub fn char_read(&mut self, handle: FileHandle) -> Result<Option<u8>> {
        match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => stream.read_byte(),
            Backing::Archive(stream) => stream.read_byte(),
        }
    }

    /// Write `data` to a handle opened with `WRITE_MODE` or `APPEND_MODE`.
    pub fn block_write(&mut self, handle: FileHandle, data: &[u8]) -> Result<()> {
        let file = self.handles.get_mut(handle)?;
        match &mut file.backing {
            Backing::Disk(stream) => stream.write(data),
            Backing::Archive(_) => Err(VfsError::WriteUnsupportedOnArchive(file.path.clone())),
        }
    }

    /// Bytes between the read position and the end of the file.
    pub fn remaining_size(&mut self, handle: FileHandle) -> Result<u64> {
        match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => stream.remaining(),
            Backing::Archive(stream) => Ok(stream.remaining()),
        }
    }

    /// Current read position.
    pub fn current_position(&mut self, handle: FileHandle) -> Result<u64> {
        match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => stream.position(),
            Backing::Archive(stream) => Ok(stream.position()),
        }
    }

    /// Whether the read position is at the end of the file.
    pub fn is_eof(&mut self, handle: FileHandle) -> Result<bool> {
        match &mut self.handles.get_mut(handle)?.backing {
            Backing::Disk(stream) => Ok(stream.remaining()? == 0),
            Backing::Archive(stream) => Ok(stream.is_eof()),
        }
    }

    /// Whether the handle reads from an archive rather than a disk file.
    pub fn is_archive_backed(&self, handle: FileHandle) -> Result<bool> {
        Ok(match self.handles.get(handle)?.backing {
            Backing::Disk(_) => false,
            Backing::Archive(_) => true,
        })
    }

    /// Resolved disk path or archive entry name of an open handle.
    pub fn path(&self, handle: FileHandle) -> Result<&str> {
        Ok(&self.handles.get(handle)?.path)
    }

    /// Whether `name` resolves anywhere under `flags`.
    ///
    /// Write and append flags are ignored: the question is whether the
    /// file exists, not whether it could be created.
    pub fn exists(&self, name: &str, flags: OpenFlags) -> bool {
        let flags = flags.without(OpenFlags::WRITE_MODE | OpenFlags::APPEND_MODE);
        self.locate(name, flags).is_ok()
    }

    /// Whether a mounted archive holds `name`, ignoring disk files.
    pub fn exists_in_archive(&self, name: &str) -> bool {
        self.archives.contains(name)
    }

    /// Size in bytes of the file `name` resolves to.
    ///
    /// For archive entries this is the uncompressed length. Entries whose
    /// catalog record does not fit the archive are reported as errors.
    pub fn size_of(&self, name: &str, flags: OpenFlags) -> Result<u64> {
        let flags = flags.without(OpenFlags::WRITE_MODE | OpenFlags::APPEND_MODE);
        match self.locate(name, flags)? {
            Location::Disk(path) => Ok(fs::metadata(path)?.len()),
            Location::Archive(archive, entry) => {
                archive.check_bounds(&entry)?;
                Ok(entry.length)
            }
        }
    }

    /// Read a whole file into memory.
    ///
    /// Does not occupy a handle slot.
    pub fn load(&self, name: &str, flags: OpenFlags) -> Result<Vec<u8>> {
        let flags = flags.without(OpenFlags::WRITE_MODE | OpenFlags::APPEND_MODE);
        let data = match self.locate(name, flags)? {
            Location::Disk(path) => fs::read(path)?,
            Location::Archive(archive, entry) if entry.compressed => {
                let len = usize::try_from(entry.length).map_err(|_| {
                    VfsError::DecompressionFailure(format!("{} is too large", entry.name))
                })?;
                let mut data = vec![0u8; len];
                archive
                    .decompress_into(&entry, self.decompressor.as_ref(), &mut data)
                    .map_err(|e| match e {
                        ArchiveError::Decompression(msg) => {
                            VfsError::DecompressionFailure(format!("{}: {msg}", entry.name))
                        }
                        other => VfsError::Archive(other),
                    })?;
                data
            }
            Location::Archive(archive, entry) => archive.read_stored(&entry)?,
        };
        debug!("Loaded {} ({} bytes)", name, data.len());
        Ok(data)
    }

    /// Write `data` to a disk file, replacing any existing content.
    pub fn save(&self, name: &str, data: &[u8]) -> Result<()> {
        match self.locate(name, OpenFlags::WRITE_MODE)? {
            Location::Disk(path) => {
                fs::write(&path, data)?;
                debug!("Saved {} ({} bytes)", path.display(), data.len());
                Ok(())
            }
            Location::Archive(_, entry) => Err(VfsError::WriteUnsupportedOnArchive(entry.name)),
        }
    }

    /// Delete the disk file `name` resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::WriteUnsupportedOnArchive`] when the name only
    /// resolves to an archive entry.
    pub fn delete(&self, name: &str, flags: OpenFlags) -> Result<()> {
        let flags = flags.without(OpenFlags::WRITE_MODE | OpenFlags::APPEND_MODE);
        match self.locate(name, flags)? {
            Location::Disk(path) => {
                fs::remove_file(&path)?;
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Location::Archive(_, entry) => Err(VfsError::WriteUnsupportedOnArchive(entry.name)),
        }
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("config", &self.config)
            .field("archives", &self.archives)
            .field("open", &self.handles.in_use())
            .finish_non_exhaustive()
    }
}
