//! Stdio-like virtual file access over loose files and packed archives.
//!
//! Game code opens files by logical name. This crate decides where the
//! bytes come from: a loose file under one of the configured root paths, or
//! an entry inside a mounted BIG archive. Loose files shadow archive
//! entries of the same name, which lets patches and mods override packaged
//! content without rebuilding the archive.
//!
//! - **Path resolution** ([`resolver`]): logical name + [`OpenFlags`] +
//!   configured roots → ordered candidate locations, optionally matching
//!   names without regard to case.
//! - **Handle table** ([`handle`]): a fixed pool of 32 open-file slots.
//! - **Stream emulation** ([`stream`]): compressed archive entries are
//!   decompressed once on open and then served from memory with a virtual
//!   offset, so seek/read/line/char operations behave like a disk file.
//! - **Access façade** ([`FileSystem`]): the public open/close/seek/read
//!   operations.
//!
//! # Example
//!
//! ```rust,no_run
//! use bigfile_vfs::{FileSystem, OpenFlags, VfsConfig, Whence};
//!
//! # fn example() -> bigfile_vfs::Result<()> {
//! let config = VfsConfig::new("/opt/homeworld");
//! let mut fs = FileSystem::new(config);
//!
//! if let Some(handle) = fs.open("Scripts\\startup.script", OpenFlags::TEXT_MODE)? {
//!     while let Some(line) = fs.line_read(handle, 256)? {
//!         println!("{line}");
//!     }
//!     fs.seek(handle, 0, Whence::Start)?;
//!     fs.close(handle)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Threading
//!
//! [`FileSystem`] operations take `&mut self`, so opening and closing is
//! serialized by whoever owns it. Callers that share one across threads
//! must wrap it in a mutex. Archive streams are shared between handles and
//! carry their own lock.

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use bigfile_archive::ArchiveError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Open flags and seek origins
pub mod flags;

// Configuration
pub mod config;

// Logical name to location resolution
pub mod resolver;

// Open-file slots
pub mod handle;

// Decompression buffer reuse
pub mod scratch;

// Seekable streams over disk files and archive entries
pub mod stream;

// Public access façade
mod file_system;

pub use config::{FailurePolicy, VfsConfig};
pub use file_system::FileSystem;
pub use flags::{OpenFlags, Whence};
pub use handle::{FileHandle, HandleTable, MAX_FILES_OPEN};
pub use resolver::{Candidate, PathResolver};

/// Maximum length of a resolved path, in bytes.
pub const MAX_PATH_LEN: usize = 256;

/// Result type for file operations.
pub type Result<T> = std::result::Result<T, VfsError>;

/// Errors that can occur during file operations.
///
/// End of file is not an error: read operations report it as `None`.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No candidate location holds the file.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Every handle slot is in use.
    #[error("Handle table exhausted: {0} files already open")]
    HandleTableExhausted(usize),

    /// Operation on a handle that is not open.
    #[error("Invalid file handle: {0}")]
    InvalidHandle(FileHandle),

    /// Seek target outside the file, or the OS refused the seek.
    #[error("Seek out of range: {0}")]
    SeekOutOfRange(String),

    /// Archive entry could not be decompressed.
    #[error("Decompression failed: {0}")]
    DecompressionFailure(String),

    /// Write or append requested against an archive entry.
    #[error("Archive entries are read-only: {0}")]
    WriteUnsupportedOnArchive(String),

    /// Resolved path exceeds the configured length limit.
    #[error("Path too long ({length} > {max} bytes): {path}")]
    PathTooLong {
        /// Offending path
        path: String,
        /// Its length in bytes
        length: usize,
        /// Configured limit
        max: usize,
    },

    /// A read that required a full buffer hit the end of the file.
    #[error("Unexpected end of file: wanted {expected} bytes, got {actual}")]
    UnexpectedEof {
        /// Bytes requested
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Archive stream error.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Disk I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`VfsError`], used by [`FailurePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// [`VfsError::NotFound`]
    NotFound,
    /// [`VfsError::HandleTableExhausted`]
    HandleTableExhausted,
    /// [`VfsError::InvalidHandle`]
    InvalidHandle,
    /// [`VfsError::SeekOutOfRange`]
    SeekOutOfRange,
    /// [`VfsError::DecompressionFailure`]
    DecompressionFailure,
    /// [`VfsError::WriteUnsupportedOnArchive`]
    WriteUnsupportedOnArchive,
    /// [`VfsError::PathTooLong`]
    PathTooLong,
    /// [`VfsError::UnexpectedEof`]
    UnexpectedEof,
    /// [`VfsError::Config`]
    Config,
    /// [`VfsError::Archive`]
    Archive,
    /// [`VfsError::Io`]
    Io,
}

impl VfsError {
    /// The kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::HandleTableExhausted(_) => ErrorKind::HandleTableExhausted,
            Self::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Self::SeekOutOfRange(_) => ErrorKind::SeekOutOfRange,
            Self::DecompressionFailure(_) => ErrorKind::DecompressionFailure,
            Self::WriteUnsupportedOnArchive(_) => ErrorKind::WriteUnsupportedOnArchive,
            Self::PathTooLong { .. } => ErrorKind::PathTooLong,
            Self::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            Self::Config(_) => ErrorKind::Config,
            Self::Archive(_) => ErrorKind::Archive,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            VfsError::NotFound("a.txt".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            VfsError::HandleTableExhausted(32).kind(),
            ErrorKind::HandleTableExhausted
        );
        assert_eq!(
            VfsError::InvalidHandle(FileHandle::from_raw(3)).kind(),
            ErrorKind::InvalidHandle
        );
        let io = std::io::Error::other("boom");
        assert_eq!(VfsError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        let err = VfsError::PathTooLong {
            path: "x".repeat(3),
            length: 3,
            max: 2,
        };
        assert_eq!(err.to_string(), "Path too long (3 > 2 bytes): xxx");

        let err = VfsError::InvalidHandle(FileHandle::from_raw(7));
        assert_eq!(err.to_string(), "Invalid file handle: #7");
    }
}
