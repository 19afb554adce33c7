//! Read-only access to packed game archives ("BIG files").
//!
//! An archive container is a single file holding many named entries, each
//! stored either verbatim or zlib-compressed. This crate provides the pieces
//! a virtual file layer needs to read those entries:
//!
//! - **Catalog**: [`ArchiveCatalog`] maps an entry name to its byte range and
//!   compression metadata. [`TableOfContents`] is the in-memory implementation.
//! - **Decompressor**: [`Decompressor`] turns a compressed byte range into a
//!   buffer of known length. [`ZlibDecompressor`] is the default.
//! - **Shared stream**: [`BigArchive`] owns one read-only stream per archive
//!   file and serializes positioned reads against it.
//! - **Generations**: [`ArchiveSet`] holds the main archive and an optional
//!   update archive; lookups check the update archive first.
//!
//! The on-disk table-of-contents layout is not parsed here. Callers supply a
//! catalog built from whatever index format their container uses.
//!
//! # Example
//!
//! ```rust
//! use bigfile_archive::{ArchiveBuilder, ArchiveGeneration, ArchiveSet, BigArchive};
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), bigfile_archive::ArchiveError> {
//! let mut builder = ArchiveBuilder::new();
//! builder.add("scripts/startup.script", b"level 1\n", true)?;
//! let (image, toc) = builder.finish();
//!
//! let archive = BigArchive::from_reader("memory", Cursor::new(image), toc, ArchiveGeneration::Main)?;
//! let archives = ArchiveSet::new().with_main(Arc::new(archive));
//! assert!(archives.lookup("Scripts\\Startup.script").is_some());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]

use thiserror::Error;

// Shared archive streams and generations
pub mod archive;

// Archive construction
pub mod builder;

// Name lookup
pub mod catalog;

// Entry decompression
pub mod decompress;

pub use archive::{ArchiveGeneration, ArchiveSet, BigArchive, ReadSeek};
pub use builder::ArchiveBuilder;
pub use catalog::{ArchiveCatalog, CatalogEntry, TableOfContents, normalize_entry_name};
pub use decompress::{Decompressor, ZlibDecompressor, compress_zlib};

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur while reading archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O error on the underlying archive stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decompressor rejected the entry data.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Catalog entry points outside the archive stream.
    #[error(
        "Entry {name} out of bounds: {offset} + {length} exceeds archive size {archive_size}"
    )]
    EntryOutOfBounds {
        /// Entry name
        name: String,
        /// Entry start offset
        offset: u64,
        /// Stored length of the entry
        length: u64,
        /// Size of the archive stream
        archive_size: u64,
    },

    /// Uncompressed entry whose stored and uncompressed lengths differ.
    #[error(
        "Entry {name} is stored uncompressed but its lengths differ: {stored_length} stored, {length} declared"
    )]
    LengthMismatch {
        /// Entry name
        name: String,
        /// Bytes the entry occupies in the archive
        stored_length: u64,
        /// Declared uncompressed length
        length: u64,
    },

    /// Two entries normalize to the same name.
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),
}
