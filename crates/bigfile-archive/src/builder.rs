//! Archive construction.
//!
//! [`ArchiveBuilder`] packs named entries back to back into a container
//! image and records each entry's range in a [`TableOfContents`]. The
//! image holds entry data only; persisting the table is up to the caller.

use crate::Result;
use crate::catalog::{CatalogEntry, TableOfContents};
use crate::decompress::compress_zlib;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Builder for archive container images.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    data: Vec<u8>,
    toc: TableOfContents,
}

impl ArchiveBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, zlib-compressing it when `compress` is set.
    pub fn add(&mut self, name: &str, content: &[u8], compress: bool) -> Result<&mut Self> {
        let start = self.data.len();
        let offset = start as u64;
        let length = content.len() as u64;

        let entry = if compress {
            let packed = compress_zlib(content)?;
            self.data.extend_from_slice(&packed);
            CatalogEntry::compressed(name, offset, packed.len() as u64, length)
        } else {
            self.data.extend_from_slice(content);
            CatalogEntry::stored(name, offset, length)
        };

        debug!(
            "Packed {} at {} ({} stored, {} bytes)",
            entry.name, entry.offset, entry.stored_length, entry.length
        );

        if let Err(e) = self.toc.insert(entry) {
            // Roll back the data written for the rejected entry
            self.data.truncate(start);
            return Err(e);
        }
        Ok(self)
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.toc.iter().count()
    }

    /// Whether no entries have been added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish building, returning the container image and its table.
    pub fn finish(self) -> (Vec<u8>, TableOfContents) {
        (self.data, self.toc)
    }

    /// Write the container image to `path` and return its table.
    pub fn write_to(self, path: impl AsRef<Path>) -> Result<TableOfContents> {
        fs::write(path.as_ref(), &self.data)?;
        Ok(self.toc)
    }
}
