//! Entry lookup by name.
//!
//! Entry names are matched ignoring ASCII case and separator style, so
//! `Scripts\Startup.script` and `scripts/startup.script` address the same
//! entry.

use crate::{ArchiveError, Result};
use std::collections::BTreeMap;

/// Location and compression metadata for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Normalized entry name
    pub name: String,
    /// Byte offset of the first stored byte within the archive stream
    pub offset: u64,
    /// Number of bytes the entry occupies in the archive
    pub stored_length: u64,
    /// Uncompressed length of the entry
    pub length: u64,
    /// Whether the stored bytes must be decompressed
    pub compressed: bool,
}

impl CatalogEntry {
    /// Entry stored verbatim.
    pub fn stored(name: impl AsRef<str>, offset: u64, length: u64) -> Self {
        Self {
            name: normalize_entry_name(name.as_ref()),
            offset,
            stored_length: length,
            length,
            compressed: false,
        }
    }

    /// Entry stored compressed.
    pub fn compressed(
        name: impl AsRef<str>,
        offset: u64,
        stored_length: u64,
        length: u64,
    ) -> Self {
        Self {
            name: normalize_entry_name(name.as_ref()),
            offset,
            stored_length,
            length,
            compressed: true,
        }
    }

    /// Offset one past the last stored byte.
    pub const fn end(&self) -> u64 {
        self.offset + self.stored_length
    }
}

/// Name lookup over an archive's table of contents.
///
/// Implementations must be cheap to query; the virtual file layer calls
/// [`lookup`](Self::lookup) on every open and existence check.
pub trait ArchiveCatalog: Send + Sync {
    /// Find an entry by name, returning `None` when absent.
    fn lookup(&self, name: &str) -> Option<CatalogEntry>;

    /// Number of entries in the catalog.
    fn len(&self) -> usize;

    /// Whether the catalog has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize an entry name: lowercase ASCII, `/` separators, no leading
/// `./` or `/`.
pub fn normalize_entry_name(name: &str) -> String {
    let unified: String = name
        .chars()
        .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
        .collect();

    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}

/// In-memory table of contents.
#[derive(Debug, Clone, Default)]
pub struct TableOfContents {
    entries: BTreeMap<String, CatalogEntry>,
}

impl TableOfContents {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries, rejecting duplicate names.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut toc = Self::new();
        for entry in entries {
            toc.insert(entry)?;
        }
        Ok(toc)
    }

    /// Add an entry. Its name is normalized before insertion.
    pub fn insert(&mut self, mut entry: CatalogEntry) -> Result<()> {
        entry.name = normalize_entry_name(&entry.name);
        if self.entries.contains_key(&entry.name) {
            return Err(ArchiveError::DuplicateEntry(entry.name));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Total uncompressed size of all entries.
    pub fn total_length(&self) -> u64 {
        self.entries.values().map(|e| e.length).sum()
    }
}

impl ArchiveCatalog for TableOfContents {
    fn lookup(&self, name: &str) -> Option<CatalogEntry> {
        self.entries.get(&normalize_entry_name(name)).cloned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(
            normalize_entry_name("Scripts\\Startup.Script"),
            "scripts/startup.script"
        );
        assert_eq!(normalize_entry_name("./data/a.txt"), "data/a.txt");
        assert_eq!(normalize_entry_name("/data/a.txt"), "data/a.txt");
        assert_eq!(normalize_entry_name(""), "");
    }

    #[test]
    fn test_lookup_ignores_case_and_separators() {
        let toc = TableOfContents::from_entries([
            CatalogEntry::stored("Art/Ships/Frigate.geo", 0, 10),
            CatalogEntry::compressed("Scripts\\Level1.script", 10, 4, 32),
        ])
        .expect("build toc");

        let entry = toc.lookup("art\\ships\\frigate.GEO").expect("found");
        assert_eq!(entry.offset, 0);
        assert!(!entry.compressed);

        let entry = toc.lookup("scripts/level1.script").expect("found");
        assert_eq!(entry.stored_length, 4);
        assert_eq!(entry.length, 32);
        assert!(entry.compressed);
        assert_eq!(entry.end(), 14);

        assert!(toc.lookup("scripts/level2.script").is_none());
        assert_eq!(toc.len(), 2);
        assert_eq!(toc.total_length(), 42);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let result = TableOfContents::from_entries([
            CatalogEntry::stored("a.txt", 0, 1),
            CatalogEntry::stored("A.TXT", 1, 1),
        ]);
        assert!(matches!(result, Err(ArchiveError::DuplicateEntry(name)) if name == "a.txt"));
    }

    #[test]
    fn test_empty_catalog() {
        let toc = TableOfContents::new();
        assert!(toc.is_empty());
        assert_eq!(toc.iter().count(), 0);
    }
}
