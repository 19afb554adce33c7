//! Archive files round-tripped through the filesystem

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use bigfile_archive::{
    ArchiveBuilder, ArchiveCatalog, ArchiveError, ArchiveGeneration, ArchiveSet, BigArchive,
    CatalogEntry, TableOfContents, ZlibDecompressor,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn write_archive(dir: &TempDir, file: &str, entries: &[(&str, &[u8], bool)]) -> BigArchive {
    let mut builder = ArchiveBuilder::new();
    for (name, content, compress) in entries {
        builder.add(name, content, *compress).unwrap();
    }
    let path = dir.path().join(file);
    let toc = builder.write_to(&path).unwrap();
    let generation = if file.starts_with("update") {
        ArchiveGeneration::Update
    } else {
        ArchiveGeneration::Main
    };
    BigArchive::open(&path, toc, generation).unwrap()
}

#[test]
fn test_open_from_disk_and_read_entries() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(
        &dir,
        "main.big",
        &[
            ("Scripts\\startup.script", b"run()\n", false),
            ("Art/ships/frigate.shp", &[7u8; 300], true),
        ],
    );

    assert_eq!(archive.generation(), ArchiveGeneration::Main);
    assert_eq!(archive.catalog().len(), 2);

    let script = archive.lookup("scripts/STARTUP.script").unwrap();
    assert!(!script.compressed);
    assert_eq!(archive.read_stored(&script).unwrap(), b"run()\n");

    let ship = archive.lookup("art\\ships\\frigate.shp").unwrap();
    assert!(ship.compressed);
    let mut out = vec![0u8; 300];
    archive
        .decompress_into(&ship, &ZlibDecompressor, &mut out)
        .unwrap();
    assert!(out.iter().all(|&b| b == 7));
}

#[test]
fn test_catalog_past_end_of_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.big");
    std::fs::write(&path, b"0123456789").unwrap();

    let toc = TableOfContents::from_entries([CatalogEntry::stored("tail.bin", 8, 4)]).unwrap();
    let archive = BigArchive::open(&path, toc, ArchiveGeneration::Main).unwrap();
    let entry = archive.lookup("tail.bin").unwrap();

    assert!(matches!(
        archive.read_stored(&entry),
        Err(ArchiveError::EntryOutOfBounds {
            offset: 8,
            length: 4,
            archive_size: 10,
            ..
        })
    ));
}

#[test]
fn test_concurrent_reads_share_one_stream() {
    let dir = TempDir::new().unwrap();
    let archive = Arc::new(write_archive(
        &dir,
        "main.big",
        &[("a.bin", &[1u8; 4096], false), ("b.bin", &[2u8; 4096], false)],
    ));

    let workers: Vec<_> = [("a.bin", 1u8), ("b.bin", 2u8)]
        .into_iter()
        .map(|(name, fill)| {
            let archive = Arc::clone(&archive);
            thread::spawn(move || {
                let entry = archive.lookup(name).unwrap();
                for _ in 0..50 {
                    let data = archive.read_stored(&entry).unwrap();
                    assert!(data.iter().all(|&b| b == fill));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_archive_set_prefers_update() {
    let dir = TempDir::new().unwrap();
    let main = write_archive(&dir, "main.big", &[("a.txt", b"old", false)]);
    let update = write_archive(&dir, "update.big", &[("a.txt", b"new", false)]);

    let mut set = ArchiveSet::new().with_main(Arc::new(main));
    let (archive, entry) = set.lookup("a.txt").unwrap();
    assert_eq!(archive.read_stored(&entry).unwrap(), b"old");

    set.set_update(Some(Arc::new(update)));
    let (archive, entry) = set.lookup("A.TXT").unwrap();
    assert_eq!(archive.generation(), ArchiveGeneration::Update);
    assert_eq!(archive.read_stored(&entry).unwrap(), b"new");

    set.set_main(None);
    set.set_update(None);
    assert!(set.is_empty());
    assert!(!set.contains("a.txt"));
}
