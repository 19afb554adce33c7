//! Logical name to location resolution
//!
//! A logical name such as `Scripts\startup.script` can live in several
//! places. [`PathResolver::candidates`] lists them in the order they are
//! tried:
//!
//! 1. user settings root (`USER_SETTINGS_PATH`)
//! 2. engine install root (`ENGINE_ROOT_PATH`)
//! 3. CD-ROM root (`CDROM`)
//! 4. prepend path, unless `IGNORE_PREPEND`
//! 5. the name as given, when `IGNORE_PREPEND` is set or no prepend path
//!    is configured
//! 6. the archive entry
//!
//! Disk candidates are dropped by `IGNORE_DISK` and the archive candidate by
//! `IGNORE_ARCHIVE`. Loose files therefore shadow archive entries unless the
//! caller asks otherwise.

use crate::config::VfsConfig;
use crate::flags::OpenFlags;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// A place a logical name might be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Path on the real filesystem
    Disk(PathBuf),
    /// Entry name inside a mounted archive
    Archive(String),
}

impl Candidate {
    /// Whether this is a disk candidate
    pub const fn is_disk(&self) -> bool {
        matches!(self, Self::Disk(_))
    }
}

/// Resolves logical names against the configured roots
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    config: &'a VfsConfig,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver over `config`
    pub const fn new(config: &'a VfsConfig) -> Self {
        Self { config }
    }

    /// List candidate locations for `name` in priority order
    ///
    /// Write and append opens only produce an archive candidate when
    /// `IGNORE_DISK` leaves nothing else, so the caller can report the
    /// write as unsupported rather than not found.
    pub fn candidates(&self, name: &str, flags: OpenFlags) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if !flags.contains(OpenFlags::IGNORE_DISK) {
            let disk_name = disk_name(name);
            let rooted = [
                (OpenFlags::USER_SETTINGS_PATH, &self.config.user_settings_path),
                (OpenFlags::ENGINE_ROOT_PATH, &self.config.engine_root_path),
                (OpenFlags::CDROM, &self.config.cdrom_path),
            ];
            for (flag, root) in rooted {
                if let Some(root) = root
                    && flags.contains(flag)
                {
                    candidates.push(Candidate::Disk(join_root(root, &disk_name)));
                }
            }

            let ignore_prepend = flags.contains(OpenFlags::IGNORE_PREPEND);
            match &self.config.prepend_path {
                Some(prepend) if !ignore_prepend => {
                    candidates.push(Candidate::Disk(join_root(prepend, &disk_name)));
                }
                _ => candidates.push(Candidate::Disk(PathBuf::from(disk_name))),
            }
        }

        let archive_allowed = !flags.contains(OpenFlags::IGNORE_ARCHIVE)
            && (!flags.is_write() || flags.contains(OpenFlags::IGNORE_DISK));
        if archive_allowed {
            candidates.push(Candidate::Archive(name.to_string()));
        }

        trace!("Candidates for {} ({}): {:?}", name, flags, candidates);
        candidates
    }

    /// Find an existing file at `path`
    ///
    /// With case-insensitive matching enabled, a miss triggers one directory
    /// walk that compares each component ignoring ASCII case. The returned
    /// path uses the on-disk spelling.
    pub fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if !self.config.case_insensitive {
            return None;
        }
        find_ignoring_case(path).filter(|found| found.is_file())
    }
}

/// Convert a logical name to the platform's separator style
#[cfg(windows)]
fn disk_name(name: &str) -> String {
    name.to_string()
}

/// Convert a logical name to the platform's separator style
#[cfg(not(windows))]
fn disk_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Join a name under a root, even if the name looks absolute
fn join_root(root: &Path, name: &str) -> PathBuf {
    root.join(name.trim_start_matches(['/', '\\']))
}

/// Walk `path` component by component, matching names ignoring ASCII case
fn find_ignoring_case(path: &Path) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();

    for component in path.components() {
        let Component::Normal(wanted) = component else {
            resolved.push(component.as_os_str());
            continue;
        };

        let direct = resolved.join(wanted);
        if direct.exists() {
            resolved = direct;
            continue;
        }

        let wanted = wanted.to_str()?;
        let dir = if resolved.as_os_str().is_empty() {
            Path::new(".")
        } else {
            resolved.as_path()
        };
        let found = fs::read_dir(dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
            })?;
        resolved.push(found.file_name());
    }

    trace!("Case-insensitive match {} -> {}", path.display(), resolved.display());
    Some(resolved)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn all_roots() -> VfsConfig {
        VfsConfig::new("/prepend")
            .with_cdrom_path("/cdrom")
            .with_user_settings_path("/settings")
            .with_engine_root_path("/engine")
    }

    #[test]
    fn test_default_order_disk_then_archive() {
        let config = all_roots();
        let resolver = PathResolver::new(&config);
        let candidates = resolver.candidates("Data\\ships.txt", OpenFlags::NONE);

        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].is_disk());
        assert_eq!(candidates[1], Candidate::Archive("Data\\ships.txt".to_string()));

        #[cfg(not(windows))]
        assert_eq!(
            candidates[0],
            Candidate::Disk(PathBuf::from("/prepend/Data/ships.txt"))
        );
    }

    #[test]
    fn test_flagged_roots_in_priority_order() {
        let config = all_roots();
        let resolver = PathResolver::new(&config);
        let flags = OpenFlags::CDROM | OpenFlags::ENGINE_ROOT_PATH | OpenFlags::USER_SETTINGS_PATH;
        let candidates = resolver.candidates("a.txt", flags);

        assert_eq!(
            candidates,
            vec![
                Candidate::Disk(PathBuf::from("/settings/a.txt")),
                Candidate::Disk(PathBuf::from("/engine/a.txt")),
                Candidate::Disk(PathBuf::from("/cdrom/a.txt")),
                Candidate::Disk(PathBuf::from("/prepend/a.txt")),
                Candidate::Archive("a.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_unconfigured_roots_are_skipped() {
        let config = VfsConfig::new("/prepend");
        let resolver = PathResolver::new(&config);
        let candidates = resolver.candidates("a.txt", OpenFlags::CDROM);
        assert_eq!(
            candidates,
            vec![
                Candidate::Disk(PathBuf::from("/prepend/a.txt")),
                Candidate::Archive("a.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_ignore_prepend_uses_name_as_given() {
        let config = all_roots();
        let resolver = PathResolver::new(&config);
        let candidates = resolver.candidates("/abs/file.txt", OpenFlags::IGNORE_PREPEND);
        assert_eq!(candidates[0], Candidate::Disk(PathBuf::from("/abs/file.txt")));

        let bare = VfsConfig::default();
        let resolver = PathResolver::new(&bare);
        let candidates = resolver.candidates("rel.txt", OpenFlags::NONE);
        assert_eq!(candidates[0], Candidate::Disk(PathBuf::from("rel.txt")));
    }

    #[test]
    fn test_write_mode_skips_archive() {
        let config = all_roots();
        let resolver = PathResolver::new(&config);

        let candidates = resolver.candidates("save.dat", OpenFlags::WRITE_MODE);
        assert!(candidates.iter().all(Candidate::is_disk));

        // Archive-only write keeps the archive candidate so the open can be
        // rejected as a write against the archive
        let candidates =
            resolver.candidates("save.dat", OpenFlags::APPEND_MODE | OpenFlags::IGNORE_DISK);
        assert_eq!(candidates, vec![Candidate::Archive("save.dat".to_string())]);
    }

    #[test]
    fn test_locate_case_insensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Data").join("Ships")).expect("mkdir");
        let real = dir.path().join("Data").join("Ships").join("Frigate.SHP");
        fs::write(&real, b"frigate").expect("write");

        let wanted = dir.path().join("data").join("ships").join("frigate.shp");

        let sensitive = VfsConfig::default().with_case_insensitive(false);
        let found = PathResolver::new(&sensitive).locate(&wanted);
        // Case-insensitive filesystems find it directly
        if !wanted.is_file() {
            assert!(found.is_none());
        }

        let insensitive = VfsConfig::default().with_case_insensitive(true);
        let found = PathResolver::new(&insensitive)
            .locate(&wanted)
            .expect("case-insensitive match");
        assert_eq!(fs::read(found).expect("read"), b"frigate");
    }

    #[test]
    fn test_locate_rejects_directories_and_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("Sub")).expect("mkdir");

        let config = VfsConfig::default().with_case_insensitive(true);
        let resolver = PathResolver::new(&config);
        assert!(resolver.locate(&dir.path().join("sub")).is_none());
        assert!(resolver.locate(&dir.path().join("missing.txt")).is_none());
    }

    fn any_flags() -> impl Strategy<Value = OpenFlags> {
        (0u32..0x1000).prop_map(OpenFlags::new)
    }

    proptest! {
        /// Ignore flags remove every candidate of their kind
        #[test]
        fn ignore_flags_are_honoured(flags in any_flags(), name in "[A-Za-z0-9_\\\\/]{1,24}") {
            let config = all_roots();
            let resolver = PathResolver::new(&config);
            let candidates = resolver.candidates(&name, flags);

            if flags.contains(OpenFlags::IGNORE_DISK) {
                prop_assert!(candidates.iter().all(|c| !c.is_disk()));
            }
            if flags.contains(OpenFlags::IGNORE_ARCHIVE) {
                prop_assert!(candidates.iter().all(Candidate::is_disk));
            }
            // Disk candidates always precede the archive candidate
            let first_archive = candidates.iter().position(|c| !c.is_disk());
            if let Some(pos) = first_archive {
                prop_assert_eq!(pos, candidates.len() - 1);
            }
        }
    }
}
