//! Configuration for the virtual file layer

use crate::{ErrorKind, MAX_PATH_LEN, Result, VfsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of bytes the scratch pool may retain (16 MiB)
pub const DEFAULT_SCRATCH_LIMIT: usize = 16 * 1024 * 1024;

/// Configuration for the virtual file layer
///
/// Root paths are read on every resolution, so changing them affects later
/// opens but not handles that are already open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Root prepended to every relative name
    pub prepend_path: Option<PathBuf>,

    /// CD-ROM root, tried for `CDROM` opens
    pub cdrom_path: Option<PathBuf>,

    /// User settings root, tried for `USER_SETTINGS_PATH` opens
    pub user_settings_path: Option<PathBuf>,

    /// Engine install root, tried for `ENGINE_ROOT_PATH` opens
    pub engine_root_path: Option<PathBuf>,

    /// Match disk names without regard to ASCII case
    pub case_insensitive: bool,

    /// Longest resolved path accepted, in bytes
    pub max_path_len: usize,

    /// Largest decompression buffer kept for reuse, in bytes
    pub scratch_limit: usize,

    /// Which open failures may be turned into a sentinel
    pub failure_policy: FailurePolicy,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            prepend_path: None,
            cdrom_path: None,
            user_settings_path: None,
            engine_root_path: None,
            // Windows and macOS filesystems already ignore case
            case_insensitive: cfg!(not(any(windows, target_os = "macos"))),
            max_path_len: MAX_PATH_LEN,
            scratch_limit: DEFAULT_SCRATCH_LIMIT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl VfsConfig {
    /// Create a new configuration with the specified prepend path
    pub fn new<P: AsRef<Path>>(prepend_path: P) -> Self {
        Self {
            prepend_path: Some(prepend_path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Set the prepend path
    #[must_use]
    pub fn with_prepend_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.prepend_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the CD-ROM root
    #[must_use]
    pub fn with_cdrom_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cdrom_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the user settings root
    #[must_use]
    pub fn with_user_settings_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.user_settings_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the engine install root
    #[must_use]
    pub fn with_engine_root_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.engine_root_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable case-insensitive disk lookups
    #[must_use]
    pub const fn with_case_insensitive(mut self, enable: bool) -> Self {
        self.case_insensitive = enable;
        self
    }

    /// Set the maximum resolved path length
    #[must_use]
    pub const fn with_max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = len;
        self
    }

    /// Set the scratch buffer retention limit
    #[must_use]
    pub const fn with_scratch_limit(mut self, limit: usize) -> Self {
        self.scratch_limit = limit;
        self
    }

    /// Set the open failure policy
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Decides which open failures `RETURN_NULL_ON_FAIL` may suppress.
///
/// Failures not listed here are always returned as errors, whatever the
/// open flags say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Error kinds that become a sentinel under `RETURN_NULL_ON_FAIL`
    pub recoverable: Vec<ErrorKind>,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            recoverable: vec![
                ErrorKind::NotFound,
                ErrorKind::PathTooLong,
                ErrorKind::DecompressionFailure,
                ErrorKind::WriteUnsupportedOnArchive,
                ErrorKind::Io,
            ],
        }
    }
}

impl FailurePolicy {
    /// Policy under which every failure is returned as an error.
    pub const fn strict() -> Self {
        Self {
            recoverable: Vec::new(),
        }
    }

    /// Whether `kind` may be turned into a sentinel.
    pub fn is_recoverable(&self, kind: ErrorKind) -> bool {
        self.recoverable.contains(&kind)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = VfsConfig::new("/games/hw")
            .with_cdrom_path("/media/cdrom")
            .with_user_settings_path("/home/player/.homeworld")
            .with_engine_root_path("/opt/hw")
            .with_case_insensitive(true)
            .with_max_path_len(128)
            .with_scratch_limit(1024);

        assert_eq!(config.prepend_path, Some(PathBuf::from("/games/hw")));
        assert_eq!(config.cdrom_path, Some(PathBuf::from("/media/cdrom")));
        assert_eq!(config.max_path_len, 128);
        assert_eq!(config.scratch_limit, 1024);
        assert!(config.case_insensitive);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = VfsConfig::from_json(
            r#"{
                "prepend_path": "/games/hw",
                "case_insensitive": false,
                "failure_policy": { "recoverable": ["not_found"] }
            }"#,
        )
        .expect("parse config");

        assert_eq!(config.prepend_path, Some(PathBuf::from("/games/hw")));
        assert!(config.cdrom_path.is_none());
        assert!(!config.case_insensitive);
        assert_eq!(config.max_path_len, MAX_PATH_LEN);
        assert!(config.failure_policy.is_recoverable(ErrorKind::NotFound));
        assert!(!config.failure_policy.is_recoverable(ErrorKind::Io));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = VfsConfig::from_json("{ not json");
        assert!(matches!(result, Err(VfsError::Config(_))));
    }

    #[test]
    fn test_default_policy() {
        let policy = FailurePolicy::default();
        assert!(policy.is_recoverable(ErrorKind::NotFound));
        assert!(!policy.is_recoverable(ErrorKind::HandleTableExhausted));
        assert!(!FailurePolicy::strict().is_recoverable(ErrorKind::NotFound));
    }
}
