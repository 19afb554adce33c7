//! Open flags and seek origins.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Flags controlling how a file is opened and where it is looked for.
///
/// Bit values match the engine's `FF_*` constants. Bits `0x0004` and
/// `0x0008` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags {
    /// Raw flag value
    pub value: u32,
}

impl OpenFlags {
    /// No flags: read-only, disk first, then archive
    pub const NONE: Self = Self::new(0x0000);

    /// Strip `\r` before `\n` on line reads
    pub const TEXT_MODE: Self = Self::new(0x0001);

    /// Skip disk candidates, look only in archives
    pub const IGNORE_DISK: Self = Self::new(0x0002);

    /// Open for writing (truncates)
    pub const WRITE_MODE: Self = Self::new(0x0010);

    /// Open for appending
    pub const APPEND_MODE: Self = Self::new(0x0020);

    /// Return a sentinel instead of an error on recoverable open failures
    pub const RETURN_NULL_ON_FAIL: Self = Self::new(0x0040);

    /// Try the CD-ROM root
    pub const CDROM: Self = Self::new(0x0080);

    /// Skip the archive candidate, look only on disk
    pub const IGNORE_ARCHIVE: Self = Self::new(0x0100);

    /// Treat the name as already resolved
    pub const IGNORE_PREPEND: Self = Self::new(0x0200);

    /// Try the user settings root
    pub const USER_SETTINGS_PATH: Self = Self::new(0x0400);

    /// Try the engine install root
    pub const ENGINE_ROOT_PATH: Self = Self::new(0x0800);

    /// Create flags from a raw value.
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    /// Check whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        (self.value & other.value) == other.value
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.value |= other.value;
    }

    /// Copy of these flags with the bits of `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self::new(self.value & !other.value)
    }

    /// Whether the open would modify the file.
    pub const fn is_write(self) -> bool {
        self.contains(Self::WRITE_MODE) || self.contains(Self::APPEND_MODE)
    }

    /// Whether line reads strip carriage returns.
    pub const fn is_text(self) -> bool {
        self.contains(Self::TEXT_MODE)
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::new(self.value | rhs.value)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl From<u32> for OpenFlags {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.value)
    }
}

/// Origin for a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Whence {
    /// From the first byte of the file
    Start,
    /// From the current position
    Current,
    /// From one past the last byte
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_bit_values() {
        assert_eq!(OpenFlags::TEXT_MODE.value, 0x0001);
        assert_eq!(OpenFlags::IGNORE_DISK.value, 0x0002);
        assert_eq!(OpenFlags::RETURN_NULL_ON_FAIL.value, 0x0040);
        assert_eq!(OpenFlags::IGNORE_ARCHIVE.value, 0x0100);
        assert_eq!(OpenFlags::ENGINE_ROOT_PATH.value, 0x0800);
    }

    #[test]
    fn test_combine_and_clear() {
        let mut flags = OpenFlags::TEXT_MODE | OpenFlags::WRITE_MODE;
        assert!(flags.contains(OpenFlags::TEXT_MODE));
        assert!(flags.is_write());
        assert!(flags.is_text());

        flags |= OpenFlags::CDROM;
        assert!(flags.contains(OpenFlags::TEXT_MODE | OpenFlags::CDROM));

        let read_only = flags.without(OpenFlags::WRITE_MODE);
        assert!(!read_only.is_write());
        assert!(!OpenFlags::APPEND_MODE.without(OpenFlags::APPEND_MODE).is_write());
        assert!(OpenFlags::NONE.contains(OpenFlags::NONE));
    }

    #[test]
    fn test_display() {
        let flags = OpenFlags::from(0x0241);
        assert_eq!(flags.to_string(), "0x0241");
    }
}
