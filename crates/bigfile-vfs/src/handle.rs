//! Open-file slots.
//!
//! A fixed pool of slots indexed by small integer handles. Each occupied
//! slot owns OS resources, so the capacity is a hard ceiling: when every
//! slot is taken, opens fail instead of waiting.

use crate::{Result, VfsError};
use std::fmt;

/// Maximum number of simultaneously open files.
pub const MAX_FILES_OPEN: usize = 32;

/// Identifier of an open file.
///
/// Handles index the slot array. A handle is not reissued while its file
/// is still open, but the same number may come back after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(u32);

impl FileHandle {
    /// Build a handle from its raw number.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle number.
    pub const fn raw(self) -> u32 {
        self.0
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-capacity slot table.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
    in_use: usize,
}

impl<T> HandleTable<T> {
    /// Create a table with [`MAX_FILES_OPEN`] slots.
    pub fn new() -> Self {
        Self::with_capacity(MAX_FILES_OPEN)
    }

    /// Create a table with `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, in_use: 0 }
    }

    /// Store `value` in the first free slot.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::HandleTableExhausted`] when every slot is taken;
    /// `value` is dropped.
    pub fn insert(&mut self, value: T) -> Result<FileHandle> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(VfsError::HandleTableExhausted(self.slots.len()))?;
        let raw = u32::try_from(index).map_err(|_| VfsError::HandleTableExhausted(index))?;

        self.slots[index] = Some(value);
        self.in_use += 1;
        Ok(FileHandle(raw))
    }

    /// Empty a slot and hand back its contents.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::InvalidHandle`] for a free or out-of-range
    /// handle; the table is left untouched.
    pub fn release(&mut self, handle: FileHandle) -> Result<T> {
        let value = self
            .slots
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(VfsError::InvalidHandle(handle))?;
        self.in_use -= 1;
        Ok(value)
    }

    /// Borrow the contents of an occupied slot.
    pub fn get(&self, handle: FileHandle) -> Result<&T> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(VfsError::InvalidHandle(handle))
    }

    /// Mutably borrow the contents of an occupied slot.
    pub fn get_mut(&mut self, handle: FileHandle) -> Result<&mut T> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(VfsError::InvalidHandle(handle))
    }

    /// Number of occupied slots.
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.in_use == self.slots.len()
    }

    /// Handles of all occupied slots, lowest first.
    pub fn handles(&self) -> impl Iterator<Item = FileHandle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(index, _)| u32::try_from(index).ok().map(FileHandle))
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
