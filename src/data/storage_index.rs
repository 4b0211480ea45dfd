//! `StorageIndex`: the addressing unit of per-material field storage.
//!
//! A field value lives either in the global array (one value per cell, shared
//! by every component that is the sole occupant of the cell) or in the
//! partial array of one component indexer.

use std::fmt;

use crate::data::indexer::IndexerId;
use crate::topology::cell::CellId;

/// `(array, position)` pair used by field-variable storage.
///
/// - `array == 0`: global (pure) storage, `position` is the cell's local id.
/// - `array == indexer + 1`: partial storage of that indexer, `position` is
///   the slot inside it.
#[derive(
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(C)]
pub struct StorageIndex {
    array: u32,
    position: u32,
}

impl StorageIndex {
    /// Array id of the global storage.
    pub const GLOBAL_ARRAY: u32 = 0;

    /// Global slot of `cell`.
    #[inline]
    pub const fn pure(cell: CellId) -> Self {
        Self {
            array: Self::GLOBAL_ARRAY,
            position: cell.get(),
        }
    }

    /// Slot `position` in the partial array of `indexer`.
    #[inline]
    pub const fn partial(indexer: IndexerId, position: u32) -> Self {
        Self {
            array: indexer.get() as u32 + 1,
            position,
        }
    }

    /// Raw array id.
    #[inline]
    pub const fn array(self) -> u32 {
        self.array
    }

    /// Position inside the array.
    #[inline]
    pub const fn position(self) -> u32 {
        self.position
    }

    /// Whether this index addresses global storage.
    #[inline]
    pub const fn is_pure(self) -> bool {
        self.array == Self::GLOBAL_ARRAY
    }

    /// Whether this index addresses a partial array.
    #[inline]
    pub const fn is_partial(self) -> bool {
        !self.is_pure()
    }

    /// Indexer owning the partial array, `None` for global storage.
    #[inline]
    pub fn indexer(self) -> Option<IndexerId> {
        if self.is_pure() {
            None
        } else {
            u16::try_from(self.array - 1).ok().map(IndexerId::new)
        }
    }
}

impl fmt::Debug for StorageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageIndex({}, {})", self.array, self.position)
    }
}

impl fmt::Display for StorageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pure() {
            write!(f, "global[{}]", self.position)
        } else {
            write!(f, "partial{}[{}]", self.array - 1, self.position)
        }
    }
}
