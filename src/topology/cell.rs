//! `CellId`: a strong, zero-cost handle for local mesh cells
//!
//! The mesh layer numbers the cells of a partition densely from zero. The
//! composition engine uses that local id both as the key of every per-cell
//! counter and as the position of a cell's value in global (pure) storage.
//!
//! This module provides:
//! - A transparent `CellId` newtype around `u32` that is `Pod`, so raw id
//!   arrays coming from the mesh layer can be reinterpreted without copying.
//! - Implementations of common traits (`Debug`, `Display`, ordering,
//!   hashing) so `CellId` can be used in maps, sets, and printed easily.

use std::fmt;

/// Local id of a mesh cell, valid for the lifetime of the partition.
///
/// # Memory layout
/// This type is `repr(transparent)` over `u32`.
#[derive(
    Copy,
    Clone,
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
#[repr(transparent)]
pub struct CellId(u32);

impl CellId {
    /// Wraps a raw local id.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        CellId(raw)
    }

    /// Returns the raw local id.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The local id as an index into dense per-cell arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Reinterpret a slice of raw local ids as cell ids without copying.
    #[inline]
    pub fn slice_from_raw(raw: &[u32]) -> &[CellId] {
        bytemuck::cast_slice(raw)
    }

    /// Reinterpret a slice of cell ids as raw local ids without copying.
    #[inline]
    pub fn slice_as_raw(cells: &[CellId]) -> &[u32] {
        bytemuck::cast_slice(cells)
    }
}

impl From<u32> for CellId {
    fn from(raw: u32) -> Self {
        CellId(raw)
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellId").field(&self.0).finish()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display() {
        let c = CellId::new(7);
        assert_eq!(format!("{:?}", c), "CellId(7)");
        assert_eq!(format!("{}", c), "7");
    }

    #[test]
    fn raw_slices_round_trip_without_copy() {
        let raw = [3u32, 1, 4];
        let cells = CellId::slice_from_raw(&raw);
        assert_eq!(cells, &[CellId::new(3), CellId::new(1), CellId::new(4)]);
        assert_eq!(CellId::slice_as_raw(cells).as_ptr(), raw.as_ptr());
    }

    #[test]
    fn ordering_follows_raw_id() {
        let mut v = vec![CellId::new(9), CellId::new(2), CellId::new(5)];
        v.sort_unstable();
        assert_eq!(v, vec![CellId::new(2), CellId::new(5), CellId::new(9)]);
    }
}
