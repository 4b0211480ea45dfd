//! Modification operations submitted by client code.

use std::fmt;

use crate::materials::registry::MaterialId;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;
use crate::topology::cell_group::CellGroup;

/// Direction of a modification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModificationKind {
    Add,
    Remove,
}

/// Immutable `{material, cells, add-or-remove}` descriptor.
///
/// The caller guarantees that `cells` are distinct, absent from the material
/// (add) or present in it (remove). The engine verifies this only in check
/// mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModificationOperation {
    material: MaterialId,
    cells: Vec<CellId>,
    kind: ModificationKind,
}

impl ModificationOperation {
    pub fn new(material: MaterialId, cells: Vec<CellId>, kind: ModificationKind) -> Self {
        Self {
            material,
            cells,
            kind,
        }
    }

    /// Add `cells` to `material`.
    pub fn add(material: MaterialId, cells: impl Into<Vec<CellId>>) -> Self {
        Self::new(material, cells.into(), ModificationKind::Add)
    }

    /// Remove `cells` from `material`.
    pub fn remove(material: MaterialId, cells: impl Into<Vec<CellId>>) -> Self {
        Self::new(material, cells.into(), ModificationKind::Remove)
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn kind(&self) -> ModificationKind {
        self.kind
    }

    #[inline]
    pub fn is_add(&self) -> bool {
        self.kind == ModificationKind::Add
    }

    /// The reverse operation on the same cells.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ModificationKind::Add => ModificationKind::Remove,
            ModificationKind::Remove => ModificationKind::Add,
        };
        Self::new(self.material, self.cells.clone(), kind)
    }

    /// # Errors
    /// `DuplicateCellInOperation` on the first repeated cell.
    pub fn check_distinct(&self) -> Result<(), MeshMaterialError> {
        let mut seen = hashbrown::HashSet::with_capacity(self.cells.len());
        match self.cells.iter().find(|&&c| !seen.insert(c)) {
            Some(&cell) => Err(MeshMaterialError::DuplicateCellInOperation(cell)),
            None => Ok(()),
        }
    }

    /// Same operation restricted to the cells that actually change `group`:
    /// cells not yet in it for an add, cells in it for a remove. Repeated
    /// cells are kept once.
    pub fn filtered(&self, group: &CellGroup) -> Self {
        let mut seen = hashbrown::HashSet::with_capacity(self.cells.len());
        let cells = self
            .cells
            .iter()
            .copied()
            .filter(|&c| group.contains(c) != self.is_add() && seen.insert(c))
            .collect();
        Self::new(self.material, cells, self.kind)
    }
}

impl fmt::Display for ModificationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_add() { "add" } else { "remove" };
        write!(
            f,
            "{verb} material {} on {} cell(s)",
            self.material,
            self.cells.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[u32]) -> Vec<CellId> {
        raw.iter().copied().map(CellId::new).collect()
    }

    #[test]
    fn duplicates_are_reported() {
        let op = ModificationOperation::add(MaterialId::new(0), cells(&[1, 4, 1]));
        assert_eq!(
            op.check_distinct(),
            Err(MeshMaterialError::DuplicateCellInOperation(CellId::new(1)))
        );
        assert!(op.inverse().filtered(&CellGroup::new("m")).cells().is_empty());
    }

    #[test]
    fn filtering_keeps_effective_cells() {
        let group = CellGroup::from_cells("m", cells(&[2, 3])).unwrap();
        let add = ModificationOperation::add(MaterialId::new(1), cells(&[1, 2, 5, 5]));
        assert_eq!(add.filtered(&group).cells(), cells(&[1, 5]).as_slice());
        let rm = ModificationOperation::remove(MaterialId::new(1), cells(&[3, 9]));
        assert_eq!(rm.filtered(&group).cells(), cells(&[3]).as_slice());
        assert_eq!(rm.to_string(), "remove material 1 on 2 cell(s)");
    }
}
