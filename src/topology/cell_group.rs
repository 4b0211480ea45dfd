//! Cell groups: the live cell set of a material or environment.
//!
//! A [`CellGroup`] mirrors the mesh layer's group for one component. It keeps
//! the cells in a dense vector (group order) together with a position map so
//! that membership tests, insertions and removals are all **O(1)**.
//!
//! The mesh layer hands authoritative groups to the engine through the
//! [`CellGroupProvider`] trait when a full recompute is requested.

use std::collections::BTreeMap;
use std::hash::BuildHasher;

use hashbrown::HashMap;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;

/// Ordered, duplicate-free set of cells.
///
/// # Invariants
///
/// - `position[cells[i]] == i` for every `i`.
/// - `position` holds exactly the cells listed in `cells`.
#[derive(Clone, Debug, Default)]
pub struct CellGroup {
    name: String,
    cells: Vec<CellId>,
    position: HashMap<CellId, usize>,
}

impl CellGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a group holding `cells` in the given order.
    ///
    /// # Errors
    /// Returns `CellAlreadyPresent` if a cell is listed twice.
    pub fn from_cells<I>(name: impl Into<String>, cells: I) -> Result<Self, MeshMaterialError>
    where
        I: IntoIterator<Item = CellId>,
    {
        let mut group = Self::new(name);
        for cell in cells {
            group.push(cell)?;
        }
        Ok(group)
    }

    /// Name of the component this group belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the group has no cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `cell` belongs to the group.
    #[inline]
    pub fn contains(&self, cell: CellId) -> bool {
        self.position.contains_key(&cell)
    }

    /// Cells in group order.
    #[inline]
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    /// Iterator over cells in group order.
    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().copied()
    }

    /// Cells sorted by local id.
    pub fn sorted_cells(&self) -> Vec<CellId> {
        let mut cells = self.cells.clone();
        cells.sort_unstable();
        cells
    }

    /// Append every cell of `cells`.
    ///
    /// Nothing is inserted unless all cells are absent from the group.
    ///
    /// # Errors
    /// Returns `CellAlreadyPresent` on the first cell already in the group
    /// (or repeated inside `cells`).
    pub fn add_cells(&mut self, cells: &[CellId]) -> Result<(), MeshMaterialError> {
        let mut seen = hashbrown::HashSet::with_capacity(cells.len());
        for &cell in cells {
            if self.contains(cell) || !seen.insert(cell) {
                return Err(self.already_present(cell));
            }
        }
        self.cells.reserve(cells.len());
        for &cell in cells {
            self.position.insert(cell, self.cells.len());
            self.cells.push(cell);
        }
        Ok(())
    }

    /// Remove every cell of `cells`.
    ///
    /// The last cell of the group is moved into each freed position, so the
    /// relative order of the remaining cells is not preserved.
    ///
    /// # Errors
    /// Returns `CellNotPresent` on the first cell missing from the group;
    /// nothing is removed in that case.
    pub fn remove_cells(&mut self, cells: &[CellId]) -> Result<(), MeshMaterialError> {
        let mut seen = hashbrown::HashSet::with_capacity(cells.len());
        if let Some(&cell) = cells
            .iter()
            .find(|&&c| !self.contains(c) || !seen.insert(c))
        {
            return Err(MeshMaterialError::CellNotPresent {
                cell,
                component: self.name.clone(),
            });
        }
        for &cell in cells {
            let Some(pos) = self.position.remove(&cell) else {
                continue;
            };
            self.cells.swap_remove(pos);
            if let Some(&moved) = self.cells.get(pos) {
                self.position.insert(moved, pos);
            }
        }
        Ok(())
    }

    /// Remove all cells.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.position.clear();
    }

    fn push(&mut self, cell: CellId) -> Result<(), MeshMaterialError> {
        if self.contains(cell) {
            return Err(self.already_present(cell));
        }
        self.position.insert(cell, self.cells.len());
        self.cells.push(cell);
        Ok(())
    }

    fn already_present(&self, cell: CellId) -> MeshMaterialError {
        MeshMaterialError::CellAlreadyPresent {
            cell,
            component: self.name.clone(),
        }
    }
}

impl DebugInvariants for CellGroup {
    fn validate_invariants(&self) -> Result<(), MeshMaterialError> {
        if let Some(&cell) = self.position.keys().find(|c| !self.cells.contains(c)) {
            return Err(MeshMaterialError::CellNotPresent {
                cell,
                component: self.name.clone(),
            });
        }
        for (i, &cell) in self.cells.iter().enumerate() {
            if self.position.get(&cell) != Some(&i) {
                return Err(MeshMaterialError::CellNotPresent {
                    cell,
                    component: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Mesh-layer collaborator supplying the authoritative cell group of each
/// material.
///
/// Environment groups are not asked for: the engine derives them as the union
/// of their materials' groups.
pub trait CellGroupProvider {
    /// Cells of the material named `material`, without duplicates.
    ///
    /// An unknown name yields an empty group.
    fn material_cells(&self, material: &str) -> Vec<CellId>;
}

impl<S: BuildHasher> CellGroupProvider for std::collections::HashMap<String, Vec<CellId>, S> {
    fn material_cells(&self, material: &str) -> Vec<CellId> {
        self.get(material).cloned().unwrap_or_default()
    }
}

impl CellGroupProvider for BTreeMap<String, Vec<CellId>> {
    fn material_cells(&self, material: &str) -> Vec<CellId> {
        self.get(material).cloned().unwrap_or_default()
    }
}
