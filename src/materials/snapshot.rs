//! Serializable per-cell description of the composition.
//!
//! Snapshots compare two engines cell by cell. In
//! [`SnapshotMode::Classification`] partial positions are left out, so two
//! engines that reached the same composition through different update
//! orders compare equal; [`SnapshotMode::Exact`] keeps them.

use crate::data::storage_index::StorageIndex;
use crate::materials::engine::CompositionEngine;
use crate::materials::registry::{EnvironmentId, MaterialId};
use crate::topology::cell::CellId;

/// Which storage details a snapshot records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum SnapshotMode {
    /// Pure/partial flags only.
    #[default]
    Classification,
    /// Pure/partial flags and partial positions.
    Exact,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MaterialSnapshot {
    pub material: MaterialId,
    pub pure: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnvironmentSnapshot {
    pub environment: EnvironmentId,
    pub pure: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<u32>,
    pub materials: Vec<MaterialSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CellSnapshot {
    pub cell: CellId,
    pub environments: Vec<EnvironmentSnapshot>,
}

/// Composition of every non-empty cell, in cell order.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompositionSnapshot {
    pub nb_cells: usize,
    pub cells: Vec<CellSnapshot>,
}

impl CompositionSnapshot {
    /// Snapshot of `cell`, if it holds any environment.
    pub fn cell(&self, cell: CellId) -> Option<&CellSnapshot> {
        self.cells
            .binary_search_by_key(&cell, |c| c.cell)
            .ok()
            .map(|i| &self.cells[i])
    }
}

fn position(storage: StorageIndex, mode: SnapshotMode) -> Option<u32> {
    match mode {
        SnapshotMode::Exact if storage.is_partial() => Some(storage.position()),
        _ => None,
    }
}

impl CompositionEngine {
    /// Describe the current enumeration tree.
    pub fn snapshot(&self, mode: SnapshotMode) -> CompositionSnapshot {
        let cells = self
            .all_env_cells()
            .filter(|cell| cell.nb_environments() > 0)
            .map(|cell| CellSnapshot {
                cell: cell.cell(),
                environments: cell
                    .environments()
                    .map(|env| EnvironmentSnapshot {
                        environment: env.environment_id(),
                        pure: env.storage_index().is_pure(),
                        position: position(env.storage_index(), mode),
                        materials: env
                            .materials()
                            .map(|mat| MaterialSnapshot {
                                material: mat.material_id(),
                                pure: mat.storage_index().is_pure(),
                                position: position(mat.storage_index(), mode),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        CompositionSnapshot {
            nb_cells: self.nb_cells(),
            cells,
        }
    }
}
