//! Field migration hooks.
//!
//! Per-material field variables do not belong to the engine. They are handed
//! to each recompute or update as a slice of [`FieldMigrationHook`] trait
//! objects, and the engine calls them whenever cells cross the pure/partial
//! boundary of an indexer.

use crate::data::indexer::{IndexerId, TransformOutcome};
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;

/// Sizes of the storage arrays every field variable must provide, as fixed
/// by the last full recompute.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StorageLayout {
    nb_cells: usize,
    partial_capacities: Vec<(IndexerId, u32)>,
}

impl StorageLayout {
    /// Layout with `nb_cells` global slots and the given partial reservations.
    pub fn new(nb_cells: usize, partial_capacities: Vec<(IndexerId, u32)>) -> Self {
        Self {
            nb_cells,
            partial_capacities,
        }
    }

    /// Size of the global array.
    #[inline]
    pub fn nb_cells(&self) -> usize {
        self.nb_cells
    }

    /// `(indexer, capacity)` for every indexer, in indexer order.
    #[inline]
    pub fn partial_capacities(&self) -> &[(IndexerId, u32)] {
        &self.partial_capacities
    }

    /// Reserved partial slots of `indexer` (zero if unknown).
    pub fn partial_capacity(&self, indexer: IndexerId) -> u32 {
        self.partial_capacities
            .iter()
            .find(|(id, _)| *id == indexer)
            .map_or(0, |&(_, cap)| cap)
    }

    /// Total number of reserved partial slots.
    pub fn total_partial_capacity(&self) -> usize {
        self.partial_capacities
            .iter()
            .map(|&(_, cap)| cap as usize)
            .sum()
    }
}

/// Capability every per-material field variable implements so the engine
/// can keep its values consistent with the storage indices.
///
/// Copies must be **O(cells given)** and must not allocate: positions always
/// lie inside the reservation announced by the last
/// [`reserve_partial_storage`](Self::reserve_partial_storage).
pub trait FieldMigrationHook {
    /// Size the storage for a new layout. Called by every full recompute
    /// before any position is assigned; partial values need not survive.
    fn reserve_partial_storage(&mut self, layout: &StorageLayout);

    /// `cells[i]` moved from global storage to slot `partial_positions[i]`
    /// of `indexer`: copy the global value into the partial slot.
    ///
    /// # Errors
    /// `InvalidStorageIndex` if a slot lies outside the storage this hook
    /// reserved; no value is copied then.
    fn copy_global_to_partial(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        partial_positions: &[u32],
    ) -> Result<(), MeshMaterialError>;

    /// `cells[i]` moved from slot `partial_positions[i]` of `indexer` back to
    /// global storage: copy the partial value into the global slot. The
    /// partial slot is free afterwards and its value unspecified.
    ///
    /// # Errors
    /// As for [`copy_global_to_partial`](Self::copy_global_to_partial).
    fn copy_partial_to_global(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        partial_positions: &[u32],
    ) -> Result<(), MeshMaterialError>;
}

/// Forward a transform outcome to every hook in the direction of the update.
/// Stops at the first hook that fails.
pub(crate) fn migrate(
    hooks: &mut [&mut dyn FieldMigrationHook],
    indexer: IndexerId,
    outcome: &TransformOutcome,
    is_add: bool,
) -> Result<(), MeshMaterialError> {
    if outcome.is_empty() {
        return Ok(());
    }
    for hook in hooks.iter_mut() {
        if is_add {
            hook.copy_global_to_partial(indexer, &outcome.cells, &outcome.positions)?;
        } else {
            hook.copy_partial_to_global(indexer, &outcome.cells, &outcome.positions)?;
        }
    }
    Ok(())
}
