//! MaterialVariable: a per-material field honoring the storage index contract.
//!
//! The variable holds one global array (one value per cell) and one partial
//! array per component indexer. Values are addressed by [`StorageIndex`], so a
//! client reads a component's value in a cell through the storage index of
//! the corresponding enumeration node.

use crate::data::indexer::IndexerId;
use crate::data::migration::{FieldMigrationHook, StorageLayout};
use crate::data::storage::{Storage, VecStorage};
use crate::data::storage_index::StorageIndex;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;

/// Global + partial value arrays of one field.
#[derive(Clone, Debug)]
pub struct MaterialVariable<V, S: Storage<V> = VecStorage<V>> {
    name: String,
    fill: V,
    global: S,
    /// Indexed by `IndexerId::index()`.
    partials: Vec<S>,
}

impl<V: Clone, S: Storage<V>> MaterialVariable<V, S> {
    /// Variable with `nb_cells` global values set to `fill` and no partial
    /// storage yet.
    pub fn new(name: impl Into<String>, nb_cells: usize, fill: V) -> Self {
        Self {
            name: name.into(),
            global: S::filled(nb_cells, fill.clone()),
            fill,
            partials: Vec::new(),
        }
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value stored at `index`.
    pub fn value(&self, index: StorageIndex) -> Option<&V> {
        self.buffer(index)?.as_slice().get(index.position() as usize)
    }

    /// Overwrite the value stored at `index`.
    ///
    /// # Errors
    /// `InvalidStorageIndex` if `index` lies outside the reserved storage.
    pub fn set_value(&mut self, index: StorageIndex, value: V) -> Result<(), MeshMaterialError> {
        let slot = self
            .buffer_mut(index)
            .and_then(|b| b.as_mut_slice().get_mut(index.position() as usize))
            .ok_or(MeshMaterialError::InvalidStorageIndex(index))?;
        *slot = value;
        Ok(())
    }

    /// Global value of `cell`.
    pub fn global_value(&self, cell: CellId) -> Option<&V> {
        self.value(StorageIndex::pure(cell))
    }

    /// Whole global array.
    pub fn global_values(&self) -> &[V] {
        self.global.as_slice()
    }

    /// Whole partial array of `indexer`.
    pub fn partial_values(&self, indexer: IndexerId) -> Option<&[V]> {
        self.partials.get(indexer.index()).map(|s| s.as_slice())
    }

    fn buffer(&self, index: StorageIndex) -> Option<&S> {
        match index.indexer() {
            None => Some(&self.global),
            Some(id) => self.partials.get(id.index()),
        }
    }

    fn buffer_mut(&mut self, index: StorageIndex) -> Option<&mut S> {
        match index.indexer() {
            None => Some(&mut self.global),
            Some(id) => self.partials.get_mut(id.index()),
        }
    }
}

impl<V: Clone, S: Storage<V>> FieldMigrationHook for MaterialVariable<V, S> {
    fn reserve_partial_storage(&mut self, layout: &StorageLayout) {
        let fill = self.fill.clone();
        self.global.resize(layout.nb_cells(), fill.clone());
        let nb_arrays = layout
            .partial_capacities()
            .iter()
            .map(|(id, _)| id.index() + 1)
            .max()
            .unwrap_or(0);
        self.partials = (0..nb_arrays)
            .map(|i| {
                let cap = layout.partial_capacity(IndexerId::new(i as u16));
                S::filled(cap as usize, fill.clone())
            })
            .collect();
        log::debug!(
            "variable `{}` reserved nb_cells={} total_partial={}",
            self.name,
            layout.nb_cells(),
            layout.total_partial_capacity()
        );
    }

    fn copy_global_to_partial(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        partial_positions: &[u32],
    ) -> Result<(), MeshMaterialError> {
        let Some(partial) = self.partials.get_mut(indexer.index()) else {
            return Err(missing_partial(&self.name, indexer, partial_positions));
        };
        let pairs = cells
            .iter()
            .zip(partial_positions)
            .map(|(cell, &pos)| (cell.index(), pos as usize));
        let nb_global = self.global.len();
        partial
            .copy_slots(self.global.as_slice(), pairs)
            .map_err(|(cell, pos)| {
                let index = if cell >= nb_global {
                    StorageIndex::pure(CellId::new(cell as u32))
                } else {
                    StorageIndex::partial(indexer, pos as u32)
                };
                log::error!("variable `{}`: no slot at {index}", self.name);
                MeshMaterialError::InvalidStorageIndex(index)
            })
    }

    fn copy_partial_to_global(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        partial_positions: &[u32],
    ) -> Result<(), MeshMaterialError> {
        let Some(partial) = self.partials.get(indexer.index()) else {
            return Err(missing_partial(&self.name, indexer, partial_positions));
        };
        let pairs = partial_positions
            .iter()
            .zip(cells)
            .map(|(&pos, cell)| (pos as usize, cell.index()));
        self.global
            .copy_slots(partial.as_slice(), pairs)
            .map_err(|(pos, cell)| {
                let index = if pos >= partial.len() {
                    StorageIndex::partial(indexer, pos as u32)
                } else {
                    StorageIndex::pure(CellId::new(cell as u32))
                };
                log::error!("variable `{}`: no slot at {index}", self.name);
                MeshMaterialError::InvalidStorageIndex(index)
            })
    }
}

fn missing_partial(name: &str, indexer: IndexerId, positions: &[u32]) -> MeshMaterialError {
    log::error!("variable `{name}` has no partial storage for indexer {indexer}");
    let position = positions.first().copied().unwrap_or(0);
    MeshMaterialError::InvalidStorageIndex(StorageIndex::partial(indexer, position))
}
