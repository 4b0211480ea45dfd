//! Component indexer: cell → storage index map of one material or environment.
//!
//! Every material and every multi-material environment owns a
//! [`ComponentIndexer`] (a mono-material environment shares the indexer of its
//! sole material). The indexer tracks the ordered set of cells the component
//! is defined on and splits it into
//! - *pure* cells, whose value lives in global storage, and
//! - *partial* cells, each owning a dedicated slot of the indexer's partial
//!   array.
//!
//! Partial slots are reserved by a full recompute (`rebuild`) and never grow
//! afterwards: incremental updates take slots from a free list or from the
//! unused part of the reservation and fail with `CapacityExceeded` otherwise.

use std::fmt;

use hashbrown::HashMap;

use crate::data::ledger::ConnectivityLedger;
use crate::data::storage_index::StorageIndex;
use crate::debug_invariants::DebugInvariants;
use crate::materials::registry::EnvironmentId;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;

/// Dense id of a component indexer; also selects its partial array.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct IndexerId(u16);

impl IndexerId {
    /// Wraps a raw id.
    #[inline]
    pub const fn new(raw: u16) -> Self {
        IndexerId(raw)
    }

    /// Raw id.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Position in dense per-indexer collections.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IndexerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the ledger decides whether a cell of this indexer needs a partial slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TransformRule {
    /// Material of the given environment: partial when the cell holds more
    /// than one environment or more than one material of that environment.
    Material(EnvironmentId),
    /// Environment: partial when the cell holds more than one environment.
    Environment,
}

impl TransformRule {
    /// Whether `cell` must use partial storage under the current ledger counts.
    #[inline]
    pub fn wants_partial(self, ledger: &ConnectivityLedger, cell: CellId) -> bool {
        if ledger.nb_environments(cell) > 1 {
            return true;
        }
        match self {
            TransformRule::Material(env) => ledger.nb_materials(cell, env) > 1,
            TransformRule::Environment => false,
        }
    }
}

/// One tracked cell and its storage index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IndexerEntry {
    /// Local cell id.
    pub cell: CellId,
    /// Where the component's value for `cell` lives.
    pub storage: StorageIndex,
}

/// Cells that crossed the pure/partial boundary during a transform.
///
/// `positions[i]` is the partial slot of `cells[i]`: the newly assigned slot
/// for a pure→partial move, the released slot for a partial→pure move.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformOutcome {
    /// Moved cells.
    pub cells: Vec<CellId>,
    /// Their partial slots.
    pub positions: Vec<u32>,
}

impl TransformOutcome {
    /// Number of moved cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell moved.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Cell → storage index map of one component.
///
/// # Invariants
///
/// - `entry_of[entries[i].cell] == i` and `entry_of` has no other key.
/// - Partial slots are distinct, below `partial_capacity`, and absent from the
///   free list; `nb_partial` counts the partial entries.
#[derive(Clone, Debug)]
pub struct ComponentIndexer {
    id: IndexerId,
    name: String,
    rule: TransformRule,
    entries: Vec<IndexerEntry>,
    entry_of: HashMap<CellId, usize>,
    nb_partial: usize,
    partial_capacity: u32,
    /// Slots `0..high_water` have been handed out at least once.
    high_water: u32,
    free_slots: Vec<u32>,
}

impl ComponentIndexer {
    /// Empty indexer without reserved partial storage.
    pub fn new(id: IndexerId, name: impl Into<String>, rule: TransformRule) -> Self {
        Self {
            id,
            name: name.into(),
            rule,
            entries: Vec::new(),
            entry_of: HashMap::new(),
            nb_partial: 0,
            partial_capacity: 0,
            high_water: 0,
            free_slots: Vec::new(),
        }
    }

    /// Indexer id.
    #[inline]
    pub fn id(&self) -> IndexerId {
        self.id
    }

    /// Name of the owning component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classification rule.
    #[inline]
    pub fn rule(&self) -> TransformRule {
        self.rule
    }

    /// Number of tracked cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no cell is tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cells stored in partial slots.
    #[inline]
    pub fn nb_partial(&self) -> usize {
        self.nb_partial
    }

    /// Number of cells stored in global storage.
    #[inline]
    pub fn nb_pure(&self) -> usize {
        self.entries.len() - self.nb_partial
    }

    /// Number of partial slots reserved by the last full recompute.
    #[inline]
    pub fn partial_capacity(&self) -> u32 {
        self.partial_capacity
    }

    /// Whether `cell` is tracked.
    #[inline]
    pub fn contains(&self, cell: CellId) -> bool {
        self.entry_of.contains_key(&cell)
    }

    /// Storage index of `cell`, if tracked.
    #[inline]
    pub fn storage_index(&self, cell: CellId) -> Option<StorageIndex> {
        self.entry_of.get(&cell).map(|&i| self.entries[i].storage)
    }

    /// Tracked entries in indexer order.
    #[inline]
    pub fn entries(&self) -> &[IndexerEntry] {
        &self.entries
    }

    /// Tracked cells in indexer order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.entries.iter().map(|e| e.cell)
    }

    /// Entries stored in global storage.
    pub fn pure_entries(&self) -> impl Iterator<Item = &IndexerEntry> + '_ {
        self.entries.iter().filter(|e| e.storage.is_pure())
    }

    /// Entries stored in partial slots.
    pub fn partial_entries(&self) -> impl Iterator<Item = &IndexerEntry> + '_ {
        self.entries.iter().filter(|e| e.storage.is_partial())
    }

    /// Number of cells of `cells` that need a partial slot under `rule`.
    pub fn count_partial(cells: &[CellId], rule: TransformRule, ledger: &ConnectivityLedger) -> usize {
        cells
            .iter()
            .filter(|&&c| rule.wants_partial(ledger, c))
            .count()
    }

    /// Replace the tracked set by `cells` (kept in order), classifying each
    /// cell from the ledger and numbering partial slots consecutively.
    ///
    /// `partial_capacity` becomes the new reservation.
    ///
    /// # Errors
    /// `CellAlreadyPresent` if `cells` has duplicates, `CapacityExceeded` if
    /// the reservation is smaller than the number of partial cells.
    pub fn rebuild(
        &mut self,
        cells: &[CellId],
        ledger: &ConnectivityLedger,
        partial_capacity: u32,
    ) -> Result<(), MeshMaterialError> {
        self.entries.clear();
        self.entry_of.clear();
        self.entries.reserve(cells.len());
        self.free_slots.clear();
        self.nb_partial = 0;
        self.high_water = 0;
        self.partial_capacity = partial_capacity;
        for &cell in cells {
            if self.entry_of.contains_key(&cell) {
                return Err(self.already_present(cell));
            }
            let storage = if self.rule.wants_partial(ledger, cell) {
                self.allocate_slot()?
            } else {
                StorageIndex::pure(cell)
            };
            self.push_entry(cell, storage);
        }
        log::trace!(
            "indexer {} `{}` rebuilt: nb_cell={} nb_partial={} capacity={}",
            self.id,
            self.name,
            self.entries.len(),
            self.nb_partial,
            self.partial_capacity
        );
        Ok(())
    }

    /// Start tracking `cells`, classifying each from the ledger.
    ///
    /// # Errors
    /// `CellAlreadyPresent` for a tracked cell, `CapacityExceeded` when no
    /// partial slot is left.
    pub fn extend(&mut self, cells: &[CellId], ledger: &ConnectivityLedger) -> Result<(), MeshMaterialError> {
        for &cell in cells {
            if self.entry_of.contains_key(&cell) {
                return Err(self.already_present(cell));
            }
            let storage = if self.rule.wants_partial(ledger, cell) {
                self.allocate_slot()?
            } else {
                StorageIndex::pure(cell)
            };
            self.push_entry(cell, storage);
        }
        Ok(())
    }

    /// Stop tracking `cells`.
    ///
    /// The last entry is swapped into each freed position of the entry list
    /// and partial slots of removed cells return to the free list.
    ///
    /// # Errors
    /// `CellNotPresent` for an untracked cell.
    pub fn shrink(&mut self, cells: &[CellId]) -> Result<(), MeshMaterialError> {
        for &cell in cells {
            let Some(pos) = self.entry_of.remove(&cell) else {
                return Err(MeshMaterialError::CellNotPresent {
                    cell,
                    component: self.name.clone(),
                });
            };
            let removed = self.entries.swap_remove(pos);
            if let Some(moved) = self.entries.get(pos) {
                self.entry_of.insert(moved.cell, pos);
            }
            if removed.storage.is_partial() {
                self.release_slot(removed.storage.position());
            }
        }
        Ok(())
    }

    /// Move candidate cells across the pure/partial boundary.
    ///
    /// Only tracked `candidates` are considered. With `is_add`, a pure cell
    /// becomes partial when the ledger now asks for it; otherwise a partial
    /// cell becomes pure when the ledger no longer asks for partial storage.
    /// Cells already on the right side are left untouched.
    ///
    /// # Errors
    /// `CapacityExceeded` when no partial slot is left.
    pub fn transform(
        &mut self,
        candidates: &[CellId],
        is_add: bool,
        ledger: &ConnectivityLedger,
    ) -> Result<TransformOutcome, MeshMaterialError> {
        let mut outcome = TransformOutcome::default();
        for &cell in candidates {
            let Some(&pos) = self.entry_of.get(&cell) else {
                continue;
            };
            let storage = self.entries[pos].storage;
            let wants_partial = self.rule.wants_partial(ledger, cell);
            if is_add && storage.is_pure() && wants_partial {
                let new_storage = self.allocate_slot()?;
                self.entries[pos].storage = new_storage;
                outcome.cells.push(cell);
                outcome.positions.push(new_storage.position());
            } else if !is_add && storage.is_partial() && !wants_partial {
                self.entries[pos].storage = StorageIndex::pure(cell);
                self.release_slot(storage.position());
                outcome.cells.push(cell);
                outcome.positions.push(storage.position());
            }
        }
        log::trace!(
            "indexer {} `{}` transform is_add={} moved={:?}",
            self.id,
            self.name,
            is_add,
            outcome.cells
        );
        Ok(outcome)
    }

    fn push_entry(&mut self, cell: CellId, storage: StorageIndex) {
        self.entry_of.insert(cell, self.entries.len());
        self.entries.push(IndexerEntry { cell, storage });
    }

    fn allocate_slot(&mut self) -> Result<StorageIndex, MeshMaterialError> {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None if self.high_water < self.partial_capacity => {
                self.high_water += 1;
                self.high_water - 1
            }
            None => {
                return Err(MeshMaterialError::CapacityExceeded {
                    indexer: self.id,
                    capacity: self.partial_capacity,
                });
            }
        };
        self.nb_partial += 1;
        Ok(StorageIndex::partial(self.id, slot))
    }

    fn release_slot(&mut self, slot: u32) {
        self.nb_partial -= 1;
        self.free_slots.push(slot);
    }

    fn already_present(&self, cell: CellId) -> MeshMaterialError {
        MeshMaterialError::CellAlreadyPresent {
            cell,
            component: self.name.clone(),
        }
    }
}

impl DebugInvariants for ComponentIndexer {
    fn validate_invariants(&self) -> Result<(), MeshMaterialError> {
        if self.entry_of.len() != self.entries.len() {
            let cell = self
                .entry_of
                .keys()
                .copied()
                .find(|c| !self.entries.iter().any(|e| e.cell == *c))
                .unwrap_or(CellId::new(0));
            return Err(MeshMaterialError::CellNotPresent {
                cell,
                component: self.name.clone(),
            });
        }
        let mut used = hashbrown::HashSet::with_capacity(self.nb_partial);
        let mut nb_partial = 0usize;
        for (i, entry) in self.entries.iter().enumerate() {
            if self.entry_of.get(&entry.cell) != Some(&i) {
                return Err(self.already_present(entry.cell));
            }
            let storage = entry.storage;
            if storage.is_pure() {
                if storage.position() != entry.cell.get() {
                    return Err(MeshMaterialError::InvalidStorageIndex(storage));
                }
                continue;
            }
            nb_partial += 1;
            if storage.indexer() != Some(self.id)
                || storage.position() >= self.high_water
                || !used.insert(storage.position())
                || self.free_slots.contains(&storage.position())
            {
                return Err(MeshMaterialError::InvalidStorageIndex(storage));
            }
        }
        if nb_partial != self.nb_partial || self.high_water > self.partial_capacity {
            return Err(MeshMaterialError::CapacityExceeded {
                indexer: self.id,
                capacity: self.partial_capacity,
            });
        }
        Ok(())
    }
}
