//! MeshMaterialError: Unified error type for mesh-materials public APIs
//!
//! Every fallible operation of the composition engine returns this error.
//! Invariant violations detected after an update started leave the engine
//! poisoned; see [`CompositionEngine`](crate::materials::engine::CompositionEngine).

use std::fmt;

use thiserror::Error;

use crate::data::indexer::IndexerId;
use crate::data::storage_index::StorageIndex;
use crate::materials::coherency::CoherencyViolation;
use crate::topology::cell::CellId;

/// Unified error type for mesh-materials operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshMaterialError {
    /// A cell id is outside `0..nb_cells` of the partition.
    #[error("cell {cell} is out of range (nb_cells={nb_cells})")]
    CellOutOfRange { cell: CellId, nb_cells: usize },
    /// The same cell appears twice in one modification operation.
    #[error("cell {0} appears more than once in the modification operation")]
    DuplicateCellInOperation(CellId),
    /// Adding a cell that the component already contains.
    #[error("cell {cell} is already present in `{component}`")]
    CellAlreadyPresent { cell: CellId, component: String },
    /// Removing a cell that the component does not contain.
    #[error("cell {cell} is not present in `{component}`")]
    CellNotPresent { cell: CellId, component: String },
    /// No reserved partial slot is left in an indexer; a full recompute was skipped.
    #[error("partial storage of indexer {indexer} is full (capacity={capacity}); a full recompute is required")]
    CapacityExceeded { indexer: IndexerId, capacity: u32 },
    /// A ledger counter would go below zero.
    #[error("ledger underflow for cell {cell} ({level})")]
    LedgerUnderflow { cell: CellId, level: String },
    /// A ledger counter would exceed its storage type.
    #[error("ledger overflow for cell {cell} ({level})")]
    LedgerOverflow { cell: CellId, level: String },
    /// Ledger counters disagree with each other.
    #[error("ledger mismatch for cell {cell}: {detail}")]
    LedgerMismatch { cell: CellId, detail: String },
    /// A storage index addresses no slot of a field variable.
    #[error("storage index {0} is outside the reserved field storage")]
    InvalidStorageIndex(StorageIndex),
    /// The coherency checker found mismatches between ledger, indexers and enumeration tree.
    #[error("incoherent composition: {nb_errors} violation(s); first: {violations}")]
    IncoherentComposition {
        nb_errors: usize,
        violations: ViolationList,
    },
    /// A previous failure left the engine in an undefined state.
    #[error("composition engine is poisoned by an earlier failure; it cannot be updated any more")]
    Poisoned,
    /// An environment was declared without any material.
    #[error("environment `{0}` has no material")]
    EmptyEnvironment(String),
    /// Two environments or two materials share a name.
    #[error("component name `{0}` is declared twice")]
    DuplicateComponentName(String),
    /// More components than a `u16` id can address.
    #[error("too many components: {0}")]
    TooManyComponents(usize),
    /// A material id or name that the registry does not know.
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),
    /// An environment id or name that the registry does not know.
    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),
    /// An indexer id that does not exist.
    #[error("unknown indexer {0}")]
    UnknownIndexer(IndexerId),
}

/// Bounded list of coherency violations carried by
/// [`MeshMaterialError::IncoherentComposition`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationList(pub Vec<CoherencyViolation>);

impl fmt::Display for ViolationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use itertools::Itertools;
        write!(f, "[{}]", self.0.iter().join("; "))
    }
}
