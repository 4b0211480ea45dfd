#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-materials
//!
//! mesh-materials tracks which materials and environments are present in each
//! cell of a mesh partition and maintains the storage indices per-material
//! field data is addressed with. A cell holding a single component uses the
//! shared global slot (*pure*); any other cell gets a dedicated slot in the
//! component's partial array (*partial*).
//!
//! ## Features
//! - Connectivity ledger of per-cell environment and material counts
//! - Component indexers splitting each component's cells into pure and partial
//! - Full recompute and incremental add/remove of cells, migrating field values
//!   through [`FieldMigrationHook`](crate::data::migration::FieldMigrationHook)
//! - Arena-based enumeration tree: cell → environments → materials
//! - Coherency checker and `DebugInvariants` for verification runs
//! - Optional parallel read iteration with the `rayon` feature
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use mesh_materials::prelude::*;
//!
//! let registry = RegistryBuilder::new()
//!     .environment("gas", &["air"])
//!     .environment("metal", &["steel", "copper"])
//!     .build()?;
//! let steel = registry.material_by_name("steel")?;
//! let copper = registry.material_by_name("copper")?;
//!
//! let mut engine = CompositionEngine::new(registry, 16, EngineConfig::default());
//! let groups: HashMap<String, Vec<CellId>> =
//!     HashMap::from([("steel".to_string(), vec![CellId::new(3)])]);
//! engine.load_groups(&groups)?;
//!
//! let mut density: MaterialVariable<f64> = MaterialVariable::new("density", 16, 0.0);
//! engine.force_recompute(&mut [&mut density])?;
//!
//! engine.apply(&ModificationOperation::add(copper, vec![CellId::new(3)]), &mut [&mut density])?;
//! let cell = engine.all_env_cell(CellId::new(3)).unwrap();
//! assert_eq!(cell.environment(0).unwrap().nb_materials(), 2);
//! assert!(engine.component_indexer(ComponentRef::Material(steel))?
//!     .storage_index(CellId::new(3))
//!     .unwrap()
//!     .is_partial());
//! # Ok::<(), mesh_materials::mesh_error::MeshMaterialError>(())
//! ```
//!
//! ## Errors and poisoning
//! Every fallible operation returns [`MeshMaterialError`](crate::mesh_error::MeshMaterialError).
//! A failure after an update started mutating state poisons the engine; later
//! updates return `Poisoned`.

pub mod data;
pub mod debug_invariants;
pub mod materials;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::data::indexer::{ComponentIndexer, IndexerId};
    pub use crate::data::ledger::ConnectivityLedger;
    pub use crate::data::material_variable::MaterialVariable;
    pub use crate::data::migration::{FieldMigrationHook, StorageLayout};
    pub use crate::data::storage_index::StorageIndex;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::materials::{
        AllEnvCell, ComponentRef, ComponentRegistry, CompositionEngine, CompositionSnapshot,
        EngineConfig, EnvCell, EnvironmentId, MatCell, MaterialId, ModificationOperation,
        ModificationSummary, ModifierOutcome, RegistryBuilder, SnapshotMode,
    };
    pub use crate::mesh_error::MeshMaterialError;
    pub use crate::topology::{CellGroup, CellGroupProvider, CellId};
}
