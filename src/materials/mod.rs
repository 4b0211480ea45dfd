//! Materials module: component registry, composition engine and the views
//! built on top of it.

pub mod coherency;
pub mod config;
pub mod engine;
pub mod enumeration;
pub mod incremental;
pub mod modifier;
pub mod operation;
pub mod registry;
pub mod snapshot;

pub use coherency::{CoherencyChecker, CoherencyReport, CoherencyViolation};
pub use config::EngineConfig;
pub use engine::CompositionEngine;
pub use enumeration::{AllEnvCell, ComponentNode, EnvCell, MatCell, NodeArena, NodeLevel, NodeRef};
pub use incremental::ModificationSummary;
pub use modifier::{MaterialModifier, ModifierOutcome};
pub use operation::{ModificationKind, ModificationOperation};
pub use registry::{
    ComponentRef, ComponentRegistry, Environment, EnvironmentId, IndexerInfo, Material, MaterialId,
    RegistryBuilder,
};
pub use snapshot::{CompositionSnapshot, SnapshotMode};
