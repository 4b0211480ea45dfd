//! Data module: counters, indexers and the field storage contract
#![warn(missing_docs)]

pub mod indexer;
pub mod ledger;
pub mod material_variable;
pub mod migration;
pub mod storage;
pub mod storage_index;

pub use indexer::{ComponentIndexer, IndexerEntry, IndexerId, TransformOutcome, TransformRule};
pub use ledger::{ConnectivityLedger, LedgerLevel};
pub use material_variable::MaterialVariable;
pub use migration::{FieldMigrationHook, StorageLayout};
pub use storage::{Storage, VecStorage};
pub use storage_index::StorageIndex;
