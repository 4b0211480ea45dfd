//! Mesh-facing types: local cell ids and cell groups.

pub mod cell;
pub mod cell_group;

pub use cell::CellId;
pub use cell_group::{CellGroup, CellGroupProvider};
