//! Connectivity ledger: dense per-cell component counters.
//!
//! The ledger is the single source of truth for cardinality: the number of
//! environments present in each cell and, for every environment, the number
//! of its materials present in each cell. Only the composition engine
//! adjusts it, and it always does so before any indexer reads it, because
//! pure/partial decisions depend on the post-operation counts.

use std::fmt;

use crate::debug_invariants::DebugInvariants;
use crate::materials::registry::EnvironmentId;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;

/// Which counter of a cell to read or adjust.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LedgerLevel {
    /// Number of environments present in the cell.
    Environments,
    /// Number of materials of one environment present in the cell.
    Materials(EnvironmentId),
}

impl fmt::Display for LedgerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerLevel::Environments => f.write_str("nb_environments"),
            LedgerLevel::Materials(env) => write!(f, "nb_materials(env={env})"),
        }
    }
}

/// Per-cell environment and material counters.
///
/// # Invariants
///
/// For every cell, `nb_environments(cell)` equals the number of environments
/// whose material count for that cell is non-zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityLedger {
    nb_cells: usize,
    nb_environments: usize,
    env_per_cell: Vec<u16>,
    /// Environment-major: `mat_per_cell[env * nb_cells + cell]`.
    mat_per_cell: Vec<u16>,
    /// Total number of (cell, material) pairs per environment.
    total_material_cells: Vec<usize>,
}

impl ConnectivityLedger {
    /// Zeroed ledger for `nb_cells` cells and `nb_environments` environments.
    pub fn new(nb_cells: usize, nb_environments: usize) -> Self {
        Self {
            nb_cells,
            nb_environments,
            env_per_cell: vec![0; nb_cells],
            mat_per_cell: vec![0; nb_cells * nb_environments],
            total_material_cells: vec![0; nb_environments],
        }
    }

    /// Reset every counter to zero.
    pub fn reset(&mut self) {
        self.env_per_cell.fill(0);
        self.mat_per_cell.fill(0);
        self.total_material_cells.fill(0);
    }

    /// Number of cells covered.
    #[inline]
    pub fn nb_cells(&self) -> usize {
        self.nb_cells
    }

    /// Current cardinality of `cell` at `level`.
    #[inline]
    pub fn count(&self, cell: CellId, level: LedgerLevel) -> u16 {
        match level {
            LedgerLevel::Environments => self.nb_environments(cell),
            LedgerLevel::Materials(env) => self.nb_materials(cell, env),
        }
    }

    /// Number of environments present in `cell`.
    #[inline]
    pub fn nb_environments(&self, cell: CellId) -> u16 {
        self.env_per_cell[cell.index()]
    }

    /// Number of materials of `env` present in `cell`.
    #[inline]
    pub fn nb_materials(&self, cell: CellId, env: EnvironmentId) -> u16 {
        self.mat_per_cell[self.mat_slot(cell, env)]
    }

    /// Number of materials of all environments present in `cell`.
    pub fn total_nb_materials(&self, cell: CellId) -> u32 {
        (0..self.nb_environments)
            .map(|e| u32::from(self.mat_per_cell[e * self.nb_cells + cell.index()]))
            .sum()
    }

    /// Total number of (cell, material) pairs of `env`.
    #[inline]
    pub fn total_material_cells(&self, env: EnvironmentId) -> usize {
        self.total_material_cells[env.index()]
    }

    /// Total number of (cell, environment) pairs.
    pub fn total_environment_cells(&self) -> usize {
        self.env_per_cell.iter().map(|&n| usize::from(n)).sum()
    }

    /// Add one to the counter of `cell` at `level`.
    ///
    /// # Errors
    /// `LedgerOverflow` if the counter is saturated.
    pub fn increment(&mut self, cell: CellId, level: LedgerLevel) -> Result<(), MeshMaterialError> {
        let slot = self.slot_mut(cell, level);
        *slot = slot
            .checked_add(1)
            .ok_or_else(|| MeshMaterialError::LedgerOverflow {
                cell,
                level: level.to_string(),
            })?;
        if let LedgerLevel::Materials(env) = level {
            self.total_material_cells[env.index()] += 1;
        }
        Ok(())
    }

    /// Remove one from the counter of `cell` at `level`.
    ///
    /// # Errors
    /// `LedgerUnderflow` if the counter is already zero.
    pub fn decrement(&mut self, cell: CellId, level: LedgerLevel) -> Result<(), MeshMaterialError> {
        let slot = self.slot_mut(cell, level);
        *slot = slot
            .checked_sub(1)
            .ok_or_else(|| MeshMaterialError::LedgerUnderflow {
                cell,
                level: level.to_string(),
            })?;
        if let LedgerLevel::Materials(env) = level {
            self.total_material_cells[env.index()] -= 1;
        }
        Ok(())
    }

    #[inline]
    fn mat_slot(&self, cell: CellId, env: EnvironmentId) -> usize {
        env.index() * self.nb_cells + cell.index()
    }

    fn slot_mut(&mut self, cell: CellId, level: LedgerLevel) -> &mut u16 {
        match level {
            LedgerLevel::Environments => &mut self.env_per_cell[cell.index()],
            LedgerLevel::Materials(env) => {
                let slot = self.mat_slot(cell, env);
                &mut self.mat_per_cell[slot]
            }
        }
    }
}

impl DebugInvariants for ConnectivityLedger {
    fn validate_invariants(&self) -> Result<(), MeshMaterialError> {
        for c in 0..self.nb_cells {
            let present = (0..self.nb_environments)
                .filter(|&e| self.mat_per_cell[e * self.nb_cells + c] > 0)
                .count();
            if present != usize::from(self.env_per_cell[c]) {
                return Err(MeshMaterialError::LedgerMismatch {
                    cell: CellId::new(c as u32),
                    detail: format!(
                        "nb_environments={} but {present} environment(s) hold materials",
                        self.env_per_cell[c]
                    ),
                });
            }
        }
        for e in 0..self.nb_environments {
            let sum: usize = self.mat_per_cell[e * self.nb_cells..(e + 1) * self.nb_cells]
                .iter()
                .map(|&n| usize::from(n))
                .sum();
            if sum != self.total_material_cells[e] {
                return Err(MeshMaterialError::LedgerMismatch {
                    cell: CellId::new(0),
                    detail: format!(
                        "total material cells of env {e} is {} but counters sum to {sum}",
                        self.total_material_cells[e]
                    ),
                });
            }
        }
        Ok(())
    }
}
