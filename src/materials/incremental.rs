//! Incremental update: apply one modification operation without rebuilding
//! the whole partition.
//!
//! Order of the steps matters, since every pure/partial decision reads the
//! ledger:
//! 1. split the operated cells into those whose environment membership
//!    changes and the others,
//! 2. update the ledger, environment counts first, then material counts,
//! 3. transform every other material on the operated cells,
//! 4. transform every other environment on the changed cells,
//! 5. add or remove the cells from the material's own group and indexer
//!    (and from the environment's when it has several materials),
//! 6. rebuild the tree nodes of the operated and transformed cells.

use itertools::Itertools;

use crate::data::indexer::IndexerId;
use crate::data::ledger::LedgerLevel;
use crate::data::migration::{FieldMigrationHook, migrate};
use crate::materials::engine::CompositionEngine;
use crate::materials::operation::ModificationOperation;
use crate::materials::registry::{EnvironmentId, MaterialId};
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;
use crate::topology::cell_group::CellGroup;

/// What one incremental update did.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModificationSummary {
    /// Operated cells whose environment membership changed.
    pub nb_changed_in_environment: usize,
    /// Operated cells that already had (add) or keep (remove) another
    /// material of the environment.
    pub nb_unchanged_in_environment: usize,
    /// `(indexer, number of cells moved across the pure/partial boundary)`
    /// for every sibling indexer that moved at least one cell.
    pub transformed: Vec<(IndexerId, usize)>,
    /// Number of cells whose tree nodes were rebuilt.
    pub nb_rebuilt_cells: usize,
}

impl ModificationSummary {
    /// Total number of sibling cells moved across the pure/partial boundary.
    pub fn nb_transformed(&self) -> usize {
        self.transformed.iter().map(|&(_, n)| n).sum()
    }
}

/// Ids the update needs about the operated material.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Target {
    pub(crate) material: MaterialId,
    pub(crate) environment: EnvironmentId,
    pub(crate) material_indexer: IndexerId,
    pub(crate) environment_indexer: IndexerId,
    pub(crate) multi_material: bool,
}

impl CompositionEngine {
    /// Apply `op` incrementally.
    ///
    /// Hooks receive a copy request for every sibling cell moved across the
    /// pure/partial boundary. Cell ids are always range-checked; in check
    /// mode the operation's cells must also be distinct and absent (add) or
    /// present (remove), and the coherency checker runs afterwards.
    ///
    /// # Errors
    /// Precondition errors leave the engine untouched. Errors raised while
    /// updating (`CapacityExceeded`, ledger errors, a hook's
    /// `InvalidStorageIndex`, `IncoherentComposition`) poison it.
    pub fn apply(
        &mut self,
        op: &ModificationOperation,
        hooks: &mut [&mut dyn FieldMigrationHook],
    ) -> Result<ModificationSummary, MeshMaterialError> {
        self.ensure_usable()?;
        let target = self.target(op.material())?;
        self.check_range(op.cells())?;
        if self.config.check_mode {
            self.check_preconditions(op, target, &self.groups)?;
            let scan = self
                .checker()
                .check_material_counts(op.cells(), target.environment);
            self.poison_on_err(scan)?;
        }
        let result = self.apply_unchecked(op, target, hooks);
        self.poison_on_err(result)
    }

    pub(crate) fn target(&self, material: MaterialId) -> Result<Target, MeshMaterialError> {
        let mat = self.registry.try_material(material)?;
        let env = self.registry.environment(mat.environment());
        Ok(Target {
            material,
            environment: env.id(),
            material_indexer: mat.indexer(),
            environment_indexer: env.indexer(),
            multi_material: !env.is_mono_material(),
        })
    }

    /// Distinctness and membership checks run in check mode, against
    /// `groups` (the engine's own or a scratch copy of them).
    pub(crate) fn check_preconditions(
        &self,
        op: &ModificationOperation,
        target: Target,
        groups: &[CellGroup],
    ) -> Result<(), MeshMaterialError> {
        op.check_distinct()?;
        let group = &groups[target.material_indexer.index()];
        for &cell in op.cells() {
            match (op.is_add(), group.contains(cell)) {
                (true, true) => {
                    return Err(MeshMaterialError::CellAlreadyPresent {
                        cell,
                        component: group.name().to_owned(),
                    });
                }
                (false, false) => {
                    return Err(MeshMaterialError::CellNotPresent {
                        cell,
                        component: group.name().to_owned(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn apply_unchecked(
        &mut self,
        op: &ModificationOperation,
        target: Target,
        hooks: &mut [&mut dyn FieldMigrationHook],
    ) -> Result<ModificationSummary, MeshMaterialError> {
        let is_add = op.is_add();
        let cells = op.cells();
        let env = target.environment;

        let (changed, unchanged): (Vec<CellId>, Vec<CellId>) = if target.multi_material {
            cells.iter().copied().partition(|&c| {
                let n = self.ledger.nb_materials(c, env);
                if is_add { n == 0 } else { n == 1 }
            })
        } else {
            (cells.to_vec(), Vec::new())
        };
        log::debug!(
            "{op}: environment {env} nb_changed={} nb_unchanged={}",
            changed.len(),
            unchanged.len()
        );

        for &cell in &changed {
            if is_add {
                self.ledger.increment(cell, LedgerLevel::Environments)?;
            } else {
                self.ledger.decrement(cell, LedgerLevel::Environments)?;
            }
        }
        for &cell in cells {
            if is_add {
                self.ledger.increment(cell, LedgerLevel::Materials(env))?;
            } else {
                self.ledger.decrement(cell, LedgerLevel::Materials(env))?;
            }
        }

        let mut summary = ModificationSummary {
            nb_changed_in_environment: changed.len(),
            nb_unchanged_in_environment: unchanged.len(),
            ..ModificationSummary::default()
        };
        let mut moved: Vec<CellId> = Vec::new();

        let siblings: Vec<IndexerId> = self
            .registry
            .materials()
            .iter()
            .filter(|m| m.id() != target.material)
            .map(|m| m.indexer())
            .collect();
        self.transform_siblings(&siblings, cells, is_add, hooks, &mut summary, &mut moved)?;

        if !changed.is_empty() {
            let siblings: Vec<IndexerId> = self
                .registry
                .environments()
                .iter()
                .filter(|e| e.id() != env && !e.is_mono_material())
                .map(|e| e.indexer())
                .collect();
            self.transform_siblings(&siblings, &changed, is_add, hooks, &mut summary, &mut moved)?;
        }

        self.update_own(target.material_indexer, cells, is_add)?;
        if target.environment_indexer != target.material_indexer && !changed.is_empty() {
            self.update_own(target.environment_indexer, &changed, is_add)?;
        }

        let rebuilt: Vec<CellId> = cells.iter().chain(&moved).copied().unique().collect();
        for &cell in &rebuilt {
            self.nodes.rebuild_cell(cell, &self.registry, &self.indexers);
        }
        summary.nb_rebuilt_cells = rebuilt.len();
        log::trace!("{op}: rebuilt nodes of {rebuilt:?}");

        if self.config.check_mode {
            self.check_coherency()?;
        }
        self.timestamp += 1;
        log::debug!(
            "{op}: nb_transformed={} nb_rebuilt={}",
            summary.nb_transformed(),
            summary.nb_rebuilt_cells
        );
        Ok(summary)
    }

    fn transform_siblings(
        &mut self,
        siblings: &[IndexerId],
        candidates: &[CellId],
        is_add: bool,
        hooks: &mut [&mut dyn FieldMigrationHook],
        summary: &mut ModificationSummary,
        moved: &mut Vec<CellId>,
    ) -> Result<(), MeshMaterialError> {
        for &id in siblings {
            let outcome = self.indexers[id.index()].transform(candidates, is_add, &self.ledger)?;
            if outcome.is_empty() {
                continue;
            }
            migrate(hooks, id, &outcome, is_add)?;
            log::debug!(
                "indexer {id} `{}`: {} cell(s) moved to {}",
                self.indexers[id.index()].name(),
                outcome.len(),
                if is_add { "partial" } else { "pure" }
            );
            summary.transformed.push((id, outcome.len()));
            moved.extend_from_slice(&outcome.cells);
        }
        Ok(())
    }

    fn update_own(&mut self, id: IndexerId, cells: &[CellId], is_add: bool) -> Result<(), MeshMaterialError> {
        let group = &mut self.groups[id.index()];
        let indexer = &mut self.indexers[id.index()];
        if is_add {
            group.add_cells(cells)?;
            indexer.extend(cells, &self.ledger)
        } else {
            group.remove_cells(cells)?;
            indexer.shrink(cells)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::data::storage_index::StorageIndex;
    use crate::materials::config::EngineConfig;
    use crate::materials::registry::{ComponentRef, RegistryBuilder};

    fn c(raw: u32) -> CellId {
        CellId::new(raw)
    }

    /// gas{air} metal{steel, copper} over 8 cells.
    fn engine(groups: &[(&str, &[u32])]) -> CompositionEngine {
        let registry = RegistryBuilder::new()
            .environment("gas", &["air"])
            .environment("metal", &["steel", "copper"])
            .build()
            .unwrap();
        let mut engine = CompositionEngine::new(registry, 8, EngineConfig::default().with_check_mode(true));
        let provider: HashMap<String, Vec<CellId>> = groups
            .iter()
            .map(|(name, cells)| (name.to_string(), cells.iter().copied().map(c).collect()))
            .collect();
        engine.load_groups(&provider).unwrap();
        engine.force_recompute(&mut []).unwrap();
        engine
    }

    const AIR: MaterialId = MaterialId::new(0);
    const STEEL: MaterialId = MaterialId::new(1);
    const COPPER: MaterialId = MaterialId::new(2);

    #[test]
    fn adding_a_sibling_material_splits_the_environment() {
        let mut e = engine(&[("steel", &[1, 2]), ("copper", &[2])]);
        let summary = e
            .apply(&ModificationOperation::add(COPPER, vec![c(1), c(5)]), &mut [])
            .unwrap();
        assert_eq!(summary.nb_changed_in_environment, 1);
        assert_eq!(summary.nb_unchanged_in_environment, 1);
        // steel moves to partial in cell 1 only
        assert_eq!(summary.transformed, vec![(IndexerId::new(2), 1)]);
        let steel = e.component_indexer(ComponentRef::Material(STEEL)).unwrap();
        assert!(steel.storage_index(c(1)).unwrap().is_partial());
        let copper = e.component_indexer(ComponentRef::Material(COPPER)).unwrap();
        assert_eq!(copper.storage_index(c(5)), Some(StorageIndex::pure(c(5))));
        assert_eq!(e.ledger().nb_environments(c(5)), 1);
    }

    #[test]
    fn adding_an_environment_transforms_the_other_environment() {
        let mut e = engine(&[("steel", &[3]), ("copper", &[3])]);
        let summary = e
            .apply(&ModificationOperation::add(AIR, vec![c(3)]), &mut [])
            .unwrap();
        assert_eq!(e.ledger().nb_environments(c(3)), 2);
        let metal = e.component_indexer(ComponentRef::Environment(EnvironmentId::new(1))).unwrap();
        assert!(metal.storage_index(c(3)).unwrap().is_partial());
        assert!(summary.transformed.contains(&(IndexerId::new(1), 1)));
        let air = e.component_indexer(ComponentRef::Material(AIR)).unwrap();
        assert!(air.storage_index(c(3)).unwrap().is_partial());
    }

    #[test]
    fn check_mode_rejects_bad_membership_without_poisoning() {
        let mut e = engine(&[("steel", &[1])]);
        let err = e
            .apply(&ModificationOperation::add(STEEL, vec![c(1)]), &mut [])
            .unwrap_err();
        assert!(matches!(err, MeshMaterialError::CellAlreadyPresent { .. }));
        let err = e
            .apply(&ModificationOperation::remove(STEEL, vec![c(4)]), &mut [])
            .unwrap_err();
        assert!(matches!(err, MeshMaterialError::CellNotPresent { .. }));
        let err = e
            .apply(&ModificationOperation::add(STEEL, vec![c(2), c(2)]), &mut [])
            .unwrap_err();
        assert_eq!(err, MeshMaterialError::DuplicateCellInOperation(c(2)));
        let err = e
            .apply(&ModificationOperation::add(STEEL, vec![c(40)]), &mut [])
            .unwrap_err();
        assert!(matches!(err, MeshMaterialError::CellOutOfRange { .. }));
        assert!(!e.is_poisoned());
    }

    #[test]
    fn unknown_material_is_rejected() {
        let mut e = engine(&[]);
        let err = e
            .apply(&ModificationOperation::add(MaterialId::new(7), vec![c(0)]), &mut [])
            .unwrap_err();
        assert!(matches!(err, MeshMaterialError::UnknownMaterial(_)));
    }

    #[test]
    fn failure_while_updating_poisons_the_engine() {
        let registry = RegistryBuilder::new()
            .environment("metal", &["steel", "copper"])
            .build()
            .unwrap();
        let config = EngineConfig::default()
            .with_check_mode(false)
            .with_partial_headroom(0.0, 0);
        let mut e = CompositionEngine::new(registry, 4, config);
        let provider: HashMap<String, Vec<CellId>> =
            HashMap::from([("steel".to_string(), vec![c(0), c(1)])]);
        e.load_groups(&provider).unwrap();
        e.force_recompute(&mut []).unwrap();

        let op = ModificationOperation::add(MaterialId::new(1), vec![c(0)]);
        let err = e.apply(&op, &mut []).unwrap_err();
        assert!(matches!(err, MeshMaterialError::CapacityExceeded { .. }));
        assert!(e.is_poisoned());
        assert_eq!(e.apply(&op, &mut []), Err(MeshMaterialError::Poisoned));
        assert_eq!(e.force_recompute(&mut []), Err(MeshMaterialError::Poisoned));
    }
}
