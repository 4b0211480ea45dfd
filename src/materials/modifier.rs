//! MaterialModifier: batch of modification operations applied together.
//!
//! ```ignore
//! let mut modifier = engine.modifier();
//! modifier.add_cells(water, &[CellId::new(4)]);
//! modifier.remove_cells(steel, &[CellId::new(4)]);
//! modifier.end_update(&mut hooks)?;
//! ```
//!
//! With `EngineConfig::incremental` the operations are applied one by one
//! through [`CompositionEngine::apply`]. Otherwise the whole batch is applied
//! to a copy of the cell groups, committed if every operation passes, and a
//! single full recompute follows.

use crate::data::migration::{FieldMigrationHook, StorageLayout};
use crate::materials::engine::CompositionEngine;
use crate::materials::incremental::ModificationSummary;
use crate::materials::operation::ModificationOperation;
use crate::materials::registry::MaterialId;
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;
use crate::topology::cell_group::CellGroup;

/// Result of [`MaterialModifier::end_update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModifierOutcome {
    /// One summary per queued operation, in order.
    Incremental(Vec<ModificationSummary>),
    /// Layout produced by the full recompute.
    Recomputed(StorageLayout),
}

/// Queue of operations bound to one engine.
#[derive(Debug)]
pub struct MaterialModifier<'e> {
    engine: &'e mut CompositionEngine,
    pending: Vec<ModificationOperation>,
}

impl CompositionEngine {
    /// Start a batch of modifications.
    pub fn modifier(&mut self) -> MaterialModifier<'_> {
        MaterialModifier {
            engine: self,
            pending: Vec::new(),
        }
    }

    /// Apply `op` to `groups`, a scratch copy of the engine's cell groups;
    /// the caller commits them and recomputes afterwards.
    ///
    /// Cells already in the group (add) or missing from it (remove) are
    /// skipped. A multi-material environment gains the cells it lacked and
    /// loses the cells no other of its materials still holds.
    fn edit_groups(
        &self,
        groups: &mut [CellGroup],
        op: &ModificationOperation,
    ) -> Result<(), MeshMaterialError> {
        let target = self.target(op.material())?;
        self.check_range(op.cells())?;
        if self.config.check_mode {
            self.check_preconditions(op, target, groups)?;
        }
        let op = op.filtered(&groups[target.material_indexer.index()]);
        let env_cells: Vec<CellId> = if !target.multi_material {
            Vec::new()
        } else if op.is_add() {
            let env_group = &groups[target.environment_indexer.index()];
            op.cells()
                .iter()
                .copied()
                .filter(|&c| !env_group.contains(c))
                .collect()
        } else {
            let env = self.registry.environment(target.environment);
            op.cells()
                .iter()
                .copied()
                .filter(|&c| {
                    env.materials()
                        .filter(|&m| m != target.material)
                        .all(|m| !groups[self.registry.material(m).indexer().index()].contains(c))
                })
                .collect()
        };

        if op.is_add() {
            groups[target.material_indexer.index()].add_cells(op.cells())?;
            groups[target.environment_indexer.index()].add_cells(&env_cells)?;
        } else {
            groups[target.material_indexer.index()].remove_cells(op.cells())?;
            groups[target.environment_indexer.index()].remove_cells(&env_cells)?;
        }
        log::trace!("{op}: environment group edit {env_cells:?}");
        Ok(())
    }
}

impl<'e> MaterialModifier<'e> {
    /// Queue the addition of `cells` to `material`.
    pub fn add_cells(&mut self, material: MaterialId, cells: &[CellId]) -> &mut Self {
        self.pending
            .push(ModificationOperation::add(material, cells.to_vec()));
        self
    }

    /// Queue the removal of `cells` from `material`.
    pub fn remove_cells(&mut self, material: MaterialId, cells: &[CellId]) -> &mut Self {
        self.pending
            .push(ModificationOperation::remove(material, cells.to_vec()));
        self
    }

    /// Queue a prepared operation.
    pub fn push(&mut self, op: ModificationOperation) -> &mut Self {
        self.pending.push(op);
        self
    }

    pub fn pending(&self) -> &[ModificationOperation] {
        &self.pending
    }

    /// Apply every queued operation.
    ///
    /// # Errors
    /// The first error of [`CompositionEngine::apply`] or
    /// [`CompositionEngine::force_recompute`]; later operations are dropped.
    /// Without incremental updates every operation is checked before any
    /// group changes, so a rejected batch leaves the engine as it was.
    pub fn end_update(
        mut self,
        hooks: &mut [&mut dyn FieldMigrationHook],
    ) -> Result<ModifierOutcome, MeshMaterialError> {
        let pending = std::mem::take(&mut self.pending);
        log::debug!(
            "end_update: nb_operation={} incremental={}",
            pending.len(),
            self.engine.config.incremental
        );
        if self.engine.config.incremental {
            let mut summaries = Vec::with_capacity(pending.len());
            for op in &pending {
                summaries.push(self.engine.apply(op, hooks)?);
            }
            Ok(ModifierOutcome::Incremental(summaries))
        } else {
            self.engine.ensure_usable()?;
            let mut scratch = self.engine.groups.clone();
            for op in &pending {
                self.engine.edit_groups(&mut scratch, op)?;
            }
            self.engine.groups = scratch;
            self.engine
                .force_recompute(hooks)
                .map(ModifierOutcome::Recomputed)
        }
    }
}

impl Drop for MaterialModifier<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            log::warn!(
                "material modifier dropped with {} operation(s) never applied",
                self.pending.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::materials::config::EngineConfig;
    use crate::materials::registry::{ComponentRef, EnvironmentId, RegistryBuilder};

    fn c(raw: u32) -> CellId {
        CellId::new(raw)
    }

    fn engine(incremental: bool) -> CompositionEngine {
        let registry = RegistryBuilder::new()
            .environment("gas", &["air"])
            .environment("metal", &["steel", "copper"])
            .build()
            .unwrap();
        let config = EngineConfig::default()
            .with_check_mode(true)
            .with_incremental(incremental);
        let mut engine = CompositionEngine::new(registry, 6, config);
        let provider: HashMap<String, Vec<CellId>> = HashMap::from([
            ("steel".to_string(), vec![c(0), c(1)]),
            ("copper".to_string(), vec![c(1)]),
        ]);
        engine.load_groups(&provider).unwrap();
        engine.force_recompute(&mut []).unwrap();
        engine
    }

    fn run_batch(engine: &mut CompositionEngine) -> ModifierOutcome {
        let mut modifier = engine.modifier();
        modifier
            .add_cells(MaterialId::new(0), &[c(1), c(2)])
            .remove_cells(MaterialId::new(2), &[c(1)])
            .add_cells(MaterialId::new(2), &[c(4)]);
        assert_eq!(modifier.pending().len(), 3);
        modifier.end_update(&mut []).unwrap()
    }

    #[test]
    fn incremental_batch_yields_one_summary_per_operation() {
        let mut e = engine(true);
        match run_batch(&mut e) {
            ModifierOutcome::Incremental(summaries) => assert_eq!(summaries.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(e.ledger().nb_environments(c(1)), 2);
    }

    #[test]
    fn both_paths_reach_the_same_composition() {
        let mut inc = engine(true);
        let mut full = engine(false);
        run_batch(&mut inc);
        assert!(matches!(run_batch(&mut full), ModifierOutcome::Recomputed(_)));
        assert_eq!(inc.ledger(), full.ledger());
        let metal = ComponentRef::Environment(EnvironmentId::new(1));
        let mut a = inc.cells(metal).unwrap().to_vec();
        let mut b = full.cells(metal).unwrap().to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(a, vec![c(0), c(1), c(4)]);
    }
}
