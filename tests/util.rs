#![allow(dead_code)]
use std::collections::HashMap;

use mesh_materials::prelude::*;

pub fn cid(u: u32) -> CellId {
    CellId::new(u)
}

pub fn cells(raw: &[u32]) -> Vec<CellId> {
    raw.iter().copied().map(CellId::new).collect()
}

/// Registry from `(environment, [materials])` declarations.
pub fn registry(decl: &[(&str, &[&str])]) -> ComponentRegistry {
    decl.iter()
        .fold(RegistryBuilder::new(), |b, (env, mats)| b.environment(*env, *mats))
        .build()
        .expect("valid registry")
}

/// Engine over `nb_cells` cells, groups loaded, one full recompute done.
pub fn engine_with(
    decl: &[(&str, &[&str])],
    nb_cells: usize,
    groups: &[(&str, &[u32])],
    config: EngineConfig,
) -> CompositionEngine {
    let mut engine = CompositionEngine::new(registry(decl), nb_cells, config);
    engine.load_groups(&provider(groups)).expect("groups load");
    engine.force_recompute(&mut []).expect("initial recompute");
    engine
}

pub fn provider(groups: &[(&str, &[u32])]) -> HashMap<String, Vec<CellId>> {
    groups
        .iter()
        .map(|(name, raw)| (name.to_string(), cells(raw)))
        .collect()
}

pub fn checked() -> EngineConfig {
    EngineConfig::default().with_check_mode(true)
}

/// Check mode with enough partial headroom for any composition of a small mesh.
pub fn roomy() -> EngineConfig {
    checked().with_partial_headroom(1.0, 64)
}

/// One migration request seen by a [`RecordingHook`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Migration {
    ToPartial {
        indexer: IndexerId,
        cells: Vec<CellId>,
        positions: Vec<u32>,
    },
    ToGlobal {
        indexer: IndexerId,
        cells: Vec<CellId>,
        positions: Vec<u32>,
    },
}

/// Hook recording every call it receives.
#[derive(Debug, Default)]
pub struct RecordingHook {
    pub layouts: Vec<StorageLayout>,
    pub migrations: Vec<Migration>,
}

impl RecordingHook {
    pub fn to_partial_cells(&self, indexer: IndexerId) -> Vec<CellId> {
        self.migrations
            .iter()
            .filter_map(|m| match m {
                Migration::ToPartial { indexer: i, cells, .. } if *i == indexer => Some(cells.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn to_global_cells(&self, indexer: IndexerId) -> Vec<CellId> {
        self.migrations
            .iter()
            .filter_map(|m| match m {
                Migration::ToGlobal { indexer: i, cells, .. } if *i == indexer => Some(cells.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl FieldMigrationHook for RecordingHook {
    fn reserve_partial_storage(&mut self, layout: &StorageLayout) {
        self.layouts.push(layout.clone());
    }

    fn copy_global_to_partial(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        positions: &[u32],
    ) -> Result<(), MeshMaterialError> {
        self.migrations.push(Migration::ToPartial {
            indexer,
            cells: cells.to_vec(),
            positions: positions.to_vec(),
        });
        Ok(())
    }

    fn copy_partial_to_global(
        &mut self,
        indexer: IndexerId,
        cells: &[CellId],
        positions: &[u32],
    ) -> Result<(), MeshMaterialError> {
        self.migrations.push(Migration::ToGlobal {
            indexer,
            cells: cells.to_vec(),
            positions: positions.to_vec(),
        });
        Ok(())
    }
}

/// Ledger/indexer agreement over every cell and environment.
pub fn assert_ledger_matches_indexers(engine: &CompositionEngine) {
    let registry = engine.registry();
    for c in 0..engine.nb_cells() {
        let cell = cid(c as u32);
        for env in registry.environments() {
            let tracked = env
                .materials()
                .filter(|&m| engine.component_indexer(ComponentRef::Material(m)).unwrap().contains(cell))
                .count();
            assert_eq!(
                usize::from(engine.ledger().nb_materials(cell, env.id())),
                tracked,
                "cell {cell}, environment {}",
                env.name()
            );
        }
    }
}
