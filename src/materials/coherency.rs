//! Coherency checker: read-only cross-check of ledger, indexers, cell groups
//! and the enumeration tree.
//!
//! Every mismatch becomes one [`CoherencyViolation`]. The checker keeps the
//! first `max_reported` of them, counts the rest, and turns a non-empty
//! report into one aggregated `IncoherentComposition` error.

use thiserror::Error;

use crate::data::indexer::{ComponentIndexer, IndexerId};
use crate::data::ledger::ConnectivityLedger;
use crate::data::storage_index::StorageIndex;
use crate::materials::enumeration::NodeArena;
use crate::materials::registry::{ComponentRegistry, EnvironmentId, MaterialId};
use crate::mesh_error::{MeshMaterialError, ViolationList};
use crate::topology::cell::CellId;
use crate::topology::cell_group::CellGroup;

/// One disagreement between two views of the composition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoherencyViolation {
    /// Ledger environment count differs from the environments enumerated in the tree.
    #[error("cell {cell}: ledger has {ledger} environment(s), tree has {observed}")]
    EnvironmentCount {
        cell: CellId,
        ledger: u16,
        observed: usize,
    },
    /// Ledger material count of an environment differs from the tree.
    #[error("cell {cell}, environment {environment}: ledger has {ledger} material(s), tree has {observed}")]
    MaterialCount {
        cell: CellId,
        environment: EnvironmentId,
        ledger: u16,
        observed: usize,
    },
    /// Ledger material count differs from the number of material indexers tracking the cell.
    #[error("cell {cell}, environment {environment}: ledger has {ledger} material(s), indexers track {observed}")]
    IndexerMembership {
        cell: CellId,
        environment: EnvironmentId,
        ledger: u16,
        observed: usize,
    },
    /// An indexer and the cell group of its component disagree on a cell.
    #[error("indexer {indexer}: {}", group_mismatch(.cell, .in_group))]
    GroupMismatch {
        indexer: IndexerId,
        cell: CellId,
        in_group: bool,
    },
    /// A cell is stored on the wrong side of the pure/partial boundary.
    #[error("indexer {indexer}: cell {cell} should be {}", storage_kind(.expected_partial))]
    Classification {
        indexer: IndexerId,
        cell: CellId,
        expected_partial: bool,
    },
    /// A tree node's storage index differs from the one its indexer records.
    #[error("cell {cell}, material {material:?} / environment {environment}: node storage {node} but indexer has {indexer:?}")]
    NodeStorage {
        cell: CellId,
        environment: EnvironmentId,
        material: Option<MaterialId>,
        node: StorageIndex,
        indexer: Option<StorageIndex>,
    },
}

fn group_mismatch(cell: &CellId, in_group: &bool) -> String {
    if *in_group {
        format!("cell {cell} is in the cell group but not in the indexer")
    } else {
        format!("cell {cell} is in the indexer but not in the cell group")
    }
}

fn storage_kind(partial: &bool) -> &'static str {
    if *partial { "partial" } else { "pure" }
}

/// Bounded collection of violations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoherencyReport {
    nb_errors: usize,
    max_reported: usize,
    violations: Vec<CoherencyViolation>,
}

impl CoherencyReport {
    pub fn new(max_reported: usize) -> Self {
        Self {
            nb_errors: 0,
            max_reported,
            violations: Vec::new(),
        }
    }

    pub fn push(&mut self, violation: CoherencyViolation) {
        self.nb_errors += 1;
        if self.violations.len() < self.max_reported {
            self.violations.push(violation);
        }
    }

    /// Total number of violations found, reported or not.
    pub fn nb_errors(&self) -> usize {
        self.nb_errors
    }

    pub fn violations(&self) -> &[CoherencyViolation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.nb_errors == 0
    }

    /// `Ok` when nothing was found, the aggregated error otherwise.
    pub fn into_result(self) -> Result<(), MeshMaterialError> {
        if self.is_empty() {
            return Ok(());
        }
        for v in &self.violations {
            log::warn!("coherency: {v}");
        }
        log::warn!(
            "coherency check failed with {} violation(s), {} reported",
            self.nb_errors,
            self.violations.len()
        );
        Err(MeshMaterialError::IncoherentComposition {
            nb_errors: self.nb_errors,
            violations: ViolationList(self.violations),
        })
    }
}

/// Borrowed view of everything the checker compares.
pub struct CoherencyChecker<'a> {
    pub registry: &'a ComponentRegistry,
    pub ledger: &'a ConnectivityLedger,
    pub indexers: &'a [ComponentIndexer],
    pub groups: &'a [CellGroup],
    pub arena: &'a NodeArena,
    pub max_reported: usize,
}

impl CoherencyChecker<'_> {
    /// Run every check over every cell.
    pub fn check(&self) -> Result<(), MeshMaterialError> {
        let mut report = CoherencyReport::new(self.max_reported);
        self.check_tree_counts(&mut report);
        self.check_indexer_membership(&mut report);
        self.check_local_ids(&mut report);
        self.check_classification(&mut report);
        self.check_node_storage(&mut report);
        report.into_result()
    }

    /// Compare the ledger material count of `environment` with the tree for
    /// each of `cells`; run before an incremental update in check mode.
    pub fn check_material_counts(&self, cells: &[CellId], environment: EnvironmentId) -> Result<(), MeshMaterialError> {
        let mut report = CoherencyReport::new(self.max_reported);
        for &cell in cells {
            let ledger = self.ledger.nb_materials(cell, environment);
            let observed = self.observed_materials(cell, environment);
            if usize::from(ledger) != observed {
                report.push(CoherencyViolation::MaterialCount {
                    cell,
                    environment,
                    ledger,
                    observed,
                });
            }
        }
        report.into_result()
    }

    fn observed_materials(&self, cell: CellId, environment: EnvironmentId) -> usize {
        self.arena
            .all_env_cell(cell)
            .and_then(|c| c.find_environment(environment))
            .map_or(0, |e| e.nb_materials())
    }

    fn check_tree_counts(&self, report: &mut CoherencyReport) {
        for all in self.arena.all_env_cells() {
            let cell = all.cell();
            let ledger = self.ledger.nb_environments(cell);
            if usize::from(ledger) != all.nb_environments() {
                report.push(CoherencyViolation::EnvironmentCount {
                    cell,
                    ledger,
                    observed: all.nb_environments(),
                });
            }
            for env in self.registry.environments() {
                let ledger = self.ledger.nb_materials(cell, env.id());
                let observed = all.find_environment(env.id()).map_or(0, |e| e.nb_materials());
                if usize::from(ledger) != observed {
                    report.push(CoherencyViolation::MaterialCount {
                        cell,
                        environment: env.id(),
                        ledger,
                        observed,
                    });
                }
            }
        }
    }

    fn check_indexer_membership(&self, report: &mut CoherencyReport) {
        for c in 0..self.ledger.nb_cells() {
            let cell = CellId::new(c as u32);
            for env in self.registry.environments() {
                let ledger = self.ledger.nb_materials(cell, env.id());
                let observed = env
                    .materials()
                    .filter(|&m| self.indexer(self.registry.material(m).indexer()).contains(cell))
                    .count();
                let env_tracked = self.indexer(env.indexer()).contains(cell);
                if usize::from(ledger) != observed || env_tracked != (ledger > 0) {
                    report.push(CoherencyViolation::IndexerMembership {
                        cell,
                        environment: env.id(),
                        ledger,
                        observed,
                    });
                }
            }
        }
    }

    fn check_local_ids(&self, report: &mut CoherencyReport) {
        for (indexer, group) in self.indexers.iter().zip(self.groups) {
            for cell in indexer.cells().filter(|&c| !group.contains(c)) {
                report.push(CoherencyViolation::GroupMismatch {
                    indexer: indexer.id(),
                    cell,
                    in_group: false,
                });
            }
            for cell in group.iter().filter(|&c| !indexer.contains(c)) {
                report.push(CoherencyViolation::GroupMismatch {
                    indexer: indexer.id(),
                    cell,
                    in_group: true,
                });
            }
        }
    }

    fn check_classification(&self, report: &mut CoherencyReport) {
        for indexer in self.indexers {
            let rule = indexer.rule();
            for entry in indexer.entries() {
                let expected_partial = rule.wants_partial(self.ledger, entry.cell);
                if expected_partial != entry.storage.is_partial() {
                    report.push(CoherencyViolation::Classification {
                        indexer: indexer.id(),
                        cell: entry.cell,
                        expected_partial,
                    });
                }
            }
        }
    }

    fn check_node_storage(&self, report: &mut CoherencyReport) {
        for all in self.arena.all_env_cells() {
            let cell = all.cell();
            for env in all.environments() {
                let environment = env.environment_id();
                let expected = self
                    .indexer(self.registry.environment(environment).indexer())
                    .storage_index(cell);
                if expected != Some(env.storage_index()) {
                    report.push(CoherencyViolation::NodeStorage {
                        cell,
                        environment,
                        material: None,
                        node: env.storage_index(),
                        indexer: expected,
                    });
                }
                for mat in env.materials() {
                    let material = mat.material_id();
                    let expected = self
                        .indexer(self.registry.material(material).indexer())
                        .storage_index(cell);
                    if expected != Some(mat.storage_index()) {
                        report.push(CoherencyViolation::NodeStorage {
                            cell,
                            environment,
                            material: Some(material),
                            node: mat.storage_index(),
                            indexer: expected,
                        });
                    }
                }
            }
        }
    }

    fn indexer(&self, id: IndexerId) -> &ComponentIndexer {
        &self.indexers[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_bounded_but_counts_everything() {
        let mut report = CoherencyReport::new(2);
        for c in 0..5 {
            report.push(CoherencyViolation::EnvironmentCount {
                cell: CellId::new(c),
                ledger: 1,
                observed: 0,
            });
        }
        assert_eq!(report.nb_errors(), 5);
        assert_eq!(report.violations().len(), 2);
        match report.into_result() {
            Err(MeshMaterialError::IncoherentComposition { nb_errors, violations }) => {
                assert_eq!(nb_errors, 5);
                assert_eq!(violations.0.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_report_is_ok() {
        assert_eq!(CoherencyReport::new(3).into_result(), Ok(()));
    }

    #[test]
    fn violations_render_their_context() {
        let v = CoherencyViolation::Classification {
            indexer: IndexerId::new(3),
            cell: CellId::new(8),
            expected_partial: true,
        };
        assert_eq!(v.to_string(), "indexer 3: cell 8 should be partial");
        let g = CoherencyViolation::GroupMismatch {
            indexer: IndexerId::new(0),
            cell: CellId::new(1),
            in_group: false,
        };
        assert_eq!(g.to_string(), "indexer 0: cell 1 is in the indexer but not in the cell group");
    }
}
