//! CompositionEngine: owner of the ledger, the indexers, the cell groups and
//! the enumeration tree of one mesh partition.
//!
//! Two update paths keep these consistent:
//! - [`force_recompute`](CompositionEngine::force_recompute) rebuilds
//!   everything from the cell groups and reserves field storage,
//! - [`apply`](CompositionEngine::apply) (see `incremental.rs`) applies one
//!   [`ModificationOperation`](crate::materials::operation::ModificationOperation)
//!   touching only the cells it names.
//!
//! Any error raised once an update has started mutating state poisons the
//! engine: every later update returns [`MeshMaterialError::Poisoned`].

use crate::data::indexer::{ComponentIndexer, IndexerId};
use crate::data::ledger::{ConnectivityLedger, LedgerLevel};
use crate::data::migration::{FieldMigrationHook, StorageLayout};
use crate::debug_invariants::DebugInvariants;
use crate::materials::coherency::CoherencyChecker;
use crate::materials::config::EngineConfig;
use crate::materials::enumeration::{AllEnvCell, NodeArena};
use crate::materials::registry::{ComponentRef, ComponentRegistry};
use crate::mesh_error::MeshMaterialError;
use crate::topology::cell::CellId;
use crate::topology::cell_group::{CellGroup, CellGroupProvider};

/// Composition state of one mesh partition.
#[derive(Clone, Debug)]
pub struct CompositionEngine {
    pub(crate) registry: ComponentRegistry,
    pub(crate) config: EngineConfig,
    pub(crate) nb_cells: usize,
    pub(crate) ledger: ConnectivityLedger,
    /// Indexed by `IndexerId::index()`.
    pub(crate) indexers: Vec<ComponentIndexer>,
    /// Cell group tracked by each indexer, same indexing.
    pub(crate) groups: Vec<CellGroup>,
    pub(crate) nodes: NodeArena,
    pub(crate) layout: StorageLayout,
    pub(crate) timestamp: u64,
    pub(crate) poisoned: bool,
}

impl CompositionEngine {
    /// Engine for `nb_cells` cells with every component empty.
    ///
    /// Cell groups are filled by [`load_groups`](Self::load_groups) and a
    /// [`force_recompute`](Self::force_recompute) must run before the first
    /// incremental update, since it reserves the partial storage.
    pub fn new(registry: ComponentRegistry, nb_cells: usize, config: EngineConfig) -> Self {
        let indexers = registry
            .indexers()
            .iter()
            .map(|info| ComponentIndexer::new(info.id, info.name.clone(), info.rule))
            .collect();
        let groups = registry
            .indexers()
            .iter()
            .map(|info| CellGroup::new(info.name.clone()))
            .collect();
        let ledger = ConnectivityLedger::new(nb_cells, registry.nb_environments());
        let nodes = NodeArena::new(nb_cells, &registry);
        Self {
            registry,
            config,
            nb_cells,
            ledger,
            indexers,
            groups,
            nodes,
            layout: StorageLayout::default(),
            timestamp: 0,
            poisoned: false,
        }
    }

    /// Replace every cell group by the provider's.
    ///
    /// Material groups come from the provider; a multi-material environment's
    /// group is the union of its materials' groups. Nothing changes unless
    /// every group is valid. Indexers and the tree are untouched until the
    /// next full recompute.
    ///
    /// # Errors
    /// `CellOutOfRange`, or `CellAlreadyPresent` if the provider lists a cell
    /// twice for one material.
    pub fn load_groups(&mut self, provider: &dyn CellGroupProvider) -> Result<(), MeshMaterialError> {
        self.ensure_usable()?;
        let mut groups: Vec<CellGroup> = self
            .registry
            .indexers()
            .iter()
            .map(|info| CellGroup::new(info.name.clone()))
            .collect();
        for material in self.registry.materials() {
            let cells = provider.material_cells(material.name());
            self.check_range(&cells)?;
            groups[material.indexer().index()] = CellGroup::from_cells(material.name(), cells)?;
        }
        for env in self.registry.environments() {
            if env.is_mono_material() {
                continue;
            }
            let mut union = CellGroup::new(env.name());
            for material in env.materials() {
                let group = &groups[self.registry.material(material).indexer().index()];
                let missing: Vec<CellId> = group.iter().filter(|&c| !union.contains(c)).collect();
                union.add_cells(&missing)?;
            }
            groups[env.indexer().index()] = union;
        }
        self.groups = groups;
        log::debug!(
            "loaded cell groups: {}",
            self.groups
                .iter()
                .map(|g| format!("{}={}", g.name(), g.len()))
                .collect::<Vec<_>>()
                .join(" ")
        );
        Ok(())
    }

    /// Rebuild ledger, indexers and tree from the cell groups.
    ///
    /// Every hook first receives the new [`StorageLayout`] through
    /// `reserve_partial_storage`; partial values do not survive.
    ///
    /// # Errors
    /// `Poisoned`, ledger or indexer errors, or `IncoherentComposition` in
    /// check mode. Any error poisons the engine.
    pub fn force_recompute(
        &mut self,
        hooks: &mut [&mut dyn FieldMigrationHook],
    ) -> Result<StorageLayout, MeshMaterialError> {
        self.ensure_usable()?;
        let result = self.recompute(hooks);
        self.poison_on_err(result)
    }

    fn recompute(&mut self, hooks: &mut [&mut dyn FieldMigrationHook]) -> Result<StorageLayout, MeshMaterialError> {
        self.ledger.reset();
        for env in self.registry.environments() {
            for cell in self.groups[env.indexer().index()].iter() {
                self.ledger.increment(cell, LedgerLevel::Environments)?;
            }
        }
        for material in self.registry.materials() {
            let level = LedgerLevel::Materials(material.environment());
            for cell in self.groups[material.indexer().index()].iter() {
                self.ledger.increment(cell, level)?;
            }
        }

        let capacities: Vec<(IndexerId, u32)> = self
            .indexers
            .iter()
            .zip(&self.groups)
            .map(|(indexer, group)| {
                let nb_partial = ComponentIndexer::count_partial(group.cells(), indexer.rule(), &self.ledger);
                (indexer.id(), self.config.partial_capacity_for(nb_partial))
            })
            .collect();
        let layout = StorageLayout::new(self.nb_cells, capacities);
        for hook in hooks.iter_mut() {
            hook.reserve_partial_storage(&layout);
        }

        for ((indexer, group), &(_, capacity)) in self
            .indexers
            .iter_mut()
            .zip(&self.groups)
            .zip(layout.partial_capacities())
        {
            indexer.rebuild(group.cells(), &self.ledger, capacity)?;
            indexer.debug_assert_invariants();
        }

        self.nodes.resize(self.nb_cells, &self.registry);
        for c in 0..self.nb_cells {
            self.nodes
                .rebuild_cell(CellId::new(c as u32), &self.registry, &self.indexers);
        }

        log::debug!(
            "full recompute: nb_cell={} nb_env_cell={} total_partial_capacity={}",
            self.nb_cells,
            self.ledger.total_environment_cells(),
            layout.total_partial_capacity()
        );
        if self.config.verbose_level >= 1 {
            self.dump_cells();
        }
        if self.config.check_mode {
            self.check_coherency()?;
        }
        self.layout = layout.clone();
        self.timestamp += 1;
        Ok(layout)
    }

    fn dump_cells(&self) {
        for cell in self.nodes.all_env_cells() {
            if cell.nb_environments() > 0 {
                log::debug!("{cell:?}");
            }
        }
    }

    /// Run the coherency checker over every cell.
    ///
    /// # Errors
    /// `IncoherentComposition` with the first `max_reported_errors` violations.
    pub fn check_coherency(&self) -> Result<(), MeshMaterialError> {
        self.checker().check()
    }

    pub(crate) fn checker(&self) -> CoherencyChecker<'_> {
        CoherencyChecker {
            registry: &self.registry,
            ledger: &self.ledger,
            indexers: &self.indexers,
            groups: &self.groups,
            arena: &self.nodes,
            max_reported: self.config.max_reported_errors,
        }
    }

    pub(crate) fn ensure_usable(&self) -> Result<(), MeshMaterialError> {
        if self.poisoned {
            return Err(MeshMaterialError::Poisoned);
        }
        Ok(())
    }

    pub(crate) fn poison_on_err<T>(&mut self, result: Result<T, MeshMaterialError>) -> Result<T, MeshMaterialError> {
        if let Err(e) = &result {
            log::error!("composition engine poisoned: {e}");
            self.poisoned = true;
        }
        result
    }

    pub(crate) fn check_range(&self, cells: &[CellId]) -> Result<(), MeshMaterialError> {
        match cells.iter().find(|c| c.index() >= self.nb_cells) {
            Some(&cell) => Err(MeshMaterialError::CellOutOfRange {
                cell,
                nb_cells: self.nb_cells,
            }),
            None => Ok(()),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn nb_cells(&self) -> usize {
        self.nb_cells
    }

    pub fn ledger(&self) -> &ConnectivityLedger {
        &self.ledger
    }

    /// Indexer `id`.
    ///
    /// # Errors
    /// `UnknownIndexer` if the registry has no such indexer.
    pub fn indexer(&self, id: IndexerId) -> Result<&ComponentIndexer, MeshMaterialError> {
        self.indexers
            .get(id.index())
            .ok_or(MeshMaterialError::UnknownIndexer(id))
    }

    pub fn indexers(&self) -> &[ComponentIndexer] {
        &self.indexers
    }

    /// Id of the indexer tracking `component`.
    ///
    /// # Errors
    /// `UnknownMaterial` / `UnknownEnvironment` for an id of another registry;
    /// the same holds for the component accessors below.
    pub fn component_id(&self, component: ComponentRef) -> Result<IndexerId, MeshMaterialError> {
        self.registry.indexer_of(component)
    }

    /// Indexer tracking `component`.
    pub fn component_indexer(&self, component: ComponentRef) -> Result<&ComponentIndexer, MeshMaterialError> {
        let id = self.component_id(component)?;
        self.indexer(id)
    }

    /// Cell group of `component`.
    pub fn group(&self, component: ComponentRef) -> Result<&CellGroup, MeshMaterialError> {
        let id = self.component_id(component)?;
        self.groups
            .get(id.index())
            .ok_or(MeshMaterialError::UnknownIndexer(id))
    }

    /// Every cell group, indexed by `IndexerId::index()`.
    pub fn groups(&self) -> &[CellGroup] {
        &self.groups
    }

    /// Cells of `component`, in group order.
    pub fn cells(&self, component: ComponentRef) -> Result<&[CellId], MeshMaterialError> {
        self.group(component).map(CellGroup::cells)
    }

    /// Storage sizes fixed by the last full recompute.
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Incremented by every successful recompute or update.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Enumeration tree.
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Read view of `cell`, or `None` if out of range.
    pub fn all_env_cell(&self, cell: CellId) -> Option<AllEnvCell<'_>> {
        self.nodes.all_env_cell(cell)
    }

    /// Read views of every cell.
    pub fn all_env_cells(&self) -> impl ExactSizeIterator<Item = AllEnvCell<'_>> + '_ {
        self.nodes.all_env_cells()
    }

    /// Read views of every cell, in parallel.
    #[cfg(feature = "rayon")]
    pub fn par_all_env_cells(&self) -> impl rayon::iter::IndexedParallelIterator<Item = AllEnvCell<'_>> + '_ {
        self.nodes.par_all_env_cells()
    }
}

impl DebugInvariants for CompositionEngine {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "CompositionEngine invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshMaterialError> {
        self.ledger.validate_invariants()?;
        for group in &self.groups {
            group.validate_invariants()?;
        }
        for indexer in &self.indexers {
            indexer.validate_invariants()?;
        }
        self.check_coherency()
    }
}
