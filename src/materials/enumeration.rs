//! Enumeration tree: cell → environments → materials.
//!
//! Nodes live in three dense arrays, one per level, and reference each other
//! by [`NodeRef`] `(level, position)` pairs instead of pointers. Each cell owns
//! a fixed stride in every array:
//!
//! - all-environment node: `cell`
//! - environment nodes: `cell * nb_environments .. + nb_environments`
//! - material nodes: `cell * nb_materials .. + nb_materials`, where the
//!   materials of environment `e` use the sub-range starting at
//!   `e.first_material()`.
//!
//! Children are packed at the start of their range so `first_child` plus
//! `nb_children` describe them. Rebuilding a cell only rewrites its own
//! strides; the arrays are resized by full recomputes only.

use std::fmt;

use crate::data::indexer::ComponentIndexer;
use crate::data::storage_index::StorageIndex;
use crate::materials::registry::{ComponentRegistry, EnvironmentId, MaterialId};
use crate::topology::cell::CellId;

/// Level of a node in the enumeration tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeLevel {
    AllEnvironments,
    Environment,
    Material,
}

/// Arena address of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeRef {
    pub level: NodeLevel,
    pub position: u32,
}

impl NodeRef {
    const fn new(level: NodeLevel, position: usize) -> Self {
        Self {
            level,
            position: position as u32,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]", self.level, self.position)
    }
}

/// One node of the tree.
///
/// `component` is the environment id on the environment level, the material
/// id on the material level and unused on the all-environment level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComponentNode {
    pub cell: CellId,
    pub component: u16,
    pub storage: StorageIndex,
    pub parent: Option<NodeRef>,
    pub first_child: Option<NodeRef>,
    pub nb_children: u16,
}

impl ComponentNode {
    /// Unused slot.
    pub const EMPTY: ComponentNode = ComponentNode {
        cell: CellId::new(0),
        component: 0,
        storage: StorageIndex::pure(CellId::new(0)),
        parent: None,
        first_child: None,
        nb_children: 0,
    };

    fn children(&self) -> impl ExactSizeIterator<Item = usize> + Clone {
        let start = self.first_child.map_or(0, |r| r.position as usize);
        start..start + usize::from(self.nb_children)
    }
}

/// Node storage for every cell of the partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeArena {
    nb_cells: usize,
    nb_environments: usize,
    nb_materials: usize,
    all_env: Vec<ComponentNode>,
    env: Vec<ComponentNode>,
    mat: Vec<ComponentNode>,
}

impl NodeArena {
    /// Arena sized for `nb_cells` cells of `registry`, every cell empty.
    pub fn new(nb_cells: usize, registry: &ComponentRegistry) -> Self {
        let mut arena = Self::default();
        arena.resize(nb_cells, registry);
        arena
    }

    /// Reallocate every array and clear all nodes.
    pub fn resize(&mut self, nb_cells: usize, registry: &ComponentRegistry) {
        self.nb_cells = nb_cells;
        self.nb_environments = registry.nb_environments();
        self.nb_materials = registry.nb_materials();
        self.all_env.clear();
        self.all_env.resize(nb_cells, ComponentNode::EMPTY);
        self.env.clear();
        self.env
            .resize(nb_cells * self.nb_environments, ComponentNode::EMPTY);
        self.mat.clear();
        self.mat.resize(nb_cells * self.nb_materials, ComponentNode::EMPTY);
        for (c, node) in self.all_env.iter_mut().enumerate() {
            node.cell = CellId::new(c as u32);
            node.storage = StorageIndex::pure(node.cell);
        }
    }

    pub fn nb_cells(&self) -> usize {
        self.nb_cells
    }

    /// Rewrite the nodes of `cell` from the indexers' current content.
    ///
    /// An environment is present in the cell when its indexer tracks it, a
    /// material when its own indexer does.
    pub fn rebuild_cell(&mut self, cell: CellId, registry: &ComponentRegistry, indexers: &[ComponentIndexer]) {
        let c = cell.index();
        let all_ref = NodeRef::new(NodeLevel::AllEnvironments, c);
        let env_base = c * self.nb_environments;
        let mat_base = c * self.nb_materials;
        self.env[env_base..env_base + self.nb_environments].fill(ComponentNode::EMPTY);
        self.mat[mat_base..mat_base + self.nb_materials].fill(ComponentNode::EMPTY);

        let mut nb_env = 0usize;
        for env in registry.environments() {
            let Some(env_storage) = indexers[env.indexer().index()].storage_index(cell) else {
                continue;
            };
            let env_pos = env_base + nb_env;
            let env_ref = NodeRef::new(NodeLevel::Environment, env_pos);
            let first = mat_base + env.first_material().index();
            let mut nb_mat = 0usize;
            for material in env.materials() {
                let indexer = &indexers[registry.material(material).indexer().index()];
                let Some(storage) = indexer.storage_index(cell) else {
                    continue;
                };
                self.mat[first + nb_mat] = ComponentNode {
                    cell,
                    component: material.get(),
                    storage,
                    parent: Some(env_ref),
                    first_child: None,
                    nb_children: 0,
                };
                nb_mat += 1;
            }
            self.env[env_pos] = ComponentNode {
                cell,
                component: env.id().get(),
                storage: env_storage,
                parent: Some(all_ref),
                first_child: (nb_mat > 0).then(|| NodeRef::new(NodeLevel::Material, first)),
                nb_children: nb_mat as u16,
            };
            nb_env += 1;
        }
        self.all_env[c] = ComponentNode {
            cell,
            component: 0,
            storage: StorageIndex::pure(cell),
            parent: None,
            first_child: (nb_env > 0).then(|| NodeRef::new(NodeLevel::Environment, env_base)),
            nb_children: nb_env as u16,
        };
    }

    /// Node at `node`, if the position is inside the arena.
    pub fn node(&self, node: NodeRef) -> Option<&ComponentNode> {
        let p = node.position as usize;
        match node.level {
            NodeLevel::AllEnvironments => self.all_env.get(p),
            NodeLevel::Environment => self.env.get(p),
            NodeLevel::Material => self.mat.get(p),
        }
    }

    /// Read view of `cell`.
    pub fn all_env_cell(&self, cell: CellId) -> Option<AllEnvCell<'_>> {
        (cell.index() < self.nb_cells).then_some(AllEnvCell { arena: self, cell })
    }

    /// Read views of every cell, in id order.
    pub fn all_env_cells(&self) -> impl ExactSizeIterator<Item = AllEnvCell<'_>> + '_ {
        (0..self.nb_cells).map(move |c| AllEnvCell {
            arena: self,
            cell: CellId::new(c as u32),
        })
    }

    /// Read views of every cell, in parallel.
    #[cfg(feature = "rayon")]
    pub fn par_all_env_cells(&self) -> impl rayon::iter::IndexedParallelIterator<Item = AllEnvCell<'_>> + '_ {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        (0..self.nb_cells).into_par_iter().map(move |c| AllEnvCell {
            arena: self,
            cell: CellId::new(c as u32),
        })
    }
}

/// All-environment view of one cell.
#[derive(Copy, Clone)]
pub struct AllEnvCell<'a> {
    arena: &'a NodeArena,
    cell: CellId,
}

impl<'a> AllEnvCell<'a> {
    fn node(&self) -> &'a ComponentNode {
        &self.arena.all_env[self.cell.index()]
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    /// Global storage index of the cell.
    pub fn storage_index(&self) -> StorageIndex {
        self.node().storage
    }

    pub fn nb_environments(&self) -> usize {
        usize::from(self.node().nb_children)
    }

    /// Environments present in the cell, in environment id order.
    pub fn environments(self) -> impl ExactSizeIterator<Item = EnvCell<'a>> + 'a {
        let arena = self.arena;
        self.node()
            .children()
            .map(move |position| EnvCell { arena, position })
    }

    /// `k`-th environment of the cell.
    pub fn environment(&self, k: usize) -> Option<EnvCell<'a>> {
        self.environments().nth(k)
    }

    /// Node of `env` in this cell, if present.
    pub fn find_environment(&self, env: EnvironmentId) -> Option<EnvCell<'a>> {
        self.environments().find(|e| e.environment_id() == env)
    }

    /// Total number of materials over every environment of the cell.
    pub fn nb_materials(&self) -> usize {
        self.environments().map(|e| e.nb_materials()).sum()
    }
}

impl fmt::Debug for AllEnvCell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllEnvCell")
            .field("cell", &self.cell)
            .field("environments", &self.environments().collect::<Vec<_>>())
            .finish()
    }
}

/// Environment-in-a-cell view.
#[derive(Copy, Clone)]
pub struct EnvCell<'a> {
    arena: &'a NodeArena,
    position: usize,
}

impl<'a> EnvCell<'a> {
    fn node(&self) -> &'a ComponentNode {
        &self.arena.env[self.position]
    }

    pub fn cell(&self) -> CellId {
        self.node().cell
    }

    pub fn environment_id(&self) -> EnvironmentId {
        EnvironmentId::new(self.node().component)
    }

    /// Where the environment's value for this cell lives.
    pub fn storage_index(&self) -> StorageIndex {
        self.node().storage
    }

    pub fn nb_materials(&self) -> usize {
        usize::from(self.node().nb_children)
    }

    /// Materials of the environment present in the cell, in id order.
    pub fn materials(self) -> impl ExactSizeIterator<Item = MatCell<'a>> + 'a {
        let arena = self.arena;
        self.node()
            .children()
            .map(move |position| MatCell { arena, position })
    }

    /// Owning all-environment view.
    pub fn parent(&self) -> AllEnvCell<'a> {
        AllEnvCell {
            arena: self.arena,
            cell: self.cell(),
        }
    }
}

impl fmt::Debug for EnvCell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCell")
            .field("environment", &self.environment_id())
            .field("storage", &self.storage_index())
            .field("materials", &self.materials().collect::<Vec<_>>())
            .finish()
    }
}

/// Material-in-a-cell view.
#[derive(Copy, Clone)]
pub struct MatCell<'a> {
    arena: &'a NodeArena,
    position: usize,
}

impl<'a> MatCell<'a> {
    fn node(&self) -> &'a ComponentNode {
        &self.arena.mat[self.position]
    }

    pub fn cell(&self) -> CellId {
        self.node().cell
    }

    pub fn material_id(&self) -> MaterialId {
        MaterialId::new(self.node().component)
    }

    /// Where the material's value for this cell lives.
    pub fn storage_index(&self) -> StorageIndex {
        self.node().storage
    }

    /// Owning environment view.
    pub fn parent(&self) -> EnvCell<'a> {
        let position = self
            .node()
            .parent
            .map_or(0, |r| r.position as usize);
        EnvCell {
            arena: self.arena,
            position,
        }
    }
}

impl fmt::Debug for MatCell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatCell({}, {})", self.material_id(), self.storage_index())
    }
}
