//! Component registry: materials, environments and their indexers.
//!
//! The registry is built once, before the engine exists, and never changes
//! afterwards. It assigns dense ids in declaration order:
//! - materials of one environment receive consecutive [`MaterialId`]s,
//! - every multi-material environment owns one [`IndexerId`] and each of its
//!   materials owns another,
//! - a mono-material environment shares the indexer of its sole material.
//!
//! Environments and materials reference their indexer by id; the engine owns
//! the indexers themselves in a flat collection.

use std::fmt;
use std::ops::Range;

use hashbrown::HashMap;

use crate::data::indexer::{IndexerId, TransformRule};
use crate::mesh_error::MeshMaterialError;

macro_rules! component_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(u16);

        impl $name {
            /// Wraps a raw id.
            #[inline]
            pub const fn new(raw: u16) -> Self {
                $name(raw)
            }

            /// Raw id.
            #[inline]
            pub const fn get(self) -> u16 {
                self.0
            }

            /// Position in dense per-component collections.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

component_id!(
    /// Dense material id, unique across all environments.
    MaterialId
);
component_id!(
    /// Dense environment id.
    EnvironmentId
);

static_assertions::assert_eq_size!(MaterialId, u16);
static_assertions::assert_eq_size!(EnvironmentId, u16);

/// Closed handle over the two component kinds the engine manipulates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ComponentRef {
    /// A material.
    Material(MaterialId),
    /// An environment.
    Environment(EnvironmentId),
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRef::Material(m) => write!(f, "material {m}"),
            ComponentRef::Environment(e) => write!(f, "environment {e}"),
        }
    }
}

/// A material and the indexer it owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Material {
    id: MaterialId,
    name: String,
    environment: EnvironmentId,
    indexer: IndexerId,
}

impl Material {
    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning environment.
    pub fn environment(&self) -> EnvironmentId {
        self.environment
    }

    pub fn indexer(&self) -> IndexerId {
        self.indexer
    }
}

/// An environment and its materials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    id: EnvironmentId,
    name: String,
    materials: Range<u16>,
    indexer: IndexerId,
}

impl Environment {
    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexer of the environment (the material's one when mono-material).
    pub fn indexer(&self) -> IndexerId {
        self.indexer
    }

    /// Materials of the environment, in id order.
    pub fn materials(&self) -> impl ExactSizeIterator<Item = MaterialId> + '_ {
        self.materials.clone().map(MaterialId::new)
    }

    /// Id of the first material; the others follow consecutively.
    pub fn first_material(&self) -> MaterialId {
        MaterialId::new(self.materials.start)
    }

    pub fn nb_materials(&self) -> usize {
        self.materials.len()
    }

    /// Whether the environment holds a single material (and shares its indexer).
    pub fn is_mono_material(&self) -> bool {
        self.materials.len() == 1
    }

    /// Rank of `material` inside the environment.
    pub fn local_rank(&self, material: MaterialId) -> Option<usize> {
        self.materials
            .contains(&material.get())
            .then(|| usize::from(material.get() - self.materials.start))
    }
}

/// What a registry knows about one indexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexerInfo {
    pub id: IndexerId,
    /// Name of the owning component.
    pub name: String,
    pub rule: TransformRule,
    /// Component whose cell group the indexer tracks.
    pub owner: ComponentRef,
}

/// Immutable description of all materials and environments.
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    environments: Vec<Environment>,
    materials: Vec<Material>,
    indexers: Vec<IndexerInfo>,
    material_by_name: HashMap<String, MaterialId>,
    environment_by_name: HashMap<String, EnvironmentId>,
}

impl ComponentRegistry {
    /// Start declaring components.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn nb_environments(&self) -> usize {
        self.environments.len()
    }

    pub fn nb_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn nb_indexers(&self) -> usize {
        self.indexers.len()
    }

    /// Environment `id`.
    ///
    /// # Panics
    /// If `id` was not produced by this registry.
    pub fn environment(&self, id: EnvironmentId) -> &Environment {
        &self.environments[id.index()]
    }

    /// Material `id`.
    ///
    /// # Panics
    /// If `id` was not produced by this registry.
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// Checked lookup of an environment id.
    pub fn try_environment(&self, id: EnvironmentId) -> Result<&Environment, MeshMaterialError> {
        self.environments
            .get(id.index())
            .ok_or_else(|| MeshMaterialError::UnknownEnvironment(id.to_string()))
    }

    /// Checked lookup of a material id.
    pub fn try_material(&self, id: MaterialId) -> Result<&Material, MeshMaterialError> {
        self.materials
            .get(id.index())
            .ok_or_else(|| MeshMaterialError::UnknownMaterial(id.to_string()))
    }

    /// Material called `name`.
    pub fn material_by_name(&self, name: &str) -> Result<MaterialId, MeshMaterialError> {
        self.material_by_name
            .get(name)
            .copied()
            .ok_or_else(|| MeshMaterialError::UnknownMaterial(name.to_owned()))
    }

    /// Environment called `name`.
    pub fn environment_by_name(&self, name: &str) -> Option<EnvironmentId> {
        self.environment_by_name.get(name).copied()
    }

    /// Every indexer, in id order.
    pub fn indexers(&self) -> &[IndexerInfo] {
        &self.indexers
    }

    /// Indexer `id`, if it exists.
    pub fn indexer_info(&self, id: IndexerId) -> Option<&IndexerInfo> {
        self.indexers.get(id.index())
    }

    /// Indexer tracking `component`.
    ///
    /// # Errors
    /// `UnknownMaterial` / `UnknownEnvironment` for an id of another registry.
    pub fn indexer_of(&self, component: ComponentRef) -> Result<IndexerId, MeshMaterialError> {
        match component {
            ComponentRef::Material(m) => self.try_material(m).map(|m| m.indexer),
            ComponentRef::Environment(e) => self.try_environment(e).map(|e| e.indexer),
        }
    }

    /// Name of `component`.
    pub fn component_name(&self, component: ComponentRef) -> Result<&str, MeshMaterialError> {
        match component {
            ComponentRef::Material(m) => self.try_material(m).map(Material::name),
            ComponentRef::Environment(e) => self.try_environment(e).map(Environment::name),
        }
    }
}

/// Declares environments and their materials, then assigns ids.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    declared: Vec<(String, Vec<String>)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare environment `name` holding `materials` (in that order).
    pub fn environment<S: AsRef<str>>(mut self, name: impl Into<String>, materials: &[S]) -> Self {
        self.declared.push((
            name.into(),
            materials.iter().map(|m| m.as_ref().to_owned()).collect(),
        ));
        self
    }

    /// Validate the declarations and assign ids.
    ///
    /// # Errors
    /// `EmptyEnvironment`, `DuplicateComponentName` (environment names and
    /// material names are each unique) or `TooManyComponents`.
    pub fn build(self) -> Result<ComponentRegistry, MeshMaterialError> {
        let nb_materials: usize = self.declared.iter().map(|(_, m)| m.len()).sum();
        let nb_indexers: usize = self
            .declared
            .iter()
            .map(|(_, m)| if m.len() == 1 { 1 } else { m.len() + 1 })
            .sum();
        let too_many = [self.declared.len(), nb_materials, nb_indexers]
            .into_iter()
            .max()
            .unwrap_or(0);
        if too_many > usize::from(u16::MAX) {
            return Err(MeshMaterialError::TooManyComponents(too_many));
        }

        let mut registry = ComponentRegistry {
            environments: Vec::with_capacity(self.declared.len()),
            materials: Vec::with_capacity(nb_materials),
            indexers: Vec::with_capacity(nb_indexers),
            material_by_name: HashMap::with_capacity(nb_materials),
            environment_by_name: HashMap::with_capacity(self.declared.len()),
        };

        for (env_name, mat_names) in self.declared {
            if mat_names.is_empty() {
                return Err(MeshMaterialError::EmptyEnvironment(env_name));
            }
            let env_id = EnvironmentId::new(registry.environments.len() as u16);
            if registry
                .environment_by_name
                .insert(env_name.clone(), env_id)
                .is_some()
            {
                return Err(MeshMaterialError::DuplicateComponentName(env_name));
            }
            let mono = mat_names.len() == 1;
            let first = registry.materials.len() as u16;

            let env_indexer = IndexerId::new(registry.indexers.len() as u16);
            if !mono {
                registry.indexers.push(IndexerInfo {
                    id: env_indexer,
                    name: env_name.clone(),
                    rule: TransformRule::Environment,
                    owner: ComponentRef::Environment(env_id),
                });
            }
            for mat_name in mat_names {
                let mat_id = MaterialId::new(registry.materials.len() as u16);
                if registry
                    .material_by_name
                    .insert(mat_name.clone(), mat_id)
                    .is_some()
                {
                    return Err(MeshMaterialError::DuplicateComponentName(mat_name));
                }
                let indexer = IndexerId::new(registry.indexers.len() as u16);
                registry.indexers.push(IndexerInfo {
                    id: indexer,
                    name: mat_name.clone(),
                    rule: TransformRule::Material(env_id),
                    owner: ComponentRef::Material(mat_id),
                });
                registry.materials.push(Material {
                    id: mat_id,
                    name: mat_name,
                    environment: env_id,
                    indexer,
                });
            }
            let last = registry.materials.len() as u16;
            registry.environments.push(Environment {
                id: env_id,
                name: env_name,
                materials: first..last,
                indexer: env_indexer,
            });
        }
        log::debug!(
            "registry built: nb_environment={} nb_material={} nb_indexer={}",
            registry.environments.len(),
            registry.materials.len(),
            registry.indexers.len()
        );
        Ok(registry)
    }
}
