//! Registry of vertex factory types and live factories.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{VertexFactory, VertexFactoryType};
use crate::materials::MaterialUsage;

/// Known vertex factory types plus the factories currently alive.
///
/// Factories are tracked weakly; dropping the last strong reference removes
/// a factory from enumeration. The generation counter advances whenever a
/// layout hash becomes live, which is what tells materials their cached
/// shader maps may be missing an entry.
#[derive(Default)]
pub struct VertexFactoryRegistry {
    types: RwLock<HashMap<&'static str, &'static VertexFactoryType>>,
    live: Mutex<Vec<Weak<VertexFactory>>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for VertexFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexFactoryRegistry")
            .field("types", &self.types.read().len())
            .field("live", &self.live_count())
            .field("generation", &self.generation())
            .finish()
    }
}

impl VertexFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        for ty in super::builtin::BUILTIN_VERTEX_FACTORY_TYPES {
            registry.register_type(ty);
        }
        registry
    }

    pub fn register_type(&self, ty: &'static VertexFactoryType) {
        log::trace!("VertexFactoryRegistry: registered type {}", ty.name);
        self.types.write().insert(ty.name, ty);
    }

    pub fn find_type(&self, name: &str) -> Option<&'static VertexFactoryType> {
        self.types.read().get(name).copied()
    }

    /// Start tracking `factory`.
    ///
    /// The generation advances when no live factory had this layout hash,
    /// including a layout that was dropped and is now registered again.
    pub fn register(&self, factory: &Arc<VertexFactory>) {
        let hash = factory.hash();
        let is_new_live_layout = {
            let mut live = self.live.lock();
            live.retain(|weak| weak.strong_count() > 0);
            let is_live = live
                .iter()
                .filter_map(Weak::upgrade)
                .any(|other| other.hash() == hash);
            live.push(Arc::downgrade(factory));
            !is_live
        };
        if is_new_live_layout {
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            log::debug!(
                "VertexFactoryRegistry: layout {:#010x} ({}) is live, generation {}",
                hash,
                factory.ty().name,
                generation
            );
        }
    }

    /// Distinct hashes of live factories a material with `usage` may draw, sorted.
    pub fn live_hashes(&self, usage: MaterialUsage) -> Vec<u32> {
        let mut live = self.live.lock();
        live.retain(|weak| weak.strong_count() > 0);
        let hashes: BTreeSet<u32> = live
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|factory| factory.ty().is_compatible(usage))
            .map(|factory| factory.hash())
            .collect();
        hashes.into_iter().collect()
    }

    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex_factory::builtin::{
        dynamic_mesh_vertex_factory, static_mesh_vertex_factory, world_grid_vertex_factory,
    };

    #[test]
    fn builtin_types_are_registered() {
        let registry = VertexFactoryRegistry::with_builtin_types();
        assert!(registry.find_type("StaticMeshVertexFactory").is_some());
        assert!(registry.find_type("WorldGridVertexFactory").is_some());
        assert!(registry.find_type("Missing").is_none());
        assert!(VertexFactoryRegistry::new().find_type("StaticMeshVertexFactory").is_none());
    }

    #[test]
    fn dropped_factories_leave_enumeration() {
        let registry = VertexFactoryRegistry::new();
        let grid = Arc::new(world_grid_vertex_factory());
        registry.register(&grid);
        assert_eq!(registry.live_hashes(MaterialUsage::empty()), vec![grid.hash()]);

        drop(grid);
        assert!(registry.live_hashes(MaterialUsage::empty()).is_empty());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn enumeration_filters_by_usage() {
        let registry = VertexFactoryRegistry::new();
        let static_mesh = Arc::new(static_mesh_vertex_factory());
        let dynamic_mesh = Arc::new(dynamic_mesh_vertex_factory());
        registry.register(&static_mesh);
        registry.register(&dynamic_mesh);

        assert_eq!(
            registry.live_hashes(MaterialUsage::empty()),
            vec![dynamic_mesh.hash()]
        );
        assert_eq!(registry.live_hashes(MaterialUsage::STATIC_MESH).len(), 2);
    }

    #[test]
    fn generation_advances_on_new_layouts_only() {
        let registry = VertexFactoryRegistry::new();
        assert_eq!(registry.generation(), 0);

        let a = Arc::new(world_grid_vertex_factory());
        let b = Arc::new(world_grid_vertex_factory());
        registry.register(&a);
        registry.register(&b);
        assert_eq!(registry.generation(), 1);
        assert_eq!(registry.live_hashes(MaterialUsage::ALL_MESHES).len(), 1);

        registry.register(&Arc::new(dynamic_mesh_vertex_factory()));
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn generation_advances_when_dropped_layout_returns() {
        let registry = VertexFactoryRegistry::new();
        let grid = Arc::new(world_grid_vertex_factory());
        registry.register(&grid);
        assert_eq!(registry.generation(), 1);

        drop(grid);
        let reloaded = Arc::new(world_grid_vertex_factory());
        registry.register(&reloaded);
        assert_eq!(registry.generation(), 2);
        assert_eq!(registry.live_hashes(MaterialUsage::empty()), vec![reloaded.hash()]);
    }
}
