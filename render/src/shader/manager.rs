//! Registry of shader types and loaded shader instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use redlilium_core::hash::INVALID_HASH;

use super::cache::ShaderCache;
use super::{ShaderCore, ShaderMetaType, ShaderRef};
use crate::rhi::Rhi;
use crate::vertex_factory::VertexFactoryRegistry;

/// Shader instances keyed by `(type name, vertex factory hash)`.
///
/// Instances compiled without a vertex factory are stored under
/// `INVALID_HASH` and match every layout.
///
/// The generation counter advances whenever the instance set changes, so
/// materials know to rebuild shader maps resolved against an older set.
#[derive(Default)]
pub struct ShaderManager {
    types: RwLock<HashMap<&'static str, &'static ShaderMetaType>>,
    instances: RwLock<HashMap<(String, u32), ShaderRef>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ShaderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderManager")
            .field("types", &self.types.read().len())
            .field("instances", &self.instances.read().len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl ShaderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with every built-in shader type registered.
    pub fn with_builtin_types() -> Self {
        let manager = Self::new();
        for meta_type in super::builtin::BUILTIN_SHADER_TYPES {
            manager.register_type(meta_type);
        }
        manager
    }

    pub fn register_type(&self, meta_type: &'static ShaderMetaType) {
        log::trace!(
            "ShaderManager: registered type {} ({})",
            meta_type.name,
            meta_type.frequency
        );
        self.types.write().insert(meta_type.name, meta_type);
    }

    pub fn find_type(&self, name: &str) -> Option<&'static ShaderMetaType> {
        self.types.read().get(name).copied()
    }

    /// Create shader objects for every record whose type is registered.
    ///
    /// Returns the number of instances loaded. Records of unknown types are
    /// skipped with a warning; records the device rejects still produce an
    /// instance without a stage handle.
    pub fn load_cache(
        &self,
        rhi: &dyn Rhi,
        cache: &ShaderCache,
        vertex_factories: &VertexFactoryRegistry,
    ) -> usize {
        let mut loaded = 0;
        for item in cache.items() {
            let Some(meta_type) = self.find_type(&item.name) else {
                log::warn!("ShaderManager: no registered type for shader '{}'", item.name);
                continue;
            };
            if meta_type.frequency != item.frequency {
                log::warn!(
                    "ShaderManager: shader '{}' cached as {}, type expects {}",
                    item.name,
                    item.frequency,
                    meta_type.frequency
                );
                continue;
            }
            let vertex_factory_type = match item.vertex_factory_type.as_deref() {
                Some(type_name) => {
                    let found = vertex_factories.find_type(type_name);
                    if found.is_none() {
                        log::warn!(
                            "ShaderManager: shader '{}' references unknown vertex factory type '{}'",
                            item.name,
                            type_name
                        );
                    }
                    found
                }
                None => None,
            };
            let shader = meta_type.create_instance(ShaderCore::init(rhi, item), vertex_factory_type);
            self.insert_instance(shader);
            loaded += 1;
        }
        log::info!("ShaderManager: loaded {loaded} of {} cached shaders", cache.len());
        loaded
    }

    /// Add an already constructed instance, replacing any with the same key.
    pub fn insert_instance(&self, shader: ShaderRef) {
        let key = (shader.name().to_string(), shader.vertex_factory_hash());
        self.instances.write().insert(key, shader);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// The instance of `meta_type` compiled for `vertex_factory_hash`, or its
    /// layout-independent instance.
    pub fn find_instance(
        &self,
        meta_type: &ShaderMetaType,
        vertex_factory_hash: u32,
    ) -> Option<ShaderRef> {
        self.find_by_name(meta_type.name, vertex_factory_hash)
    }

    pub fn find_by_name(&self, name: &str, vertex_factory_hash: u32) -> Option<ShaderRef> {
        let instances = self.instances.read();
        instances
            .get(&(name.to_string(), vertex_factory_hash))
            .or_else(|| instances.get(&(name.to_string(), INVALID_HASH)))
            .cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Drop every loaded instance. Registered types are kept.
    pub fn clear_instances(&self) {
        self.instances.write().clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::ShaderFrequency;
    use crate::shader::builtin::{BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE};
    use crate::shader::cache::ShaderCacheItem;

    struct NullRhi;

    impl Rhi for NullRhi {}

    fn cache() -> ShaderCache {
        [
            ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, vec![1])
                .with_vertex_factory("StaticMeshVertexFactory", 11),
            ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, vec![2])
                .with_vertex_factory("StaticMeshVertexFactory", 22),
            ShaderCacheItem::new(BASE_PASS_PIXEL_SHADER_TYPE.name, ShaderFrequency::Pixel, vec![3]),
            ShaderCacheItem::new("UnknownShader", ShaderFrequency::Pixel, vec![4]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn loads_registered_types_only() {
        let manager = ShaderManager::with_builtin_types();
        let loaded = manager.load_cache(&NullRhi, &cache(), &VertexFactoryRegistry::new());
        assert_eq!(loaded, 3);
        assert_eq!(manager.instance_count(), 3);
    }

    #[test]
    fn lookup_prefers_exact_layout() {
        let manager = ShaderManager::with_builtin_types();
        manager.load_cache(&NullRhi, &cache(), &VertexFactoryRegistry::new());

        let vs = manager.find_instance(&BASE_PASS_VERTEX_SHADER_TYPE, 22).unwrap();
        assert_eq!(vs.vertex_factory_hash(), 22);
        assert!(manager.find_instance(&BASE_PASS_VERTEX_SHADER_TYPE, 33).is_none());

        let ps = manager.find_instance(&BASE_PASS_PIXEL_SHADER_TYPE, 33).unwrap();
        assert_eq!(ps.vertex_factory_hash(), INVALID_HASH);
    }

    #[test]
    fn frequency_mismatch_is_skipped() {
        let manager = ShaderManager::with_builtin_types();
        let cache: ShaderCache = [ShaderCacheItem::new(
            BASE_PASS_PIXEL_SHADER_TYPE.name,
            ShaderFrequency::Vertex,
            vec![1],
        )]
        .into_iter()
        .collect();
        assert_eq!(
            manager.load_cache(&NullRhi, &cache, &VertexFactoryRegistry::new()),
            0
        );
        assert_eq!(manager.generation(), 0);
    }

    #[test]
    fn instance_changes_advance_generation() {
        let manager = ShaderManager::with_builtin_types();
        assert_eq!(manager.generation(), 0);

        manager.load_cache(&NullRhi, &cache(), &VertexFactoryRegistry::new());
        let loaded = manager.generation();
        assert!(loaded > 0);

        manager.clear_instances();
        assert!(manager.generation() > loaded);
        assert_eq!(manager.instance_count(), 0);
    }
}
