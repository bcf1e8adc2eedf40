//! Reuse of drawing policies across frames.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use super::DrawingPolicy;
use crate::materials::MaterialRef;
use crate::vertex_factory::VertexFactoryRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PolicyKey {
    material: usize,
    vertex_factory: usize,
    vertex_factory_hash: u32,
    depth_bias: u32,
}

struct CachedPolicy<P> {
    policy: P,
    /// Shader map rebuild of the material the shaders were resolved under.
    material_rebuild: u64,
}

/// Drawing policies keyed by `(material, vertex factory, depth bias)`.
///
/// Materials and factories are keyed by identity: two factories with the
/// same layout hash may still bind different vertex buffers. A cached
/// policy is rebuilt when its material's shader map changes. Entries keep
/// their material and factory alive until [`collect_garbage`](Self::collect_garbage)
/// drops the ones nothing else references.
pub struct DrawingPolicyCache<P: DrawingPolicy> {
    policies: HashMap<PolicyKey, CachedPolicy<P>>,
    created: u64,
}

impl<P: DrawingPolicy> Default for DrawingPolicyCache<P> {
    fn default() -> Self {
        Self {
            policies: HashMap::new(),
            created: 0,
        }
    }
}

impl<P: DrawingPolicy> std::fmt::Debug for DrawingPolicyCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingPolicyCache")
            .field("policies", &self.policies.len())
            .field("created", &self.created)
            .finish()
    }
}

fn create_policy<P: DrawingPolicy>(
    vertex_factory: &VertexFactoryRef,
    material: &MaterialRef,
    depth_bias: f32,
) -> CachedPolicy<P> {
    log::trace!(
        "DrawingPolicyCache: creating policy for '{}' on {}",
        material.name(),
        vertex_factory.ty().name
    );
    let policy = P::create(vertex_factory.clone(), material.clone(), depth_bias);
    CachedPolicy {
        policy,
        material_rebuild: material.shader_map_rebuild_count(),
    }
}

impl<P: DrawingPolicy> DrawingPolicyCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The policy for the combination, created or refreshed as needed.
    pub fn get_or_create(
        &mut self,
        vertex_factory: &VertexFactoryRef,
        material: &MaterialRef,
        depth_bias: f32,
    ) -> &P {
        let key = PolicyKey {
            material: Arc::as_ptr(material) as usize,
            vertex_factory: Arc::as_ptr(vertex_factory) as usize,
            vertex_factory_hash: vertex_factory.hash(),
            depth_bias: depth_bias.to_bits(),
        };

        match self.policies.entry(key) {
            Entry::Occupied(entry) => {
                let cached = entry.into_mut();
                if material.is_shader_map_dirty()
                    || cached.material_rebuild != material.shader_map_rebuild_count()
                {
                    *cached = create_policy(vertex_factory, material, depth_bias);
                    self.created += 1;
                }
                &cached.policy
            }
            Entry::Vacant(entry) => {
                self.created += 1;
                &entry
                    .insert(create_policy(vertex_factory, material, depth_bias))
                    .policy
            }
        }
    }

    /// Drop policies whose material or vertex factory is referenced only by this cache.
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.policies.len();
        self.policies.retain(|_, cached| {
            let base = cached.policy.base();
            Arc::strong_count(base.material()) > 1 && Arc::strong_count(base.vertex_factory()) > 1
        });
        before - self.policies.len()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Number of policies created since the cache was made.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    pub fn clear(&mut self) {
        self.policies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing_policy::BasePassDrawingPolicy;
    use crate::materials::Material;
    use crate::registry::RenderRegistry;
    use crate::shader::BASE_PASS_VERTEX_SHADER_TYPE;
    use crate::vertex_factory::static_mesh_vertex_factory;

    fn fixture() -> (VertexFactoryRef, MaterialRef) {
        let registry = Arc::new(RenderRegistry::new());
        let vertex_factory = Arc::new(static_mesh_vertex_factory());
        registry.register_vertex_factory(&vertex_factory);
        let material = Arc::new(Material::new("Cached", registry));
        (vertex_factory, material)
    }

    #[test]
    fn same_combination_is_reused() {
        let (vertex_factory, material) = fixture();
        let mut cache = DrawingPolicyCache::<BasePassDrawingPolicy>::new();
        cache.get_or_create(&vertex_factory, &material, 0.0);
        cache.get_or_create(&vertex_factory, &material, 0.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.created_count(), 1);

        cache.get_or_create(&vertex_factory, &material, -0.5);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn shader_change_refreshes_policy() {
        let (vertex_factory, material) = fixture();
        let mut cache = DrawingPolicyCache::<BasePassDrawingPolicy>::new();
        cache.get_or_create(&vertex_factory, &material, 0.0);

        material.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);
        cache.get_or_create(&vertex_factory, &material, 0.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.created_count(), 2);
    }

    #[test]
    fn garbage_collection_drops_orphans() {
        let (vertex_factory, material) = fixture();
        let mut cache = DrawingPolicyCache::<BasePassDrawingPolicy>::new();
        cache.get_or_create(&vertex_factory, &material, 0.0);
        assert_eq!(cache.collect_garbage(), 0);

        drop(material);
        assert_eq!(cache.collect_garbage(), 1);
        assert!(cache.is_empty());
    }
}
