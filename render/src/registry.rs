//! Shared lookup tables of the render core.

use std::sync::Arc;

use crate::rhi::Rhi;
use crate::shader::{ShaderCache, ShaderManager};
use crate::vertex_factory::builtin::{dynamic_mesh_vertex_factory, simple_element_vertex_factory};
use crate::vertex_factory::{VertexFactory, VertexFactoryRegistry};

/// Shader instances plus vertex factory types and live layouts.
///
/// Materials hold an `Arc` to the registry they resolve shaders through.
/// The registry keeps one long-lived factory per transient layout (dynamic
/// meshes and line batches) so those layouts stay enumerable between the
/// frames that actually draw them.
#[derive(Debug)]
pub struct RenderRegistry {
    pub shaders: ShaderManager,
    pub vertex_factories: VertexFactoryRegistry,
    dynamic_mesh_factory: Arc<VertexFactory>,
    simple_element_factory: Arc<VertexFactory>,
}

impl RenderRegistry {
    /// A registry with every built-in shader and vertex factory type.
    pub fn new() -> Self {
        let vertex_factories = VertexFactoryRegistry::with_builtin_types();
        let dynamic_mesh_factory = Arc::new(dynamic_mesh_vertex_factory());
        let simple_element_factory = Arc::new(simple_element_vertex_factory());
        vertex_factories.register(&dynamic_mesh_factory);
        vertex_factories.register(&simple_element_factory);
        Self {
            shaders: ShaderManager::with_builtin_types(),
            vertex_factories,
            dynamic_mesh_factory,
            simple_element_factory,
        }
    }

    /// Create shader instances for every record of `cache`.
    pub fn load_shader_cache(&self, rhi: &dyn Rhi, cache: &ShaderCache) -> usize {
        self.shaders.load_cache(rhi, cache, &self.vertex_factories)
    }

    /// Start tracking a factory so materials cache shaders for its layout.
    pub fn register_vertex_factory(&self, factory: &Arc<VertexFactory>) {
        self.vertex_factories.register(factory);
    }

    /// Vertex factory and shader instance generations.
    ///
    /// A shader map resolved under a different pair may be stale.
    pub fn generation(&self) -> (u64, u64) {
        (self.vertex_factories.generation(), self.shaders.generation())
    }

    /// Layout used by the dynamic mesh builder, without streams bound.
    pub fn dynamic_mesh_factory(&self) -> &Arc<VertexFactory> {
        &self.dynamic_mesh_factory
    }

    /// Layout used by line batches, without streams bound.
    pub fn simple_element_factory(&self) -> &Arc<VertexFactory> {
        &self.simple_element_factory
    }
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type RenderRegistryRef = Arc<RenderRegistry>;

static_assertions::assert_impl_all!(RenderRegistry: Send, Sync);
