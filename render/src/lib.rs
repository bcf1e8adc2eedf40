//! # RedLilium Render
//!
//! Render core of the RedLilium engine: a device abstraction plus the
//! machinery that turns scene data into draw calls.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Rhi`] - Graphics device abstraction with dummy and wgpu backends
//! - [`shader`] - Shader objects loaded from a precompiled cache
//! - [`Material`] - Shader selection and parameters, with a lazily rebuilt shader map
//! - [`VertexFactory`] - Vertex layouts and their stable hash
//! - [`drawing_policy`] - Binding state and issuing draws for one material and layout
//! - [`scene`] - Frame inputs and the [`SceneRenderer`]
//! - [`RenderThread`] - Dedicated thread that owns all device calls
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_render::{RenderRegistry, RenderSettings, RenderThread, create_rhi};
//!
//! let settings = RenderSettings::load_or_default(Path::new("render.toml"));
//! let rhi = create_rhi(&settings)?;
//! rhi.init(settings.editor);
//!
//! let registry = Arc::new(RenderRegistry::new());
//! registry.load_shader_cache(rhi.as_ref(), &ShaderCache::load(path)?);
//!
//! let render_thread = RenderThread::spawn(rhi.clone(), registry.clone(), &settings)?;
//! render_thread.submit_frame(FrameSnapshot::new(0, viewport, view))?;
//! let stats = render_thread.shutdown()?;
//! ```

pub mod config;
pub mod drawing_policy;
pub mod error;
pub mod materials;
#[cfg(feature = "editor")]
pub mod overlay;
pub mod registry;
pub mod render_thread;
pub mod rhi;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod vertex_factory;

// Re-export main types for convenience
pub use config::{BackendKind, RenderSettings};
pub use drawing_policy::{
    BasePassDrawingPolicy, DepthOnlyDrawingPolicy, DrawingPolicy, DrawingPolicyCache,
    MeshDrawingPolicy,
};
pub use error::RenderError;
pub use materials::{Material, MaterialRef, MaterialUsage};
pub use registry::{RenderRegistry, RenderRegistryRef};
pub use render_thread::{RenderCommand, RenderStats, RenderThread, RenderThreadContext};
pub use rhi::{Rhi, create_rhi};
pub use scene::{
    FrameSnapshot, MeshBatch, MeshBatchElement, MeshDrawElement, SceneDepthGroupKind,
    SceneDepthGroups, SceneProxy, SceneRenderer, SceneView,
};
pub use shader::{Shader, ShaderCache, ShaderManager, ShaderMetaType, ShaderRef};
pub use texture::{Texture2D, Texture2DRef};
pub use vertex_factory::{VertexFactory, VertexFactoryRegistry, VertexFactoryType};

/// Render library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the render core banner.
pub fn init() {
    log::info!("RedLilium Render v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_registry_has_builtin_types() {
        let registry = RenderRegistry::new();
        assert!(
            registry
                .vertex_factories
                .find_type("StaticMeshVertexFactory")
                .is_some()
        );
        assert!(registry.shaders.find_type("BasePassVertexShader").is_some());
    }
}
