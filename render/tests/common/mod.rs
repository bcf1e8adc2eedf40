//! Common fixtures for render core integration tests.
//!
//! Everything runs on the dummy device, which validates calls and records
//! them as [`RhiCommand`]s for inspection.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_core::math::{Mat4, Vec3, look_at_rh, perspective_rh};
use redlilium_render::rhi::{
    BufferRhiRef, DeviceContextRhiRef, DummyRhi, HeadlessWindow, PrimitiveType, Rhi, RhiCommand,
    ShaderFrequency, ViewportRhiRef,
};
use redlilium_render::shader::{
    BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE, SIMPLE_ELEMENT_PIXEL_SHADER_TYPE,
    SIMPLE_ELEMENT_VERTEX_SHADER_TYPE, ShaderCache, ShaderCacheItem, ShaderParameterMap,
};
use redlilium_render::shader::builtin::SIMPLE_ELEMENT_TRANSFORM_PARAMETER;
use redlilium_render::vertex_factory::parameters::{
    LOCAL_TO_WORLD_PARAMETER, VIEW_PROJECTION_PARAMETER,
};
use redlilium_render::vertex_factory::{
    STATIC_MESH_VERTEX_FACTORY_TYPE, VertexFactory, VertexFactoryRef, static_mesh_vertex_factory,
};
use redlilium_render::{
    Material, MaterialRef, MeshBatch, MeshBatchElement, RenderRegistry, SceneView,
};

pub const VIEWPORT_WIDTH: u32 = 640;
pub const VIEWPORT_HEIGHT: u32 = 480;

/// Constant-buffer slot of the material roughness scalar in the pixel stage.
pub const ROUGHNESS_PARAMETER: &str = "Roughness";
/// Texture slot of the material diffuse map in the pixel stage.
pub const DIFFUSE_PARAMETER: &str = "Diffuse";

/// Parameter map of a base pass vertex permutation.
pub fn vertex_parameter_map() -> ShaderParameterMap {
    ShaderParameterMap::new()
        .with(LOCAL_TO_WORLD_PARAMETER, 0, 0, 64)
        .with(VIEW_PROJECTION_PARAMETER, 0, 64, 64)
}

/// Parameter map of the base pass pixel shader.
pub fn pixel_parameter_map() -> ShaderParameterMap {
    ShaderParameterMap::new()
        .with(ROUGHNESS_PARAMETER, 0, 0, 4)
        .with(DIFFUSE_PARAMETER, 0, 3, 1)
}

/// Shader archive with base pass permutations for the static mesh and
/// dynamic mesh layouts, plus the line shaders.
pub fn shader_cache(registry: &RenderRegistry) -> ShaderCache {
    let static_mesh_hash = static_mesh_vertex_factory().hash();
    let dynamic_mesh = registry.dynamic_mesh_factory();
    let simple_element = registry.simple_element_factory();

    [
        ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, b"vs-static".to_vec())
            .with_vertex_factory(STATIC_MESH_VERTEX_FACTORY_TYPE.name, static_mesh_hash)
            .with_parameter_map(vertex_parameter_map()),
        ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, b"vs-dynamic".to_vec())
            .with_vertex_factory(dynamic_mesh.ty().name, dynamic_mesh.hash())
            .with_parameter_map(vertex_parameter_map()),
        ShaderCacheItem::new(BASE_PASS_PIXEL_SHADER_TYPE.name, ShaderFrequency::Pixel, b"ps".to_vec())
            .with_parameter_map(pixel_parameter_map()),
        ShaderCacheItem::new(
            SIMPLE_ELEMENT_VERTEX_SHADER_TYPE.name,
            ShaderFrequency::Vertex,
            b"vs-lines".to_vec(),
        )
        .with_vertex_factory(simple_element.ty().name, simple_element.hash())
        .with_parameter_map(ShaderParameterMap::new().with(SIMPLE_ELEMENT_TRANSFORM_PARAMETER, 0, 0, 64)),
        ShaderCacheItem::new(SIMPLE_ELEMENT_PIXEL_SHADER_TYPE.name, ShaderFrequency::Pixel, b"ps-lines".to_vec()),
    ]
    .into_iter()
    .collect()
}

/// A dummy device with a loaded shader archive and one viewport.
pub struct TestContext {
    pub rhi: Arc<DummyRhi>,
    pub context: DeviceContextRhiRef,
    pub registry: Arc<RenderRegistry>,
    pub viewport: ViewportRhiRef,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let rhi = Arc::new(DummyRhi::new());
        rhi.init(false);
        let context = rhi.immediate_context().expect("dummy device has a context");

        let registry = Arc::new(RenderRegistry::new());
        let loaded = registry.load_shader_cache(rhi.as_ref(), &shader_cache(&registry));
        assert_eq!(loaded, 5);

        let viewport = rhi
            .create_viewport(Arc::new(HeadlessWindow::new(1)), VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .expect("dummy viewport");

        Self {
            rhi,
            context,
            registry,
            viewport,
        }
    }

    pub fn rhi(&self) -> &dyn Rhi {
        self.rhi.as_ref()
    }

    /// A base pass material resolved through this context's registry.
    pub fn material(&self, name: &str) -> MaterialRef {
        let material = Material::new(name, self.registry.clone());
        material.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);
        material.set_shader(&BASE_PASS_PIXEL_SHADER_TYPE);
        Arc::new(material)
    }

    /// A registered static mesh factory with both streams bound.
    pub fn static_mesh_factory(&self) -> VertexFactoryRef {
        let positions = self.vertex_buffer("Positions", 12 * 3);
        let attributes = self.vertex_buffer("Attributes", 40 * 3);
        let mut factory = static_mesh_vertex_factory()
            .with_stream(0, positions, 0)
            .with_stream(1, attributes, 0);
        assert!(factory.init_rhi(self.rhi()));
        let factory = Arc::new(factory);
        self.registry.register_vertex_factory(&factory);
        factory
    }

    pub fn vertex_buffer(&self, name: &str, size: usize) -> BufferRhiRef {
        self.rhi
            .create_vertex_buffer(name, &vec![0u8; size])
            .expect("dummy vertex buffer")
    }

    pub fn index_buffer(&self, name: &str, indices: &[u32]) -> BufferRhiRef {
        self.rhi
            .create_index_buffer(name, 4, bytemuck::cast_slice(indices))
            .expect("dummy index buffer")
    }

    /// Recorded commands since the last call.
    pub fn take_commands(&self) -> Vec<RhiCommand> {
        self.rhi.take_commands()
    }

    pub fn draw_count(&self) -> usize {
        self.rhi.commands().iter().filter(|command| command.is_draw()).count()
    }
}

/// A camera looking at the origin from +Z.
pub fn scene_view() -> SceneView {
    let view = look_at_rh(
        &Vec3::new(0.0, 0.0, 500.0),
        &Vec3::zeros(),
        &Vec3::new(0.0, 1.0, 0.0),
    );
    let projection = perspective_rh(
        std::f32::consts::FRAC_PI_2,
        VIEWPORT_WIDTH as f32 / VIEWPORT_HEIGHT as f32,
        1.0,
        10_000.0,
    );
    SceneView::new(view, projection, VIEWPORT_WIDTH as f32, VIEWPORT_HEIGHT as f32)
}

/// One non-indexed triangle.
pub fn triangle_batch() -> MeshBatch {
    MeshBatch::new(PrimitiveType::TriangleList).with_element(MeshBatchElement::new(1))
}

/// Two indexed triangles moved along X.
pub fn indexed_batch(index_buffer: BufferRhiRef, offset_x: f32) -> MeshBatch {
    let transform = Mat4::new_translation(&Vec3::new(offset_x, 0.0, 0.0));
    MeshBatch::new(PrimitiveType::TriangleList)
        .with_element(MeshBatchElement::new(2).with_index_buffer(index_buffer, 0).with_transform(transform))
}

/// A second factory with the static mesh layout but distinct buffers.
pub fn duplicate_layout(ctx: &TestContext) -> VertexFactory {
    static_mesh_vertex_factory()
        .with_stream(0, ctx.vertex_buffer("OtherPositions", 12), 0)
        .with_stream(1, ctx.vertex_buffer("OtherAttributes", 40), 0)
}
