//! Batched lines.

use redlilium_core::color::Color;
use redlilium_core::math::Vec3;

use super::{MeshBatch, MeshBatchElement, SceneView};
use crate::registry::RenderRegistry;
use crate::rhi::{
    BoundShaderState, CullMode, DeviceContextRhi, FillMode, PrimitiveType, RasterizerState, Rhi,
};
use crate::shader::{SIMPLE_ELEMENT_PIXEL_SHADER_TYPE, SIMPLE_ELEMENT_VERTEX_SHADER_TYPE};
use crate::vertex_factory::SimpleElementVertex;

/// Lines collected during a frame and drawn with one call.
#[derive(Debug, Clone, Default)]
pub struct SimpleElements {
    vertices: Vec<SimpleElementVertex>,
}

impl SimpleElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, start: &Vec3, end: &Vec3, color: Color) {
        let color = color.to_array();
        self.vertices
            .push(SimpleElementVertex::new([start.x, start.y, start.z], color));
        self.vertices
            .push(SimpleElementVertex::new([end.x, end.y, end.z], color));
    }

    pub fn num_lines(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[SimpleElementVertex] {
        &self.vertices
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Draw every line in world space. Returns the number of lines submitted.
    pub fn draw(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        registry: &RenderRegistry,
        view: &SceneView,
    ) -> usize {
        if self.is_empty() {
            return 0;
        }
        redlilium_core::profile_scope!("SimpleElements::draw");

        let layout = registry.simple_element_factory();
        let shaders = registry
            .shaders
            .find_instance(&SIMPLE_ELEMENT_VERTEX_SHADER_TYPE, layout.hash())
            .zip(
                registry
                    .shaders
                    .find_instance(&SIMPLE_ELEMENT_PIXEL_SHADER_TYPE, layout.hash()),
            );
        let Some((vertex_shader, pixel_shader)) = shaders else {
            log::warn!("SimpleElements: line shaders are not loaded");
            return 0;
        };
        let (Some(vs_rhi), Some(ps_rhi)) = (vertex_shader.vertex_shader(), pixel_shader.pixel_shader())
        else {
            return 0;
        };

        let Some(buffer) =
            rhi.create_vertex_buffer("SimpleElements", bytemuck::cast_slice(&self.vertices))
        else {
            return 0;
        };
        let mut factory = layout.as_ref().clone().with_stream(0, buffer, 0);
        if !factory.init_rhi(rhi) {
            return 0;
        }
        let Some(declaration) = factory.declaration_rhi().cloned() else {
            return 0;
        };

        let num_lines = self.num_lines();
        let batch = MeshBatch::new(PrimitiveType::LineList)
            .with_element(MeshBatchElement::new(num_lines as u32));

        rhi.set_bound_shader_state(
            context,
            &BoundShaderState::new(declaration, vs_rhi).with_pixel_shader(Some(ps_rhi)),
        );
        rhi.set_rasterizer_state(context, &RasterizerState::new(FillMode::Solid, CullMode::None));
        factory.set_streams(rhi, context);
        vertex_shader.set_mesh(rhi, context, &batch, 0, view);
        pixel_shader.set_mesh(rhi, context, &batch, 0, view);
        rhi.draw_primitive(context, PrimitiveType::LineList, 0, num_lines as u32, 1);
        num_lines
    }
}
