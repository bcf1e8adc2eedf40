//! Opaque base pass.

use super::{DrawingPolicy, MeshDrawingPolicy};
use crate::materials::MaterialRef;
use crate::rhi::{DeviceContextRhi, Rhi};
use crate::scene::{MeshBatch, SceneView};
use crate::vertex_factory::VertexFactoryRef;

/// Draws with the material's vertex and pixel shaders.
#[derive(Debug, Clone)]
pub struct BasePassDrawingPolicy {
    base: MeshDrawingPolicy,
}

impl BasePassDrawingPolicy {
    pub fn new(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        Self {
            base: MeshDrawingPolicy::new(vertex_factory, material, depth_bias),
        }
    }
}

impl DrawingPolicy for BasePassDrawingPolicy {
    fn create(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        Self::new(vertex_factory, material, depth_bias)
    }

    fn base(&self) -> &MeshDrawingPolicy {
        &self.base
    }

    fn draw(&self, rhi: &dyn Rhi, context: &DeviceContextRhi, mesh: &MeshBatch, view: &SceneView) {
        let Some(vertex_shader) = self.base.vertex_shader() else {
            return;
        };
        match self.base.pixel_shader() {
            Some(pixel_shader) => {
                self.base
                    .draw_elements(rhi, context, mesh, view, &[vertex_shader, pixel_shader])
            }
            None => self.base.draw_elements(rhi, context, mesh, view, &[vertex_shader]),
        }
    }
}
