//! Depth-only prepass.

use super::{DrawingPolicy, MeshDrawingPolicy};
use crate::materials::MaterialRef;
use crate::rhi::{DeviceContextRhi, Rhi};
use crate::scene::{MeshBatch, SceneView};
use crate::vertex_factory::VertexFactoryRef;

/// Draws with the vertex stage only; no pixel shader is bound.
#[derive(Debug, Clone)]
pub struct DepthOnlyDrawingPolicy {
    base: MeshDrawingPolicy,
}

impl DepthOnlyDrawingPolicy {
    pub fn new(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        Self {
            base: MeshDrawingPolicy::vertex_only(vertex_factory, material, depth_bias),
        }
    }
}

impl DrawingPolicy for DepthOnlyDrawingPolicy {
    fn create(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        Self::new(vertex_factory, material, depth_bias)
    }

    fn base(&self) -> &MeshDrawingPolicy {
        &self.base
    }

    fn draw(&self, rhi: &dyn Rhi, context: &DeviceContextRhi, mesh: &MeshBatch, view: &SceneView) {
        if let Some(vertex_shader) = self.base.vertex_shader() {
            self.base.draw_elements(rhi, context, mesh, view, &[vertex_shader]);
        }
    }
}
