//! Meshes built on the fly for one frame.

use std::sync::Arc;

use redlilium_core::math::Mat4;

use super::{MeshBatch, MeshBatchElement, SceneView};
use crate::drawing_policy::{BasePassDrawingPolicy, draw_batches};
use crate::materials::MaterialRef;
use crate::registry::RenderRegistry;
use crate::rhi::{DeviceContextRhi, PrimitiveType, Rhi};
use crate::vertex_factory::DynamicMeshVertex;

/// Vertices plus triangles, drawn through the dynamic mesh vertex factory.
#[derive(Debug, Clone, Default)]
pub struct DynamicMeshBuilder {
    vertices: Vec<DynamicMeshVertex>,
    indices: Vec<u32>,
}

impl DynamicMeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: DynamicMeshVertex) -> u32 {
        self.vertices.push(vertex);
        self.vertices.len() as u32 - 1
    }

    /// # Panics
    ///
    /// Panics if an index does not name an added vertex.
    pub fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32) {
        let count = self.vertices.len() as u32;
        assert!(
            v0 < count && v1 < count && v2 < count,
            "DynamicMeshBuilder: triangle ({v0}, {v1}, {v2}) references a vertex past {count}"
        );
        self.indices.extend_from_slice(&[v0, v1, v2]);
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Upload and draw with the base pass. Returns `false` if nothing was drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        registry: &RenderRegistry,
        material: &MaterialRef,
        view: &SceneView,
        local_to_world: Mat4,
        depth_bias: f32,
    ) -> bool {
        if self.is_empty() {
            return false;
        }
        redlilium_core::profile_scope!("DynamicMeshBuilder::draw");

        let Some(vertex_buffer) =
            rhi.create_vertex_buffer("DynamicMesh", bytemuck::cast_slice(&self.vertices))
        else {
            return false;
        };
        let Some(index_buffer) =
            rhi.create_index_buffer("DynamicMesh", 4, bytemuck::cast_slice(&self.indices))
        else {
            return false;
        };

        let mut factory = registry
            .dynamic_mesh_factory()
            .as_ref()
            .clone()
            .with_stream(0, vertex_buffer, 0);
        if !factory.init_rhi(rhi) {
            return false;
        }

        let policy = BasePassDrawingPolicy::new(Arc::new(factory), material.clone(), depth_bias);
        let batch = MeshBatch::new(PrimitiveType::TriangleList).with_element(
            MeshBatchElement::new(self.num_triangles() as u32)
                .with_index_buffer(index_buffer, 0)
                .with_transform(local_to_world),
        );
        draw_batches(&policy, rhi, context, &[&batch], view) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangles_reference_added_vertices() {
        let mut builder = DynamicMeshBuilder::new();
        let a = builder.add_vertex(DynamicMeshVertex::new([0.0; 3], [0.0; 2], [1.0; 4]));
        let b = builder.add_vertex(DynamicMeshVertex::new([1.0, 0.0, 0.0], [1.0, 0.0], [1.0; 4]));
        let c = builder.add_vertex(DynamicMeshVertex::new([0.0, 1.0, 0.0], [0.0, 1.0], [1.0; 4]));
        builder.add_triangle(a, b, c);
        assert_eq!(builder.num_vertices(), 3);
        assert_eq!(builder.num_triangles(), 1);
    }

    #[test]
    #[should_panic(expected = "references a vertex")]
    fn out_of_range_triangle_panics() {
        let mut builder = DynamicMeshBuilder::new();
        builder.add_vertex(DynamicMeshVertex::default());
        builder.add_triangle(0, 1, 2);
    }
}
