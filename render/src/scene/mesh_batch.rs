//! Mesh batches: geometry to submit through a drawing policy.

use redlilium_core::math::Mat4;

use crate::materials::MaterialRef;
use crate::rhi::{BufferRhiRef, PrimitiveType};
use crate::vertex_factory::VertexFactoryRef;

/// One draw call worth of geometry.
#[derive(Debug, Clone)]
pub struct MeshBatchElement {
    /// Indexed draw if set.
    pub index_buffer: Option<BufferRhiRef>,
    pub first_index: u32,
    /// First vertex. Indexed draws take it as a signed offset, so values
    /// above `i32::MAX` only work without an index buffer.
    pub base_vertex_index: u32,
    pub num_primitives: u32,
    pub num_instances: u32,
    pub local_to_world: Mat4,
}

impl MeshBatchElement {
    /// Non-indexed element starting at vertex 0.
    pub fn new(num_primitives: u32) -> Self {
        Self {
            index_buffer: None,
            first_index: 0,
            base_vertex_index: 0,
            num_primitives,
            num_instances: 1,
            local_to_world: Mat4::identity(),
        }
    }

    pub fn with_index_buffer(mut self, index_buffer: BufferRhiRef, first_index: u32) -> Self {
        self.index_buffer = Some(index_buffer);
        self.first_index = first_index;
        self
    }

    pub fn with_base_vertex_index(mut self, base_vertex_index: u32) -> Self {
        self.base_vertex_index = base_vertex_index;
        self
    }

    pub fn with_transform(mut self, local_to_world: Mat4) -> Self {
        self.local_to_world = local_to_world;
        self
    }
}

/// Elements sharing one topology.
#[derive(Debug, Clone)]
pub struct MeshBatch {
    pub primitive_type: PrimitiveType,
    pub elements: Vec<MeshBatchElement>,
}

impl MeshBatch {
    pub fn new(primitive_type: PrimitiveType) -> Self {
        Self {
            primitive_type,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: MeshBatchElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn num_primitives(&self) -> u32 {
        self.elements.iter().map(|element| element.num_primitives).sum()
    }
}

/// A mesh batch together with the layout and material it is drawn with.
#[derive(Debug, Clone)]
pub struct MeshDrawElement {
    pub vertex_factory: VertexFactoryRef,
    pub material: MaterialRef,
    pub batch: MeshBatch,
    pub depth_bias: f32,
}

impl MeshDrawElement {
    pub fn new(vertex_factory: VertexFactoryRef, material: MaterialRef, batch: MeshBatch) -> Self {
        Self {
            vertex_factory,
            material,
            batch,
            depth_bias: 0.0,
        }
    }

    pub fn with_depth_bias(mut self, depth_bias: f32) -> Self {
        self.depth_bias = depth_bias;
        self
    }
}
