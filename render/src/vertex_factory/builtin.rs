//! Built-in vertex factory types and their vertex formats.

use bytemuck::{Pod, Zeroable};

use super::parameters::{general_vertex_parameters, no_parameters};
use super::{VertexFactory, VertexFactoryType};
use crate::materials::MaterialUsage;
use crate::rhi::{
    ShaderFrequencyFlags, VertexDeclarationElementList, VertexElement, VertexElementType,
    VertexElementUsage,
};

pub static STATIC_MESH_VERTEX_FACTORY_TYPE: VertexFactoryType = VertexFactoryType {
    name: "StaticMeshVertexFactory",
    shader_file: "StaticMeshVertexFactory.wgsl",
    required_usage: MaterialUsage::STATIC_MESH,
    shader_parameters: general_vertex_parameters,
};

pub static DYNAMIC_MESH_VERTEX_FACTORY_TYPE: VertexFactoryType = VertexFactoryType {
    name: "DynamicMeshVertexFactory",
    shader_file: "LocalVertexFactory.wgsl",
    required_usage: MaterialUsage::empty(),
    shader_parameters: general_vertex_parameters,
};

pub static SIMPLE_ELEMENT_VERTEX_FACTORY_TYPE: VertexFactoryType = VertexFactoryType {
    name: "SimpleElementVertexFactory",
    shader_file: "SimpleElementShader.wgsl",
    required_usage: MaterialUsage::empty(),
    shader_parameters: no_parameters,
};

pub static WORLD_GRID_VERTEX_FACTORY_TYPE: VertexFactoryType = VertexFactoryType {
    name: "WorldGridVertexFactory",
    shader_file: "WorldGridVertexFactory.wgsl",
    required_usage: MaterialUsage::empty(),
    shader_parameters: general_vertex_parameters,
};

pub static BUILTIN_VERTEX_FACTORY_TYPES: [&VertexFactoryType; 4] = [
    &STATIC_MESH_VERTEX_FACTORY_TYPE,
    &DYNAMIC_MESH_VERTEX_FACTORY_TYPE,
    &SIMPLE_ELEMENT_VERTEX_FACTORY_TYPE,
    &WORLD_GRID_VERTEX_FACTORY_TYPE,
];

/// Vertex produced by the dynamic mesh builder.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DynamicMeshVertex {
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 4],
    pub tangent: [f32; 4],
    pub binormal: [f32; 4],
    pub color: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<DynamicMeshVertex>(), 88);

impl DynamicMeshVertex {
    pub fn new(position: [f32; 3], tex_coord: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            tex_coord,
            normal: [0.0, 0.0, 1.0, 0.0],
            tangent: [1.0, 0.0, 0.0, 0.0],
            binormal: [0.0, 1.0, 0.0, 0.0],
            color,
        }
    }

    pub fn elements() -> VertexDeclarationElementList {
        const STRIDE: u16 = std::mem::size_of::<DynamicMeshVertex>() as u16;
        vec![
            VertexElement::new(0, STRIDE, 0, VertexElementType::Float4, VertexElementUsage::Position, 0),
            VertexElement::new(0, STRIDE, 16, VertexElementType::Float2, VertexElementUsage::TexCoord, 0),
            VertexElement::new(0, STRIDE, 24, VertexElementType::Float4, VertexElementUsage::Normal, 0),
            VertexElement::new(0, STRIDE, 40, VertexElementType::Float4, VertexElementUsage::Tangent, 0),
            VertexElement::new(0, STRIDE, 56, VertexElementType::Float4, VertexElementUsage::Binormal, 0),
            VertexElement::new(0, STRIDE, 72, VertexElementType::Float4, VertexElementUsage::Color, 0),
        ]
    }
}

/// Vertex of a batched line.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SimpleElementVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SimpleElementVertex>(), 32);

impl SimpleElementVertex {
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            color,
        }
    }

    pub fn elements() -> VertexDeclarationElementList {
        vec![
            VertexElement::new(0, 32, 0, VertexElementType::Float4, VertexElementUsage::Position, 0),
            VertexElement::new(0, 32, 16, VertexElementType::Float4, VertexElementUsage::Color, 0),
        ]
    }
}

/// Static meshes: positions in stream 0, shading attributes in stream 1.
pub fn static_mesh_elements() -> VertexDeclarationElementList {
    vec![
        VertexElement::new(0, 12, 0, VertexElementType::Float3, VertexElementUsage::Position, 0),
        VertexElement::new(1, 40, 0, VertexElementType::Float2, VertexElementUsage::TexCoord, 0),
        VertexElement::new(1, 40, 8, VertexElementType::Float4, VertexElementUsage::Normal, 0),
        VertexElement::new(1, 40, 24, VertexElementType::Float4, VertexElementUsage::Tangent, 0),
    ]
}

/// World grid: one `Float4` position stream.
pub fn world_grid_elements() -> VertexDeclarationElementList {
    vec![VertexElement::new(
        0,
        16,
        0,
        VertexElementType::Float4,
        VertexElementUsage::Position,
        0,
    )]
}

/// A static mesh factory without streams bound.
pub fn static_mesh_vertex_factory() -> VertexFactory {
    VertexFactory::new(
        &STATIC_MESH_VERTEX_FACTORY_TYPE,
        static_mesh_elements(),
        ShaderFrequencyFlags::VERTEX_PIXEL,
    )
}

pub fn dynamic_mesh_vertex_factory() -> VertexFactory {
    VertexFactory::new(
        &DYNAMIC_MESH_VERTEX_FACTORY_TYPE,
        DynamicMeshVertex::elements(),
        ShaderFrequencyFlags::VERTEX_PIXEL,
    )
}

pub fn simple_element_vertex_factory() -> VertexFactory {
    VertexFactory::new(
        &SIMPLE_ELEMENT_VERTEX_FACTORY_TYPE,
        SimpleElementVertex::elements(),
        ShaderFrequencyFlags::VERTEX_PIXEL,
    )
}

pub fn world_grid_vertex_factory() -> VertexFactory {
    VertexFactory::new(
        &WORLD_GRID_VERTEX_FACTORY_TYPE,
        world_grid_elements(),
        ShaderFrequencyFlags::VERTEX_PIXEL,
    )
}
