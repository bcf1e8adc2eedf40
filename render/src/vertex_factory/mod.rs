//! Vertex factories.
//!
//! A vertex factory describes where the vertex shader reads its inputs from:
//! the element layout, the streams that feed it, and the shader stages the
//! layout requires. Its [`hash`](VertexFactory::hash) is the key every
//! material uses to cache the shaders compiled for that layout, so two
//! factories with the same layout and the same required stages must hash
//! identically on every run.

pub mod builtin;
pub mod parameters;
pub mod registry;

use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

use redlilium_core::hash::Fnv1aHasher;

use crate::materials::MaterialUsage;
use crate::rhi::{
    BufferRhiRef, DeviceContextRhi, Rhi, ShaderFrequency, ShaderFrequencyFlags,
    VertexDeclarationElementList, VertexDeclarationRhiRef, VertexElement,
    vertex_declaration::{stream_count, validate_elements, write_elements_hash},
};

pub use builtin::{
    DYNAMIC_MESH_VERTEX_FACTORY_TYPE, DynamicMeshVertex, SIMPLE_ELEMENT_VERTEX_FACTORY_TYPE,
    STATIC_MESH_VERTEX_FACTORY_TYPE, SimpleElementVertex, WORLD_GRID_VERTEX_FACTORY_TYPE,
    dynamic_mesh_vertex_factory, simple_element_vertex_factory, static_mesh_vertex_factory,
    world_grid_vertex_factory,
};
pub use parameters::{GeneralVertexShaderParameters, VertexFactoryShaderParameters};
pub use registry::VertexFactoryRegistry;

/// Constructor of the per-stage parameters a vertex factory type contributes.
pub type VertexFactoryParametersConstructor =
    fn(ShaderFrequency) -> Option<Box<dyn VertexFactoryShaderParameters>>;

/// Static description of a vertex factory type.
#[derive(Debug)]
pub struct VertexFactoryType {
    pub name: &'static str,
    pub shader_file: &'static str,
    /// Material usage a material needs before shaders are cached for this type.
    pub required_usage: MaterialUsage,
    pub shader_parameters: VertexFactoryParametersConstructor,
}

impl VertexFactoryType {
    /// Parameters for `frequency`, or `None` if the type adds none there.
    pub fn construct_shader_parameters(
        &self,
        frequency: ShaderFrequency,
    ) -> Option<Box<dyn VertexFactoryShaderParameters>> {
        (self.shader_parameters)(frequency)
    }

    /// Whether a material with `usage` may draw this type.
    pub fn is_compatible(&self, usage: MaterialUsage) -> bool {
        usage.contains(self.required_usage)
    }
}

impl PartialEq for VertexFactoryType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for VertexFactoryType {}

/// An element list together with its stable layout hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDeclaration {
    elements: VertexDeclarationElementList,
    hash: u32,
}

impl VertexDeclaration {
    pub fn new(elements: VertexDeclarationElementList) -> Self {
        let mut hasher = Fnv1aHasher::new();
        write_elements_hash(&elements, &mut hasher);
        Self {
            hash: hasher.finish32(),
            elements,
        }
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn stream_count(&self) -> usize {
        stream_count(&self.elements)
    }
}

/// One vertex buffer bound to a stream slot.
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub buffer: BufferRhiRef,
    pub stride: u32,
    pub offset: u32,
}

/// A vertex layout plus the buffers feeding it.
#[derive(Clone)]
pub struct VertexFactory {
    ty: &'static VertexFactoryType,
    declaration: VertexDeclaration,
    required_frequencies: ShaderFrequencyFlags,
    hash: u32,
    streams: Vec<Option<VertexStream>>,
    declaration_rhi: Option<VertexDeclarationRhiRef>,
}

impl fmt::Debug for VertexFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexFactory")
            .field("type", &self.ty.name)
            .field("hash", &format_args!("{:#010x}", self.hash))
            .field("elements", &self.declaration.elements().len())
            .field("required_frequencies", &self.required_frequencies)
            .field("streams", &self.streams.iter().flatten().count())
            .finish()
    }
}

impl VertexFactory {
    /// # Panics
    ///
    /// Panics if the element list is inconsistent (empty, overlapping the
    /// stride, or using one stream with two strides).
    pub fn new(
        ty: &'static VertexFactoryType,
        elements: VertexDeclarationElementList,
        required_frequencies: ShaderFrequencyFlags,
    ) -> Self {
        if let Err(problem) = validate_elements(&elements) {
            panic!("{}: invalid vertex declaration: {problem}", ty.name);
        }
        let declaration = VertexDeclaration::new(elements);
        let hash = Self::compute_hash(&declaration, required_frequencies);
        let streams = vec![None; declaration.stream_count()];
        Self {
            ty,
            declaration,
            required_frequencies,
            hash,
            streams,
            declaration_rhi: None,
        }
    }

    /// Layout identity: the element list followed by the required stage mask.
    pub fn compute_hash(
        declaration: &VertexDeclaration,
        required_frequencies: ShaderFrequencyFlags,
    ) -> u32 {
        let mut hasher = Fnv1aHasher::new();
        write_elements_hash(declaration.elements(), &mut hasher);
        hasher.write_u32(required_frequencies.bits());
        hasher.finish32()
    }

    /// Bind `buffer` to stream `stream_index`.
    ///
    /// # Panics
    ///
    /// Panics if the declaration does not read from `stream_index`.
    pub fn with_stream(mut self, stream_index: usize, buffer: BufferRhiRef, offset: u32) -> Self {
        self.set_stream(stream_index, buffer, offset);
        self
    }

    pub fn set_stream(&mut self, stream_index: usize, buffer: BufferRhiRef, offset: u32) {
        assert!(
            stream_index < self.streams.len(),
            "{}: stream {stream_index} is not part of the declaration",
            self.ty.name
        );
        let stride = self
            .declaration
            .elements()
            .iter()
            .find(|element| element.stream_index as usize == stream_index)
            .map_or(0, |element| element.stride as u32);
        self.streams[stream_index] = Some(VertexStream {
            buffer,
            stride,
            offset,
        });
    }

    /// Create the device declaration. Returns `false` if the device refused it.
    pub fn init_rhi(&mut self, rhi: &dyn Rhi) -> bool {
        self.declaration_rhi = rhi.create_vertex_declaration(self.declaration.elements());
        if self.declaration_rhi.is_none() {
            log::warn!(
                "{}: device returned no vertex declaration ({} elements)",
                self.ty.name,
                self.declaration.elements().len()
            );
        }
        self.declaration_rhi.is_some()
    }

    pub fn ty(&self) -> &'static VertexFactoryType {
        self.ty
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn declaration(&self) -> &VertexDeclaration {
        &self.declaration
    }

    pub fn elements(&self) -> &[VertexElement] {
        self.declaration.elements()
    }

    pub fn required_frequencies(&self) -> ShaderFrequencyFlags {
        self.required_frequencies
    }

    pub fn requires(&self, frequency: ShaderFrequency) -> bool {
        self.required_frequencies.contains(frequency.flag())
    }

    pub fn streams(&self) -> impl Iterator<Item = (usize, &VertexStream)> {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(index, stream)| stream.as_ref().map(|stream| (index, stream)))
    }

    pub fn declaration_rhi(&self) -> Option<&VertexDeclarationRhiRef> {
        self.declaration_rhi.as_ref()
    }

    /// Bind every stream to the device context.
    pub fn set_streams(&self, rhi: &dyn Rhi, context: &DeviceContextRhi) {
        for (index, stream) in self.streams() {
            rhi.set_stream_source(
                context,
                index as u32,
                &stream.buffer,
                stream.stride,
                stream.offset,
            );
        }
    }
}

pub type VertexFactoryRef = Arc<VertexFactory>;

static_assertions::assert_impl_all!(VertexFactory: Send, Sync);
