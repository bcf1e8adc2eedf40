//! Vertex declarations.
//!
//! A declaration is the flat list of elements a vertex shader reads. Every
//! element names the stream it comes from, the stride of that stream, its
//! byte offset inside one vertex, its data type, and its usage semantic.
//!
//! ```ignore
//! // position in stream 0, texcoord + color interleaved in stream 1
//! let elements = vec![
//!     VertexElement::new(0, 16, 0, VertexElementType::Float4, VertexElementUsage::Position, 0),
//!     VertexElement::new(1, 12, 0, VertexElementType::Float2, VertexElementUsage::TexCoord, 0),
//!     VertexElement::new(1, 12, 8, VertexElementType::UByte4N, VertexElementUsage::Color, 0),
//! ];
//! let hash = hash_elements(&elements);
//! ```

use std::hash::Hasher;

use redlilium_core::hash::Fnv1aHasher;

/// Maximum number of vertex streams a declaration may reference.
pub const MAX_VERTEX_STREAMS: usize = 8;

/// Data type of one vertex element.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementType {
    Float1 = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    /// Four unsigned bytes.
    UByte4 = 4,
    /// Four unsigned bytes normalized to 0.0-1.0.
    UByte4N = 5,
    UInt1 = 6,
}

impl VertexElementType {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Float1 | Self::UInt1 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::UByte4 | Self::UByte4N => 4,
        }
    }
}

/// Semantic of one vertex element, matched against shader inputs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementUsage {
    Position = 0,
    Normal = 1,
    Tangent = 2,
    Binormal = 3,
    TexCoord = 4,
    Color = 5,
}

impl VertexElementUsage {
    /// Shader input location for `usage_index` of this usage.
    pub fn location(self, usage_index: u8) -> u32 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Tangent => 2,
            Self::Binormal => 3,
            Self::Color => 4,
            Self::TexCoord => 5 + usage_index as u32,
        }
    }
}

/// One element of a vertex declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub stream_index: u8,
    /// Stride in bytes of the stream this element reads from.
    pub stride: u16,
    /// Byte offset within one vertex of the stream.
    pub offset: u16,
    pub element_type: VertexElementType,
    pub usage: VertexElementUsage,
    pub usage_index: u8,
}

impl VertexElement {
    pub const fn new(
        stream_index: u8,
        stride: u16,
        offset: u16,
        element_type: VertexElementType,
        usage: VertexElementUsage,
        usage_index: u8,
    ) -> Self {
        Self {
            stream_index,
            stride,
            offset,
            element_type,
            usage,
            usage_index,
        }
    }

    fn write_hash(&self, hasher: &mut Fnv1aHasher) {
        hasher.write_u32(self.stream_index as u32);
        hasher.write_u32(self.stride as u32);
        hasher.write_u32(self.offset as u32);
        hasher.write_u32(self.element_type as u32);
        hasher.write_u32(self.usage as u32);
        hasher.write_u32(self.usage_index as u32);
    }
}

/// Element list consumed by [`Rhi::create_vertex_declaration`](super::Rhi::create_vertex_declaration).
pub type VertexDeclarationElementList = Vec<VertexElement>;

/// Feed a declaration into a hasher, field by field, little-endian.
pub fn write_elements_hash(elements: &[VertexElement], hasher: &mut Fnv1aHasher) {
    hasher.write_u32(elements.len() as u32);
    for element in elements {
        element.write_hash(hasher);
    }
}

/// Stable hash of a declaration. Identical element lists hash identically on
/// every run and every host.
pub fn hash_elements(elements: &[VertexElement]) -> u32 {
    let mut hasher = Fnv1aHasher::new();
    write_elements_hash(elements, &mut hasher);
    hasher.finish32()
}

/// Check a declaration for internal consistency.
///
/// Returns a description of the first problem found.
pub fn validate_elements(elements: &[VertexElement]) -> Result<(), String> {
    if elements.is_empty() {
        return Err("vertex declaration has no elements".into());
    }
    let mut strides = [None::<u16>; MAX_VERTEX_STREAMS];
    for (i, element) in elements.iter().enumerate() {
        let stream = element.stream_index as usize;
        if stream >= MAX_VERTEX_STREAMS {
            return Err(format!(
                "element {i} uses stream {stream}, limit is {MAX_VERTEX_STREAMS}"
            ));
        }
        let end = element.offset as u32 + element.element_type.size();
        if end > element.stride as u32 {
            return Err(format!(
                "element {i} ends at byte {end}, past stride {}",
                element.stride
            ));
        }
        match strides[stream] {
            Some(stride) if stride != element.stride => {
                return Err(format!(
                    "stream {stream} declared with strides {stride} and {}",
                    element.stride
                ));
            }
            _ => strides[stream] = Some(element.stride),
        }
    }
    Ok(())
}

/// Number of streams a declaration reads from (highest stream index + 1).
pub fn stream_count(elements: &[VertexElement]) -> usize {
    elements
        .iter()
        .map(|element| element.stream_index as usize + 1)
        .max()
        .unwrap_or(0)
}
