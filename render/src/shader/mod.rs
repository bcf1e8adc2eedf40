//! Shader objects.
//!
//! A shader object wraps one compiled program for one
//! `(name, frequency, vertex factory layout)` combination. It is created from
//! a precompiled [`ShaderCacheItem`] and owns exactly one RHI stage handle,
//! the one matching its frequency.
//!
//! Concrete shader types implement [`Shader`] and describe themselves with a
//! `'static` [`ShaderMetaType`]. The meta type is what materials store and
//! what the [`ShaderManager`] looks instances up by.
//!
//! # Example
//!
//! ```ignore
//! let manager = ShaderManager::new();
//! manager.register_type(&BASE_PASS_VERTEX_SHADER_TYPE);
//! manager.load_cache(rhi, &ShaderCache::load(path)?, &vertex_factories);
//!
//! let vs = manager.find_instance(&BASE_PASS_VERTEX_SHADER_TYPE, factory.hash());
//! ```

pub mod builtin;
pub mod cache;
pub mod manager;
pub mod parameters;

use std::fmt;
use std::sync::Arc;

use redlilium_core::hash::INVALID_HASH;
use serde::{Deserialize, Serialize};

use crate::materials::Material;
use crate::rhi::{
    DeviceContextRhi, DomainShaderRhiRef, GeometryShaderRhiRef, HullShaderRhiRef,
    PixelShaderRhiRef, Rhi, ShaderFrequency, ShaderRhiRef, VertexShaderRhiRef,
};
use crate::scene::{MeshBatch, SceneView};
use crate::vertex_factory::{VertexFactory, VertexFactoryType};

pub use builtin::{
    BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE, BasePassPixelShader,
    BasePassVertexShader, SIMPLE_ELEMENT_PIXEL_SHADER_TYPE, SIMPLE_ELEMENT_VERTEX_SHADER_TYPE,
    SimpleElementPixelShader, SimpleElementVertexShader,
};
pub use cache::{ShaderCache, ShaderCacheItem, ShaderParameterAllocation, ShaderParameterMap};
pub use manager::ShaderManager;
pub use parameters::{ShaderParameter, ShaderResourceParameter, set_material_parameters};

/// State shared by every shader object.
#[derive(Debug, Clone)]
pub struct ShaderCore {
    name: String,
    frequency: ShaderFrequency,
    vertex_factory_hash: u32,
    num_instructions: u32,
    stage: Option<ShaderRhiRef>,
    parameter_map: ShaderParameterMap,
}

impl ShaderCore {
    /// Populate a shader from its cache record, creating the stage handle.
    ///
    /// If the device rejects the bytecode the shader keeps its name and
    /// frequency but has no stage handle.
    pub fn init(rhi: &dyn Rhi, item: &ShaderCacheItem) -> Self {
        let code = item.code.as_slice();
        let stage = match item.frequency {
            ShaderFrequency::Vertex => rhi.create_vertex_shader(code),
            ShaderFrequency::Hull => rhi.create_hull_shader(code),
            ShaderFrequency::Domain => rhi.create_domain_shader(code),
            ShaderFrequency::Geometry => rhi.create_geometry_shader(code),
            ShaderFrequency::Pixel => rhi.create_pixel_shader(code),
        };
        if stage.is_none() {
            log::warn!(
                "Shader '{}' ({}): device returned no stage handle for {} bytes of bytecode",
                item.name,
                item.frequency,
                code.len()
            );
        }

        Self {
            name: item.name.clone(),
            frequency: item.frequency,
            vertex_factory_hash: if item.frequency == ShaderFrequency::Vertex {
                item.vertex_factory_hash
            } else {
                INVALID_HASH
            },
            num_instructions: item.num_instructions,
            stage,
            parameter_map: item.parameter_map.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> ShaderFrequency {
        self.frequency
    }

    pub fn vertex_factory_hash(&self) -> u32 {
        self.vertex_factory_hash
    }

    pub fn num_instructions(&self) -> u32 {
        self.num_instructions
    }

    pub fn parameter_map(&self) -> &ShaderParameterMap {
        &self.parameter_map
    }

    /// The stage handle if this shader is of `frequency`.
    pub fn stage(&self, frequency: ShaderFrequency) -> Option<&ShaderRhiRef> {
        if self.frequency == frequency {
            self.stage.as_ref()
        } else {
            None
        }
    }
}

/// A compiled shader usable by drawing policies.
///
/// Shaders are immutable once created and shared between materials, so all
/// parameter uploads take `&self` and write only to the device context.
pub trait Shader: Send + Sync {
    fn core(&self) -> &ShaderCore;

    /// Meta descriptor of the concrete shader type.
    fn meta_type(&self) -> &'static ShaderMetaType;

    /// Upload material-derived constants and textures for the next draw.
    fn set_constant_parameters(
        &self,
        _rhi: &dyn Rhi,
        _context: &DeviceContextRhi,
        _vertex_factory: &VertexFactory,
        _material: &Material,
    ) {
    }

    /// Upload per-element data of one mesh batch element.
    fn set_mesh(
        &self,
        _rhi: &dyn Rhi,
        _context: &DeviceContextRhi,
        _mesh: &MeshBatch,
        _element_index: usize,
        _view: &SceneView,
    ) {
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn frequency(&self) -> ShaderFrequency {
        self.core().frequency()
    }

    /// Layout this shader was compiled against, `INVALID_HASH` for non-vertex stages.
    fn vertex_factory_hash(&self) -> u32 {
        self.core().vertex_factory_hash()
    }

    fn num_instructions(&self) -> u32 {
        self.core().num_instructions()
    }

    fn vertex_shader(&self) -> Option<VertexShaderRhiRef> {
        self.core().stage(ShaderFrequency::Vertex).cloned()
    }

    fn hull_shader(&self) -> Option<HullShaderRhiRef> {
        self.core().stage(ShaderFrequency::Hull).cloned()
    }

    fn domain_shader(&self) -> Option<DomainShaderRhiRef> {
        self.core().stage(ShaderFrequency::Domain).cloned()
    }

    fn geometry_shader(&self) -> Option<GeometryShaderRhiRef> {
        self.core().stage(ShaderFrequency::Geometry).cloned()
    }

    fn pixel_shader(&self) -> Option<PixelShaderRhiRef> {
        self.core().stage(ShaderFrequency::Pixel).cloned()
    }
}

impl fmt::Debug for dyn Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name())
            .field("frequency", &self.frequency())
            .field("vertex_factory_hash", &self.vertex_factory_hash())
            .finish()
    }
}

pub type ShaderRef = Arc<dyn Shader>;

/// Constructor stored in a meta type.
pub type ShaderConstructor = fn(ShaderCore, Option<&'static VertexFactoryType>) -> ShaderRef;

/// Static description of a shader type.
#[derive(Debug)]
pub struct ShaderMetaType {
    pub name: &'static str,
    pub source_file: &'static str,
    pub function_name: &'static str,
    pub frequency: ShaderFrequency,
    pub construct: ShaderConstructor,
}

impl ShaderMetaType {
    /// Build a shader object of this type from an initialized core.
    pub fn create_instance(
        &'static self,
        core: ShaderCore,
        vertex_factory_type: Option<&'static VertexFactoryType>,
    ) -> ShaderRef {
        (self.construct)(core, vertex_factory_type)
    }
}

impl PartialEq for ShaderMetaType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.frequency == other.frequency
    }
}

impl Eq for ShaderMetaType {}

/// Serialized form of a shader reference: name plus layout hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderRefRecord {
    pub name: String,
    pub vertex_factory_hash: u32,
}

impl ShaderRefRecord {
    pub fn from_shader(shader: Option<&ShaderRef>) -> Self {
        match shader {
            Some(shader) => Self {
                name: shader.name().to_string(),
                vertex_factory_hash: shader.vertex_factory_hash(),
            },
            None => Self::null(),
        }
    }

    /// Record written for a null reference.
    pub fn null() -> Self {
        Self {
            name: String::new(),
            vertex_factory_hash: INVALID_HASH,
        }
    }

    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }

    /// Resolve against loaded shader instances.
    pub fn resolve(&self, manager: &ShaderManager) -> Option<ShaderRef> {
        if self.is_null() {
            return None;
        }
        manager.find_by_name(&self.name, self.vertex_factory_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainShader(ShaderCore);

    static PLAIN_TYPE: ShaderMetaType = ShaderMetaType {
        name: "PlainShader",
        source_file: "Plain.hlsl",
        function_name: "Main",
        frequency: ShaderFrequency::Pixel,
        construct: construct_plain,
    };

    fn construct_plain(core: ShaderCore, _: Option<&'static VertexFactoryType>) -> ShaderRef {
        Arc::new(PlainShader(core))
    }

    impl Shader for PlainShader {
        fn core(&self) -> &ShaderCore {
            &self.0
        }

        fn meta_type(&self) -> &'static ShaderMetaType {
            &PLAIN_TYPE
        }
    }

    struct NullRhi;

    impl Rhi for NullRhi {}

    #[test]
    fn init_without_stage_keeps_identity() {
        let item = ShaderCacheItem::new("PlainShader", ShaderFrequency::Pixel, Vec::new())
            .with_num_instructions(12);
        let shader = PLAIN_TYPE.create_instance(ShaderCore::init(&NullRhi, &item), None);
        assert_eq!(shader.name(), "PlainShader");
        assert_eq!(shader.frequency(), ShaderFrequency::Pixel);
        assert_eq!(shader.num_instructions(), 12);
        assert!(shader.pixel_shader().is_none());
        assert!(shader.vertex_shader().is_none());
    }

    #[test]
    fn non_vertex_stages_have_invalid_layout_hash() {
        let item = ShaderCacheItem::new("PlainShader", ShaderFrequency::Pixel, vec![1])
            .with_vertex_factory("StaticMesh", 7);
        let core = ShaderCore::init(&NullRhi, &item);
        assert_eq!(core.vertex_factory_hash(), INVALID_HASH);
    }

    #[test]
    fn null_record() {
        let record = ShaderRefRecord::from_shader(None);
        assert!(record.is_null());
        assert_eq!(record.vertex_factory_hash, INVALID_HASH);
    }
}
