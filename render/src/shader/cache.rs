//! Precompiled shader cache records.
//!
//! The offline compiler writes one [`ShaderCacheItem`] per compiled
//! permutation and packs them into a [`ShaderCache`] archive (bincode). The
//! runtime never compiles shaders; it only loads these records.

use std::collections::BTreeMap;
use std::path::Path;

use redlilium_core::hash::INVALID_HASH;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::rhi::ShaderFrequency;

/// Location of one named parameter inside a stage's constant buffers.
///
/// For texture parameters `base_index` is the texture slot and `size` the
/// number of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderParameterAllocation {
    pub buffer_index: u32,
    pub base_index: u32,
    pub size: u32,
}

/// Parameter name to allocation, as reported by the shader compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderParameterMap {
    allocations: BTreeMap<String, ShaderParameterAllocation>,
}

impl ShaderParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, buffer_index: u32, base_index: u32, size: u32) {
        self.allocations.insert(
            name.into(),
            ShaderParameterAllocation {
                buffer_index,
                base_index,
                size,
            },
        );
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, buffer_index: u32, base_index: u32, size: u32) -> Self {
        self.add(name, buffer_index, base_index, size);
        self
    }

    pub fn find(&self, name: &str) -> Option<ShaderParameterAllocation> {
        self.allocations.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.allocations.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShaderParameterAllocation)> {
        self.allocations
            .iter()
            .map(|(name, allocation)| (name.as_str(), allocation))
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

/// One compiled shader permutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderCacheItem {
    /// Shader type name, matched against registered meta types.
    pub name: String,
    pub frequency: ShaderFrequency,
    /// Vertex factory type the permutation was compiled for, if any.
    pub vertex_factory_type: Option<String>,
    /// Layout hash of that vertex factory, or `INVALID_HASH`.
    pub vertex_factory_hash: u32,
    pub num_instructions: u32,
    /// Stage bytecode, opaque to everything but the RHI.
    pub code: Vec<u8>,
    pub parameter_map: ShaderParameterMap,
}

impl ShaderCacheItem {
    /// A layout-independent record.
    pub fn new(name: impl Into<String>, frequency: ShaderFrequency, code: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            frequency,
            vertex_factory_type: None,
            vertex_factory_hash: INVALID_HASH,
            num_instructions: 0,
            code,
            parameter_map: ShaderParameterMap::new(),
        }
    }

    /// Mark the record as compiled against a vertex factory layout.
    pub fn with_vertex_factory(mut self, type_name: impl Into<String>, hash: u32) -> Self {
        self.vertex_factory_type = Some(type_name.into());
        self.vertex_factory_hash = hash;
        self
    }

    pub fn with_num_instructions(mut self, num_instructions: u32) -> Self {
        self.num_instructions = num_instructions;
        self
    }

    pub fn with_parameter_map(mut self, parameter_map: ShaderParameterMap) -> Self {
        self.parameter_map = parameter_map;
        self
    }
}

const SHADER_CACHE_VERSION: u32 = 1;

/// Archive of compiled shader records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderCache {
    version: u32,
    items: Vec<ShaderCacheItem>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self {
            version: SHADER_CACHE_VERSION,
            items: Vec::new(),
        }
    }

    pub fn add(&mut self, item: ShaderCacheItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[ShaderCacheItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        let cache: Self = bincode::deserialize(bytes)?;
        if cache.version != SHADER_CACHE_VERSION {
            return Err(RenderError::Serialization(format!(
                "shader cache version {} is not supported (expected {})",
                cache.version, SHADER_CACHE_VERSION
            )));
        }
        Ok(cache)
    }

    /// Load a shader cache archive from disk.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path).map_err(|e| {
            RenderError::Serialization(format!("failed to read {}: {e}", path.display()))
        })?;
        let cache = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded shader cache {} ({} items)",
            path.display(),
            cache.len()
        );
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| {
            RenderError::Serialization(format!("failed to write {}: {e}", path.display()))
        })
    }
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ShaderCacheItem> for ShaderCache {
    fn from_iter<I: IntoIterator<Item = ShaderCacheItem>>(iter: I) -> Self {
        Self {
            version: SHADER_CACHE_VERSION,
            items: iter.into_iter().collect(),
        }
    }
}
