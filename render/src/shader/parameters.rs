//! Shader parameter bindings.
//!
//! A parameter is bound once, by name, against the parameter map of a
//! compiled shader. Names the compiler optimized away stay unbound and every
//! upload through them is skipped.

use bytemuck::Pod;

use super::cache::ShaderParameterMap;
use crate::materials::Material;
use crate::rhi::{DeviceContextRhi, Rhi, ShaderFrequency, TextureRhiRef};

/// A constant-buffer range of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderParameter {
    buffer_index: u32,
    base_index: u32,
    num_bytes: u32,
}

impl ShaderParameter {
    /// Bind `name` from `map`; unbound if the map does not contain it.
    pub fn bind(map: &ShaderParameterMap, name: &str) -> Self {
        map.find(name).map_or_else(Self::default, |allocation| Self {
            buffer_index: allocation.buffer_index,
            base_index: allocation.base_index,
            num_bytes: allocation.size,
        })
    }

    pub fn is_bound(&self) -> bool {
        self.num_bytes > 0
    }

    pub fn buffer_index(&self) -> u32 {
        self.buffer_index
    }

    pub fn base_index(&self) -> u32 {
        self.base_index
    }

    pub fn num_bytes(&self) -> u32 {
        self.num_bytes
    }

    /// Upload `value`, clipped to the bound size.
    pub fn set<T: Pod>(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        value: &T,
    ) {
        self.set_bytes(rhi, context, frequency, bytemuck::bytes_of(value));
    }

    pub fn set_bytes(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        bytes: &[u8],
    ) {
        if !self.is_bound() {
            return;
        }
        let len = bytes.len().min(self.num_bytes as usize);
        rhi.set_shader_parameter(
            context,
            frequency,
            self.buffer_index,
            self.base_index,
            &bytes[..len],
        );
    }
}

/// A texture slot of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderResourceParameter {
    base_index: u32,
    num_resources: u32,
}

impl ShaderResourceParameter {
    pub fn bind(map: &ShaderParameterMap, name: &str) -> Self {
        map.find(name).map_or_else(Self::default, |allocation| Self {
            base_index: allocation.base_index,
            num_resources: allocation.size.max(1),
        })
    }

    pub fn is_bound(&self) -> bool {
        self.num_resources > 0
    }

    pub fn base_index(&self) -> u32 {
        self.base_index
    }

    pub fn set_texture(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        texture: &TextureRhiRef,
    ) {
        if self.is_bound() {
            rhi.set_texture_parameter(context, frequency, self.base_index, texture);
        }
    }
}

/// Upload every material parameter the stage declares.
///
/// Scalars go to their constant-buffer range; textures go to their slot.
/// Names the material does not define, and textures without a device
/// resource, are skipped.
pub fn set_material_parameters(
    rhi: &dyn Rhi,
    context: &DeviceContextRhi,
    frequency: ShaderFrequency,
    map: &ShaderParameterMap,
    material: &Material,
) {
    for (name, _) in map.iter() {
        if let Some(value) = material.scalar_parameter_value(name) {
            ShaderParameter::bind(map, name).set(rhi, context, frequency, &value);
        } else if let Some(Some(texture)) = material.texture_parameter_value(name)
            && let Some(texture_rhi) = texture.rhi()
        {
            ShaderResourceParameter::bind(map, name).set_texture(
                rhi,
                context,
                frequency,
                texture_rhi,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_stays_unbound() {
        let map = ShaderParameterMap::new().with("Color", 0, 0, 16);
        assert!(ShaderParameter::bind(&map, "Color").is_bound());
        assert!(!ShaderParameter::bind(&map, "Missing").is_bound());
        assert!(!ShaderResourceParameter::bind(&map, "Missing").is_bound());
    }

    #[test]
    fn bound_parameter_reports_allocation() {
        let map = ShaderParameterMap::new().with("LocalToWorld", 1, 64, 64);
        let parameter = ShaderParameter::bind(&map, "LocalToWorld");
        assert_eq!(parameter.buffer_index(), 1);
        assert_eq!(parameter.base_index(), 64);
        assert_eq!(parameter.num_bytes(), 64);
    }
}
