//! Material definition and its shader-map cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use redlilium_core::asset::AssetReference;

use crate::registry::RenderRegistry;
use crate::rhi::ShaderFrequency;
use crate::shader::{ShaderMetaType, ShaderRef};
use crate::texture::Texture2DRef;

bitflags! {
    /// Kinds of meshes a material may be drawn on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialUsage: u32 {
        const STATIC_MESH = 1 << 0;
        const ALL_MESHES = Self::STATIC_MESH.bits();
    }
}

struct MaterialConfig {
    shader_types: [Option<&'static ShaderMetaType>; ShaderFrequency::COUNT],
    scalar_parameters: HashMap<String, f32>,
    texture_parameters: HashMap<String, Option<Texture2DRef>>,
    usage: MaterialUsage,
    two_sided: bool,
    wireframe: bool,
}

struct ShaderMapState {
    shader_map: HashMap<u32, Vec<ShaderRef>>,
    /// Registry generations the map was built under.
    generation: (u64, u64),
    rebuild_count: u64,
}

/// A shading definition plus its per-layout shader cache.
///
/// Setters take `&self`: materials are shared through [`MaterialRef`] by
/// every drawing policy and mesh that uses them. Changing a shader type or
/// the usage flags marks the shader map dirty; the next
/// [`get_shader`](Material::get_shader) rebuilds it from scratch.
pub struct Material {
    name: String,
    asset_reference: AssetReference,
    registry: Arc<RenderRegistry>,
    config: RwLock<MaterialConfig>,
    is_need_update_shader_map: AtomicBool,
    shader_map: Mutex<ShaderMapState>,
}

pub type MaterialRef = Arc<Material>;

static_assertions::assert_impl_all!(Material: Send, Sync);

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config.read();
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("asset_reference", &self.asset_reference)
            .field("usage", &config.usage)
            .field("two_sided", &config.two_sided)
            .field("wireframe", &config.wireframe)
            .field(
                "shader_types",
                &config
                    .shader_types
                    .iter()
                    .flatten()
                    .map(|ty| ty.name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Material {
    /// A material without shaders or parameters, usable on all meshes.
    pub fn new(name: impl Into<String>, registry: Arc<RenderRegistry>) -> Self {
        Self {
            name: name.into(),
            asset_reference: AssetReference::invalid(),
            registry,
            config: RwLock::new(MaterialConfig {
                shader_types: [None; ShaderFrequency::COUNT],
                scalar_parameters: HashMap::new(),
                texture_parameters: HashMap::new(),
                usage: MaterialUsage::ALL_MESHES,
                two_sided: false,
                wireframe: false,
            }),
            is_need_update_shader_map: AtomicBool::new(true),
            shader_map: Mutex::new(ShaderMapState {
                shader_map: HashMap::new(),
                generation: (0, 0),
                rebuild_count: 0,
            }),
        }
    }

    pub fn with_asset_reference(mut self, asset_reference: AssetReference) -> Self {
        self.asset_reference = asset_reference;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_reference(&self) -> &AssetReference {
        &self.asset_reference
    }

    pub fn registry(&self) -> &Arc<RenderRegistry> {
        &self.registry
    }

    /// Use `meta_type` for the stage it declares.
    pub fn set_shader(&self, meta_type: &'static ShaderMetaType) {
        self.config.write().shader_types[meta_type.frequency.index()] = Some(meta_type);
        self.mark_shader_map_dirty();
    }

    /// Stop using any shader for `frequency`.
    pub fn clear_shader(&self, frequency: ShaderFrequency) {
        self.config.write().shader_types[frequency.index()] = None;
        self.mark_shader_map_dirty();
    }

    pub fn shader_type(&self, frequency: ShaderFrequency) -> Option<&'static ShaderMetaType> {
        self.config.read().shader_types[frequency.index()]
    }

    pub fn set_scalar_parameter_value(&self, name: impl Into<String>, value: f32) {
        self.config.write().scalar_parameters.insert(name.into(), value);
    }

    /// Set a texture parameter. `None` defines the parameter without a texture.
    pub fn set_texture_parameter_value(&self, name: impl Into<String>, texture: Option<Texture2DRef>) {
        self.config.write().texture_parameters.insert(name.into(), texture);
    }

    pub fn scalar_parameter_value(&self, name: &str) -> Option<f32> {
        self.config.read().scalar_parameters.get(name).copied()
    }

    /// `None` if the parameter is not defined, `Some(None)` if it is defined
    /// without a texture.
    pub fn texture_parameter_value(&self, name: &str) -> Option<Option<Texture2DRef>> {
        self.config.read().texture_parameters.get(name).cloned()
    }

    pub fn scalar_parameter_count(&self) -> usize {
        self.config.read().scalar_parameters.len()
    }

    pub fn texture_parameter_count(&self) -> usize {
        self.config.read().texture_parameters.len()
    }

    pub fn set_two_sided(&self, two_sided: bool) {
        self.config.write().two_sided = two_sided;
    }

    pub fn is_two_sided(&self) -> bool {
        self.config.read().two_sided
    }

    pub fn set_wireframe(&self, wireframe: bool) {
        self.config.write().wireframe = wireframe;
    }

    pub fn is_wireframe(&self) -> bool {
        self.config.read().wireframe
    }

    pub fn set_usage_flags(&self, usage: MaterialUsage) {
        self.config.write().usage = usage;
        self.mark_shader_map_dirty();
    }

    pub fn usage_flags(&self) -> MaterialUsage {
        self.config.read().usage
    }

    /// Enable or disable drawing on static meshes.
    pub fn usage_on_static_mesh(&self, enabled: bool) {
        self.config
            .write()
            .usage
            .set(MaterialUsage::STATIC_MESH, enabled);
        self.mark_shader_map_dirty();
    }

    pub fn is_usage_static_mesh(&self) -> bool {
        self.usage_flags().contains(MaterialUsage::STATIC_MESH)
    }

    /// The shader of `frequency` compiled for `vertex_factory_hash`.
    ///
    /// Rebuilds the shader map first if the configuration changed, a vertex
    /// factory layout became live or the loaded shader instances changed
    /// since the last build. `None` means the
    /// material has no shader for this layout and stage.
    pub fn get_shader(&self, vertex_factory_hash: u32, frequency: ShaderFrequency) -> Option<ShaderRef> {
        let mut state = self.shader_map.lock();
        let generation = self.registry.generation();
        if self.is_need_update_shader_map.swap(false, Ordering::AcqRel)
            || state.generation != generation
        {
            self.cache_shader_map(&mut state, generation);
        }

        state
            .shader_map
            .get(&vertex_factory_hash)?
            .iter()
            .find(|shader| shader.frequency() == frequency)
            .cloned()
    }

    /// Number of times the shader map has been rebuilt.
    pub fn shader_map_rebuild_count(&self) -> u64 {
        self.shader_map.lock().rebuild_count
    }

    /// Whether the next lookup will rebuild the shader map.
    pub fn is_shader_map_dirty(&self) -> bool {
        self.is_need_update_shader_map.load(Ordering::Acquire)
            || self.shader_map.lock().generation != self.registry.generation()
    }

    fn mark_shader_map_dirty(&self) {
        self.is_need_update_shader_map.store(true, Ordering::Release);
    }

    fn cache_shader_map(&self, state: &mut ShaderMapState, generation: (u64, u64)) {
        redlilium_core::profile_scope!("Material::cache_shader_map");

        let (shader_types, usage) = {
            let config = self.config.read();
            (config.shader_types, config.usage)
        };

        let mut shader_map = HashMap::new();
        for hash in self.registry.vertex_factories.live_hashes(usage) {
            let shaders = self.mesh_shaders(&shader_types, hash);
            if !shaders.is_empty() {
                shader_map.insert(hash, shaders);
            }
        }

        state.rebuild_count += 1;
        state.generation = generation;
        log::debug!(
            "Material '{}': shader map rebuilt ({} layouts, rebuild #{})",
            self.name,
            shader_map.len(),
            state.rebuild_count
        );
        state.shader_map = shader_map;
    }

    fn mesh_shaders(
        &self,
        shader_types: &[Option<&'static ShaderMetaType>; ShaderFrequency::COUNT],
        vertex_factory_hash: u32,
    ) -> Vec<ShaderRef> {
        shader_types
            .iter()
            .flatten()
            .filter_map(|meta_type| {
                let shader = self.registry.shaders.find_instance(meta_type, vertex_factory_hash);
                if shader.is_none() {
                    log::trace!(
                        "Material '{}': no {} instance for layout {:#010x}",
                        self.name,
                        meta_type.name,
                        vertex_factory_hash
                    );
                }
                shader
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE};

    fn material() -> Material {
        Material::new("Test", Arc::new(RenderRegistry::new()))
    }

    #[test]
    fn shader_assignment_marks_dirty() {
        let material = material();
        material.get_shader(0, ShaderFrequency::Vertex);
        assert!(!material.is_shader_map_dirty());

        material.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);
        assert!(material.is_shader_map_dirty());
        assert_eq!(
            material.shader_type(ShaderFrequency::Vertex).map(|ty| ty.name),
            Some("BasePassVertexShader")
        );
        assert!(material.shader_type(ShaderFrequency::Pixel).is_none());
    }

    #[test]
    fn parameters_do_not_mark_dirty() {
        let material = material();
        material.get_shader(0, ShaderFrequency::Vertex);
        material.set_scalar_parameter_value("Roughness", 0.5);
        material.set_texture_parameter_value("Diffuse", None);
        material.set_two_sided(true);
        assert!(!material.is_shader_map_dirty());
    }

    #[test]
    fn not_found_is_distinct_from_empty_texture() {
        let material = material();
        material.set_texture_parameter_value("Diffuse", None);
        assert!(matches!(material.texture_parameter_value("Diffuse"), Some(None)));
        assert!(material.texture_parameter_value("Normal").is_none());
        assert!(material.scalar_parameter_value("Roughness").is_none());
        material.set_scalar_parameter_value("Roughness", 0.0);
        assert_eq!(material.scalar_parameter_value("Roughness"), Some(0.0));
    }

    #[test]
    fn usage_toggle() {
        let material = material();
        material.set_usage_flags(MaterialUsage::empty());
        assert!(!material.is_usage_static_mesh());
        material.usage_on_static_mesh(true);
        assert!(material.is_usage_static_mesh());
        material.usage_on_static_mesh(false);
        assert_eq!(material.usage_flags(), MaterialUsage::empty());
    }

    #[test]
    fn unconfigured_material_resolves_nothing() {
        let material = material();
        material.set_shader(&BASE_PASS_PIXEL_SHADER_TYPE);
        let hash = material.registry().dynamic_mesh_factory().hash();
        assert!(material.get_shader(hash, ShaderFrequency::Pixel).is_none());
        assert_eq!(material.shader_map_rebuild_count(), 1);
    }
}
