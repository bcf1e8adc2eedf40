//! Depth groups: draw lists rendered one after another.

use redlilium_core::math::Mat4;

use super::{DynamicMeshBuilder, MeshDrawElement, SimpleElements};
use crate::materials::MaterialRef;

/// Order in which groups are drawn. Later groups draw over earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneDepthGroupKind {
    World,
    /// Editor widgets drawn over the world.
    WorldEdForeground,
}

impl SceneDepthGroupKind {
    pub const COUNT: usize = 2;
    pub const ALL: [Self; Self::COUNT] = [Self::World, Self::WorldEdForeground];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A dynamic mesh queued with its material and transform.
#[derive(Debug, Clone)]
pub struct DynamicMeshDraw {
    pub builder: DynamicMeshBuilder,
    pub material: MaterialRef,
    pub local_to_world: Mat4,
    pub depth_bias: f32,
}

/// Everything one depth group draws in a frame.
#[derive(Debug, Clone, Default)]
pub struct SceneDepthGroup {
    pub meshes: Vec<MeshDrawElement>,
    pub dynamic_meshes: Vec<DynamicMeshDraw>,
    pub simple_elements: SimpleElements,
}

impl SceneDepthGroup {
    pub fn add_mesh(&mut self, mesh: MeshDrawElement) {
        self.meshes.push(mesh);
    }

    pub fn add_dynamic_mesh(
        &mut self,
        builder: DynamicMeshBuilder,
        material: MaterialRef,
        local_to_world: Mat4,
    ) {
        self.dynamic_meshes.push(DynamicMeshDraw {
            builder,
            material,
            local_to_world,
            depth_bias: 0.0,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.dynamic_meshes.is_empty() && self.simple_elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.dynamic_meshes.clear();
        self.simple_elements.clear();
    }
}

/// One [`SceneDepthGroup`] per [`SceneDepthGroupKind`].
#[derive(Debug, Clone, Default)]
pub struct SceneDepthGroups {
    groups: [SceneDepthGroup; SceneDepthGroupKind::COUNT],
}

impl SceneDepthGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: SceneDepthGroupKind) -> &SceneDepthGroup {
        &self.groups[kind.index()]
    }

    pub fn get_mut(&mut self, kind: SceneDepthGroupKind) -> &mut SceneDepthGroup {
        &mut self.groups[kind.index()]
    }

    /// Groups in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (SceneDepthGroupKind, &SceneDepthGroup)> {
        SceneDepthGroupKind::ALL.into_iter().zip(self.groups.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(SceneDepthGroup::is_empty)
    }

    pub fn clear(&mut self) {
        self.groups.iter_mut().for_each(SceneDepthGroup::clear);
    }
}
