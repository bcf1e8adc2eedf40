//! World grid on the XZ plane.

use std::sync::Arc;

use redlilium_render::rhi::PrimitiveType;
use redlilium_render::vertex_factory::world_grid_vertex_factory;
use redlilium_render::{
    MaterialRef, MeshBatch, MeshBatchElement, MeshDrawElement, RenderRegistry, Rhi,
    SceneDepthGroupKind, SceneDepthGroups, SceneProxy, SceneView,
};

/// Line list covering `[min, max]` on both X and Z, one line every `step` units.
#[derive(Debug, Clone)]
pub struct WorldGrid {
    min: f32,
    max: f32,
    step: f32,
    vertices: Vec<[f32; 4]>,
}

impl WorldGrid {
    pub fn new(min: f32, max: f32, step: f32) -> Self {
        assert!(step > 0.0, "grid step must be positive, got {step}");
        assert!(max > min, "grid range is empty: [{min}, {max}]");

        let lines = ((max - min) / step).floor() as usize + 1;
        let mut vertices = Vec::with_capacity(lines * 4);
        for i in 0..lines {
            let offset = min + i as f32 * step;
            vertices.push([offset, 0.0, min, 1.0]);
            vertices.push([offset, 0.0, max, 1.0]);
            vertices.push([min, 0.0, offset, 1.0]);
            vertices.push([max, 0.0, offset, 1.0]);
        }

        Self {
            min,
            max,
            step,
            vertices,
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn num_lines(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn vertices(&self) -> &[[f32; 4]] {
        &self.vertices
    }

    /// Upload the grid and wrap it in a proxy drawn with `material`.
    ///
    /// Returns `None` if the device refused the buffer or the layout.
    pub fn build(
        &self,
        rhi: &dyn Rhi,
        registry: &RenderRegistry,
        material: MaterialRef,
    ) -> Option<WorldGridProxy> {
        let Some(buffer) = rhi.create_vertex_buffer("WorldGrid", bytemuck::cast_slice(&self.vertices))
        else {
            log::error!("WorldGrid: failed to create vertex buffer");
            return None;
        };

        let mut factory = world_grid_vertex_factory().with_stream(0, buffer, 0);
        if !factory.init_rhi(rhi) {
            return None;
        }
        let factory = Arc::new(factory);
        registry.register_vertex_factory(&factory);

        let batch = MeshBatch::new(PrimitiveType::LineList)
            .with_element(MeshBatchElement::new(self.num_lines() as u32));
        log::debug!(
            "WorldGrid: {} lines over [{}, {}] step {}",
            self.num_lines(),
            self.min,
            self.max,
            self.step
        );
        Some(WorldGridProxy {
            element: MeshDrawElement::new(factory, material, batch),
        })
    }
}

/// Draws a built [`WorldGrid`] into the world group every frame.
#[derive(Debug, Clone)]
pub struct WorldGridProxy {
    element: MeshDrawElement,
}

impl WorldGridProxy {
    pub fn element(&self) -> &MeshDrawElement {
        &self.element
    }
}

impl SceneProxy for WorldGridProxy {
    fn get_dynamic_elements(&self, _view: &SceneView, depth_groups: &mut SceneDepthGroups) {
        depth_groups
            .get_mut(SceneDepthGroupKind::World)
            .add_mesh(self.element.clone());
    }
}
