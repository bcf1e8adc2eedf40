//! Frame rendering on the render thread.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    MeshBatch, MeshDrawElement, SceneDepthGroupKind, SceneDepthGroups, SceneProxyRef, SceneView,
};
use crate::drawing_policy::{
    BasePassDrawingPolicy, DepthOnlyDrawingPolicy, DrawingPolicy, DrawingPolicyCache, draw_batches,
};
use crate::registry::RenderRegistry;
use crate::rhi::{DeviceContextRhi, Rhi, ViewportRhiRef};

#[cfg(feature = "editor")]
use crate::overlay::OverlayFrame;

/// Everything the render thread needs to draw one frame.
///
/// Built on the game thread and moved to the render thread; nothing in it
/// refers back to game-side mutable state.
#[derive(Clone)]
pub struct FrameSnapshot {
    pub frame_number: u64,
    pub viewport: ViewportRhiRef,
    pub view: SceneView,
    pub depth_groups: SceneDepthGroups,
    pub proxies: Vec<SceneProxyRef>,
    pub present: bool,
    pub lock_to_vsync: bool,
    #[cfg(feature = "editor")]
    pub overlay: Option<OverlayFrame>,
}

impl std::fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSnapshot")
            .field("frame_number", &self.frame_number)
            .field("viewport", &self.viewport.id())
            .field("proxies", &self.proxies.len())
            .field("present", &self.present)
            .field("lock_to_vsync", &self.lock_to_vsync)
            .finish_non_exhaustive()
    }
}

impl FrameSnapshot {
    pub fn new(frame_number: u64, viewport: ViewportRhiRef, view: SceneView) -> Self {
        Self {
            frame_number,
            viewport,
            view,
            depth_groups: SceneDepthGroups::new(),
            proxies: Vec::new(),
            present: true,
            lock_to_vsync: false,
            #[cfg(feature = "editor")]
            overlay: None,
        }
    }

    pub fn with_proxy(mut self, proxy: SceneProxyRef) -> Self {
        self.proxies.push(proxy);
        self
    }

    pub fn with_vsync(mut self, lock_to_vsync: bool) -> Self {
        self.lock_to_vsync = lock_to_vsync;
        self
    }
}

/// Counters of one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub mesh_batches: usize,
    pub dynamic_meshes: usize,
    pub lines: usize,
    /// Batches dropped because their policy had no drawable shaders.
    pub skipped_batches: usize,
}

impl std::ops::AddAssign for FrameStats {
    fn add_assign(&mut self, rhs: Self) {
        self.mesh_batches += rhs.mesh_batches;
        self.dynamic_meshes += rhs.dynamic_meshes;
        self.lines += rhs.lines;
        self.skipped_batches += rhs.skipped_batches;
    }
}

/// Draws frame snapshots. Owns the drawing policy caches.
#[derive(Debug, Default)]
pub struct SceneRenderer {
    base_pass_policies: DrawingPolicyCache<BasePassDrawingPolicy>,
    depth_only_policies: DrawingPolicyCache<DepthOnlyDrawingPolicy>,
    depth_prepass: bool,
    #[cfg(feature = "editor")]
    overlay_enabled: bool,
}

impl SceneRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw world meshes into depth with the vertex stage before the base pass.
    pub fn with_depth_prepass(mut self, enabled: bool) -> Self {
        self.depth_prepass = enabled;
        self
    }

    pub fn base_pass_policies(&self) -> &DrawingPolicyCache<BasePassDrawingPolicy> {
        &self.base_pass_policies
    }

    pub fn depth_only_policies(&self) -> &DrawingPolicyCache<DepthOnlyDrawingPolicy> {
        &self.depth_only_policies
    }

    /// Prepare the device overlay pass. Frames carry overlays only after this succeeds.
    #[cfg(feature = "editor")]
    pub fn init_overlay(&mut self, rhi: &dyn Rhi, overlay: &egui::Context) -> bool {
        self.overlay_enabled = rhi.init_imgui(overlay);
        if !self.overlay_enabled {
            log::warn!("SceneRenderer: device has no UI overlay support");
        }
        self.overlay_enabled
    }

    #[cfg(feature = "editor")]
    pub fn shutdown_overlay(&mut self, rhi: &dyn Rhi) {
        if self.overlay_enabled {
            rhi.shutdown_imgui();
            self.overlay_enabled = false;
        }
    }

    /// Draw one frame into its viewport.
    pub fn render(
        &mut self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        registry: &RenderRegistry,
        frame: FrameSnapshot,
    ) -> FrameStats {
        redlilium_core::profile_scope!("SceneRenderer::render");

        let FrameSnapshot {
            viewport,
            view,
            mut depth_groups,
            proxies,
            present,
            lock_to_vsync,
            #[cfg(feature = "editor")]
            overlay,
            ..
        } = frame;

        rhi.begin_drawing_viewport(context, &viewport);
        let (width, height) = viewport.size();
        rhi.set_viewport(context, 0, 0, 0.0, width, height, 1.0);

        for proxy in &proxies {
            proxy.get_dynamic_elements(&view, &mut depth_groups);
        }

        let mut stats = FrameStats::default();
        if self.depth_prepass {
            let world = depth_groups.get(SceneDepthGroupKind::World);
            render_draw_list(&mut self.depth_only_policies, rhi, context, &world.meshes, &view);
        }

        for (_, group) in depth_groups.iter() {
            stats += render_draw_list(&mut self.base_pass_policies, rhi, context, &group.meshes, &view);
            for mesh in &group.dynamic_meshes {
                if mesh.builder.draw(
                    rhi,
                    context,
                    registry,
                    &mesh.material,
                    &view,
                    mesh.local_to_world,
                    mesh.depth_bias,
                ) {
                    stats.dynamic_meshes += 1;
                }
            }
            stats.lines += group.simple_elements.draw(rhi, context, registry, &view);
        }

        #[cfg(feature = "editor")]
        if self.overlay_enabled
            && let Some(overlay) = &overlay
        {
            rhi.begin_drawing_imgui(context, &viewport);
            rhi.end_drawing_imgui(context, &viewport, overlay);
        }

        rhi.end_drawing_viewport(context, &viewport, present, lock_to_vsync);
        stats
    }

    /// Drop cached policies nothing else references.
    pub fn collect_garbage(&mut self) -> usize {
        self.base_pass_policies.collect_garbage() + self.depth_only_policies.collect_garbage()
    }
}

/// Draw a list of meshes, sharing render state between batches with the
/// same material, vertex factory and depth bias.
pub fn render_draw_list<P: DrawingPolicy>(
    policies: &mut DrawingPolicyCache<P>,
    rhi: &dyn Rhi,
    context: &DeviceContextRhi,
    meshes: &[MeshDrawElement],
    view: &SceneView,
) -> FrameStats {
    let mut groups: Vec<(&MeshDrawElement, Vec<&MeshBatch>)> = Vec::new();
    let mut index_of: HashMap<(usize, usize, u32), usize> = HashMap::new();
    for mesh in meshes {
        let key = (
            Arc::as_ptr(&mesh.material) as usize,
            Arc::as_ptr(&mesh.vertex_factory) as usize,
            mesh.depth_bias.to_bits(),
        );
        let index = *index_of.entry(key).or_insert_with(|| {
            groups.push((mesh, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(&mesh.batch);
    }

    let mut stats = FrameStats::default();
    for (first, batches) in groups {
        let policy = policies.get_or_create(&first.vertex_factory, &first.material, first.depth_bias);
        let drawn = draw_batches(policy, rhi, context, &batches, view);
        stats.mesh_batches += drawn;
        stats.skipped_batches += batches.len() - drawn;
    }
    stats
}
