//! Translate / rotate / scale gizmo.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use redlilium_core::asset::{AssetReference, AssetResolver};
use redlilium_core::color::Color;
use redlilium_core::math::{Mat4, Rotator, Vec2, Vec3, mat4_from_scale, mat4_from_translation, transform_point};
use redlilium_render::scene::{DynamicMeshBuilder, SceneDepthGroup};
use redlilium_render::vertex_factory::DynamicMeshVertex;
use redlilium_render::{Material, MaterialRef, SceneDepthGroupKind, SceneDepthGroups, SceneProxy, SceneView};

/// Segments around an arrow cone.
const AXIS_ARROW_SEGMENTS: usize = 6;
const AXIS_ARROW_RADIUS: f32 = 5.0;
const CUBE_SCALE: f32 = 4.0;
const CUBE_OFFSET: f32 = 52.0;

const AXIS_LINE_START: f32 = 8.0;
const AXIS_LINE_END: f32 = 48.0;
const CONE_RING: f32 = 40.0;
const CONE_TIP: f32 = 54.0;
/// Distance along an axis reported as its screen-space end.
const AXIS_SCREEN_END: f32 = 64.0;
const PLANE_HANDLE: f32 = 16.0;
const SCALE_PLANE_HANDLE_MID: f32 = 8.0;

/// Asset paths of the X, Y and Z axis materials.
pub const AXIS_MATERIAL_PATHS: [&str; 3] = [
    "Material'EditorMaterials:AxisX_Mat",
    "Material'EditorMaterials:AxisY_Mat",
    "Material'EditorMaterials:AxisZ_Mat",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoType {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
}

bitflags! {
    /// Axes under the cursor. Highlighted axes draw in the current-axis color.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GizmoAxis: u32 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
    }
}

/// Screen-space positions from the last rendered frame, in pixels.
///
/// `None` for points behind the camera or before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GizmoScreenState {
    pub location: Option<Vec2>,
    pub axis_x_end: Option<Vec2>,
    pub axis_y_end: Option<Vec2>,
    pub axis_z_end: Option<Vec2>,
}

/// Game-side gizmo state.
#[derive(Debug)]
pub struct Gizmo {
    enabled: bool,
    ty: GizmoType,
    location: Vec3,
    axis_colors: [Color; 3],
    current_axis_color: Color,
    current_axis: GizmoAxis,
    axis_materials: [Option<MaterialRef>; 3],
    screen_state: Arc<Mutex<GizmoScreenState>>,
}

impl Gizmo {
    pub fn new() -> Self {
        Self {
            enabled: false,
            ty: GizmoType::None,
            location: Vec3::zeros(),
            axis_colors: [Color::RED, Color::BLUE, Color::GREEN],
            current_axis_color: Color::YELLOW,
            current_axis: GizmoAxis::empty(),
            axis_materials: [None, None, None],
            screen_state: Arc::new(Mutex::new(GizmoScreenState::default())),
        }
    }

    /// Resolve the axis materials. Returns how many were found.
    pub fn init(&mut self, materials: &dyn AssetResolver<Material>) -> usize {
        for (slot, path) in self.axis_materials.iter_mut().zip(AXIS_MATERIAL_PATHS) {
            *slot = match AssetReference::parse(path) {
                Ok(reference) => materials.find_asset(&reference),
                Err(e) => {
                    log::error!("Gizmo: bad material path: {e}");
                    None
                }
            };
            if slot.is_none() {
                log::warn!("Gizmo: material {path} not found, axis heads will not be drawn");
            }
        }
        self.axis_materials.iter().flatten().count()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_type(&mut self, ty: GizmoType) {
        self.ty = ty;
    }

    pub fn gizmo_type(&self) -> GizmoType {
        self.ty
    }

    pub fn set_location(&mut self, location: Vec3) {
        self.location = location;
    }

    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn set_current_axis(&mut self, axis: GizmoAxis) {
        self.current_axis = axis;
    }

    pub fn current_axis(&self) -> GizmoAxis {
        self.current_axis
    }

    /// Color of one axis. `axis` must be a single flag.
    pub fn set_axis_color(&mut self, axis: GizmoAxis, color: Color) {
        match axis_index(axis) {
            Some(index) => self.axis_colors[index] = color,
            None => log::warn!("Gizmo: {axis:?} is not a single axis"),
        }
    }

    pub fn set_current_axis_color(&mut self, color: Color) {
        self.current_axis_color = color;
    }

    pub fn axis_material(&self, axis: GizmoAxis) -> Option<&MaterialRef> {
        self.axis_materials[axis_index(axis)?].as_ref()
    }

    /// Positions reported by the most recently rendered proxy.
    pub fn screen_state(&self) -> GizmoScreenState {
        *self.screen_state.lock()
    }

    /// Snapshot for the render thread, or `None` when nothing would be drawn.
    pub fn proxy(&self) -> Option<GizmoProxy> {
        if !self.enabled || self.ty == GizmoType::None {
            return None;
        }
        let color = |axis: GizmoAxis, index: usize| {
            if self.current_axis.contains(axis) {
                self.current_axis_color
            } else {
                self.axis_colors[index]
            }
        };
        Some(GizmoProxy {
            ty: self.ty,
            location: self.location,
            colors: [
                color(GizmoAxis::X, 0),
                color(GizmoAxis::Y, 1),
                color(GizmoAxis::Z, 2),
            ],
            materials: self.axis_materials.clone(),
            screen_state: self.screen_state.clone(),
        })
    }
}

impl Default for Gizmo {
    fn default() -> Self {
        Self::new()
    }
}

fn axis_index(axis: GizmoAxis) -> Option<usize> {
    match axis {
        GizmoAxis::X => Some(0),
        GizmoAxis::Y => Some(1),
        GizmoAxis::Z => Some(2),
        _ => None,
    }
}

/// Render-thread view of a [`Gizmo`].
///
/// Draws into [`SceneDepthGroupKind::WorldEdForeground`] and writes the
/// resulting screen positions back to the owning gizmo.
#[derive(Debug, Clone)]
pub struct GizmoProxy {
    ty: GizmoType,
    location: Vec3,
    colors: [Color; 3],
    materials: [Option<MaterialRef>; 3],
    screen_state: Arc<Mutex<GizmoScreenState>>,
}

impl GizmoProxy {
    /// World units per screen unit at the gizmo location.
    pub fn screen_scale(&self, view: &SceneView) -> f32 {
        view.world_to_screen(&self.location).w
            * (4.0 / view.size_x() / view.projection_matrix()[(0, 0)])
    }

    /// Local frames of the X, Y and Z axes.
    fn axis_matrices(&self) -> [Mat4; 3] {
        let translation = mat4_from_translation(self.location);
        [
            translation,
            translation * Rotator::new(0.0, 0.0, 90.0).to_matrix(),
            translation * Rotator::new(0.0, -90.0, 0.0).to_matrix(),
        ]
    }

    /// Axis line and head of one axis. Returns the screen position of its end.
    #[allow(clippy::too_many_arguments)]
    fn draw_axis(
        &self,
        view: &SceneView,
        group: &mut SceneDepthGroup,
        matrix: &Mat4,
        material: Option<&MaterialRef>,
        color: Color,
        scale: f32,
        cube_head: bool,
    ) -> Option<Vec2> {
        let arrow_to_world = matrix * mat4_from_scale(Vec3::repeat(scale));

        group.simple_elements.add_line(
            &world_point(matrix, AXIS_LINE_START * scale, 0.0, 0.0),
            &world_point(matrix, AXIS_LINE_END * scale, 0.0, 0.0),
            color,
        );

        match material {
            Some(material) => {
                let builder = if cube_head {
                    cube_head_mesh()
                } else {
                    cone_head_mesh(color)
                };
                group.add_dynamic_mesh(builder, material.clone(), arrow_to_world);
            }
            None => log::trace!("GizmoProxy: axis head skipped, material not loaded"),
        }

        view.project(&world_point(&arrow_to_world, AXIS_SCREEN_END, 0.0, 0.0))
    }

    /// Axes plus the plane handles between each pair of axes.
    fn draw_handles(&self, view: &SceneView, group: &mut SceneDepthGroup, cube_heads: bool) -> [Option<Vec2>; 3] {
        let scale = self.screen_scale(view);
        let matrices = self.axis_matrices();
        let [x_color, y_color, z_color] = self.colors;

        let mut ends = [None; 3];
        for (index, end) in ends.iter_mut().enumerate() {
            *end = self.draw_axis(
                view,
                group,
                &matrices[index],
                self.materials[index].as_ref(),
                self.colors[index],
                scale,
                cube_heads,
            );
        }

        // Plane handles are laid out in the X frame.
        let frame = &matrices[0];
        let handle = PLANE_HANDLE * scale;
        let corner = if cube_heads {
            SCALE_PLANE_HANDLE_MID * scale
        } else {
            handle
        };
        let point = |x: f32, y: f32, z: f32| world_point(frame, x, y, z);
        let lines = &mut group.simple_elements;

        // XY
        lines.add_line(&point(handle, 0.0, 0.0), &point(corner, corner, 0.0), x_color);
        lines.add_line(&point(corner, corner, 0.0), &point(0.0, handle, 0.0), y_color);
        // XZ
        lines.add_line(&point(handle, 0.0, 0.0), &point(corner, 0.0, corner), x_color);
        lines.add_line(&point(corner, 0.0, corner), &point(0.0, 0.0, handle), z_color);
        // YZ
        lines.add_line(&point(0.0, handle, 0.0), &point(0.0, corner, corner), y_color);
        lines.add_line(&point(0.0, corner, corner), &point(0.0, 0.0, handle), z_color);

        ends
    }
}

impl SceneProxy for GizmoProxy {
    fn get_dynamic_elements(&self, view: &SceneView, depth_groups: &mut SceneDepthGroups) {
        let group = depth_groups.get_mut(SceneDepthGroupKind::WorldEdForeground);
        let ends = match self.ty {
            GizmoType::Translate => self.draw_handles(view, group, false),
            GizmoType::Scale => self.draw_handles(view, group, true),
            GizmoType::Rotate | GizmoType::None => [None; 3],
        };

        *self.screen_state.lock() = GizmoScreenState {
            location: view.project(&self.location),
            axis_x_end: ends[0],
            axis_y_end: ends[1],
            axis_z_end: ends[2],
        };
    }
}

fn world_point(matrix: &Mat4, x: f32, y: f32, z: f32) -> Vec3 {
    transform_point(matrix, &Vec3::new(x, y, z)).xyz()
}

/// Arrow cone along +X in arrow space.
fn cone_head_mesh(color: Color) -> DynamicMeshBuilder {
    let mut builder = DynamicMeshBuilder::new();
    let color = color.to_array();
    let ring: Vec<u32> = (0..AXIS_ARROW_SEGMENTS)
        .map(|segment| {
            let theta = std::f32::consts::TAU * segment as f32 / AXIS_ARROW_SEGMENTS as f32;
            builder.add_vertex(DynamicMeshVertex::new(
                [
                    CONE_RING,
                    AXIS_ARROW_RADIUS * theta.cos() * 0.5,
                    AXIS_ARROW_RADIUS * theta.sin() * 0.5,
                ],
                [0.0, 0.0],
                color,
            ))
        })
        .collect();
    let tip = builder.add_vertex(DynamicMeshVertex::new([CONE_TIP, 0.0, 0.0], [0.0, 0.0], color));

    for segment in 0..AXIS_ARROW_SEGMENTS {
        builder.add_triangle(tip, ring[segment], ring[(segment + 1) % AXIS_ARROW_SEGMENTS]);
    }
    builder
}

/// Cube centered on the axis at the scale handle offset.
fn cube_head_mesh() -> DynamicMeshBuilder {
    const CORNERS: [[f32; 3]; 8] = [
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
    ];
    const FACES: [[usize; 3]; 12] = [
        [0, 1, 2],
        [2, 3, 0],
        [1, 5, 6],
        [6, 2, 1],
        [7, 6, 5],
        [5, 4, 7],
        [4, 0, 3],
        [3, 7, 4],
        [4, 5, 1],
        [1, 0, 4],
        [3, 2, 6],
        [6, 7, 3],
    ];

    let mut builder = DynamicMeshBuilder::new();
    let corners = CORNERS.map(|[x, y, z]| {
        builder.add_vertex(DynamicMeshVertex::new(
            [x * CUBE_SCALE + CUBE_OFFSET, y * CUBE_SCALE, z * CUBE_SCALE],
            [0.0, 0.0],
            [1.0; 4],
        ))
    });
    for [a, b, c] in FACES {
        builder.add_triangle(corners[a], corners[b], corners[c]);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use redlilium_core::math::{look_at_rh, perspective_rh};

    fn view() -> SceneView {
        SceneView::new(
            look_at_rh(&Vec3::new(0.0, 0.0, 400.0), &Vec3::zeros(), &Vec3::y()),
            perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 5000.0),
            800.0,
            800.0,
        )
    }

    fn enabled(ty: GizmoType) -> Gizmo {
        let mut gizmo = Gizmo::new();
        gizmo.set_type(ty);
        gizmo.set_enabled(true);
        gizmo
    }

    #[test]
    fn disabled_gizmo_has_no_proxy() {
        let mut gizmo = Gizmo::new();
        gizmo.set_type(GizmoType::Translate);
        assert!(gizmo.proxy().is_none());
        gizmo.set_enabled(true);
        gizmo.set_type(GizmoType::None);
        assert!(gizmo.proxy().is_none());
    }

    #[test]
    fn cone_has_six_sides_and_a_tip() {
        let cone = cone_head_mesh(Color::RED);
        assert_eq!(cone.num_vertices(), AXIS_ARROW_SEGMENTS + 1);
        assert_eq!(cone.num_triangles(), AXIS_ARROW_SEGMENTS);
    }

    #[test]
    fn cube_has_twelve_triangles() {
        let cube = cube_head_mesh();
        assert_eq!(cube.num_vertices(), 8);
        assert_eq!(cube.num_triangles(), 12);
    }

    #[test]
    fn translate_draws_lines_without_materials() {
        let proxy = enabled(GizmoType::Translate).proxy().unwrap();
        let mut groups = SceneDepthGroups::new();
        proxy.get_dynamic_elements(&view(), &mut groups);

        assert!(groups.get(SceneDepthGroupKind::World).is_empty());
        let foreground = groups.get(SceneDepthGroupKind::WorldEdForeground);
        assert_eq!(foreground.simple_elements.num_lines(), 9);
        assert!(foreground.dynamic_meshes.is_empty());
    }

    #[test]
    fn rotate_draws_nothing_but_reports_location() {
        let gizmo = enabled(GizmoType::Rotate);
        let mut groups = SceneDepthGroups::new();
        gizmo.proxy().unwrap().get_dynamic_elements(&view(), &mut groups);
        assert!(groups.is_empty());

        let state = gizmo.screen_state();
        let center = state.location.unwrap();
        assert!((center.x - 400.0).abs() < 1e-3);
        assert!((center.y - 400.0).abs() < 1e-3);
        assert!(state.axis_x_end.is_none());
    }

    #[test]
    fn highlighted_axis_uses_current_color() {
        let mut gizmo = enabled(GizmoType::Translate);
        gizmo.set_current_axis(GizmoAxis::X | GizmoAxis::Z);
        let proxy = gizmo.proxy().unwrap();
        assert_eq!(proxy.colors, [Color::YELLOW, Color::BLUE, Color::YELLOW]);
    }

    #[test]
    fn screen_scale_grows_with_distance() {
        let proxy = enabled(GizmoType::Translate).proxy().unwrap();
        let near = proxy.screen_scale(&view());
        let far_view = SceneView::new(
            look_at_rh(&Vec3::new(0.0, 0.0, 800.0), &Vec3::zeros(), &Vec3::y()),
            *view().projection_matrix(),
            800.0,
            800.0,
        );
        let far = proxy.screen_scale(&far_view);
        assert!((far / near - 2.0).abs() < 1e-3);
    }

    #[test]
    fn axis_color_requires_single_axis() {
        let mut gizmo = Gizmo::new();
        gizmo.set_axis_color(GizmoAxis::Y, Color::WHITE);
        gizmo.set_axis_color(GizmoAxis::X | GizmoAxis::Y, Color::BLACK);
        assert_eq!(gizmo.axis_colors, [Color::RED, Color::WHITE, Color::GREEN]);
    }
}
