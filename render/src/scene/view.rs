//! Scene view: the camera a frame is rendered from.

use redlilium_core::math::{Mat4, Vec2, Vec3, Vec4, transform_point};

/// View and projection of one frame, plus the viewport size in pixels.
///
/// Read-only once built; it is copied into the frame snapshot handed to the
/// render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneView {
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection: Mat4,
    size_x: f32,
    size_y: f32,
}

impl SceneView {
    pub fn new(view_matrix: Mat4, projection_matrix: Mat4, size_x: f32, size_y: f32) -> Self {
        Self {
            view_matrix,
            projection_matrix,
            view_projection: projection_matrix * view_matrix,
            size_x,
            size_y,
        }
    }

    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    pub fn size_x(&self) -> f32 {
        self.size_x
    }

    pub fn size_y(&self) -> f32 {
        self.size_y
    }

    /// Homogeneous clip-space position of a world point.
    pub fn world_to_screen(&self, point: &Vec3) -> Vec4 {
        transform_point(&self.view_projection, point)
    }

    /// Pixel position of a world point, origin top-left. `None` behind the camera.
    pub fn project(&self, point: &Vec3) -> Option<Vec2> {
        let clip = self.world_to_screen(point);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        Some(Vec2::new(
            (ndc_x * 0.5 + 0.5) * self.size_x,
            (0.5 - ndc_y * 0.5) * self.size_y,
        ))
    }
}
