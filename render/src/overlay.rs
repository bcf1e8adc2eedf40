//! Editor UI overlay.
//!
//! The game thread runs the UI with [`UiOverlay`] and hands the tessellated
//! result to the render thread as an [`OverlayFrame`]. The device draws it
//! between `begin_drawing_imgui` and `end_drawing_imgui`, inside an open
//! viewport frame.

/// Tessellated UI of one frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

impl OverlayFrame {
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty() && self.textures_delta.is_empty()
    }
}

/// Owns the egui context of the editor overlay.
pub struct UiOverlay {
    ctx: egui::Context,
    screen_rect: egui::Rect,
    pixels_per_point: f32,
}

impl UiOverlay {
    pub fn new(width: u32, height: u32, pixels_per_point: f32) -> Self {
        let mut overlay = Self {
            ctx: egui::Context::default(),
            screen_rect: egui::Rect::NOTHING,
            pixels_per_point,
        };
        overlay.set_screen_size(width, height);
        overlay
    }

    /// The context handed to `Rhi::init_imgui`.
    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_rect = egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(
                width as f32 / self.pixels_per_point,
                height as f32 / self.pixels_per_point,
            ),
        );
    }

    /// Run one UI pass and tessellate it.
    pub fn run(
        &mut self,
        elapsed_time: f64,
        events: Vec<egui::Event>,
        ui: impl FnOnce(&egui::Context),
    ) -> OverlayFrame {
        let raw_input = egui::RawInput {
            screen_rect: Some(self.screen_rect),
            time: Some(elapsed_time),
            events,
            ..Default::default()
        };

        self.ctx.begin_pass(raw_input);
        ui(&self.ctx);
        let output = self.ctx.end_pass();

        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        OverlayFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        }
    }
}

impl std::fmt::Debug for UiOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiOverlay")
            .field("screen_rect", &self.screen_rect)
            .field("pixels_per_point", &self.pixels_per_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ui_produces_no_primitives() {
        let mut overlay = UiOverlay::new(640, 480, 1.0);
        let frame = overlay.run(0.0, Vec::new(), |_| {});
        assert!(frame.primitives.is_empty());
    }

    #[test]
    fn window_produces_primitives() {
        let mut overlay = UiOverlay::new(640, 480, 1.0);
        let frame = overlay.run(0.0, Vec::new(), |ctx| {
            egui::Window::new("Stats").show(ctx, |ui| {
                ui.label("draw calls: 0");
            });
        });
        assert!(!frame.primitives.is_empty());
        assert!(frame.pixels_per_point > 0.0);
    }
}
