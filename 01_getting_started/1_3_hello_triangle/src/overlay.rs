use common::{clock::frames_per_second, gui::create_context};
use glam::Vec2;
use imgui::{AngleSlider, DrawData, Ui};

use crate::scene::Transform;

pub fn delta_text(dt: f32) -> String {
    format!("Delta time: {dt:.3} sec")
}

pub fn fps_text(dt: f32) -> String {
    match frames_per_second(dt) {
        Some(fps) => format!("FPS: {fps:.2}"),
        None => "FPS: --".to_string(),
    }
}

/// The "Triangle" debug window: sliders over `transform` plus frame timing.
pub fn build_panel(ui: &Ui, transform: &mut Transform, dt: f32) {
    ui.window("Triangle").always_auto_resize(true).build(|| {
        let mut position = transform.position.to_array();
        if ui
            .slider_config("Position", -1.0, 1.0)
            .build_array(&mut position)
        {
            transform.position = Vec2::from_array(position);
        }

        let mut scale = transform.scale.to_array();
        if ui.slider_config("Scale", 0.0, 1.0).build_array(&mut scale) {
            transform.scale = Vec2::from_array(scale);
        }

        AngleSlider::new("Rotation").build(ui, &mut transform.rotation);

        ui.separator();
        ui.text(delta_text(dt));
        ui.text(fps_text(dt));
    });
}

/// Owns the ImGui context the panel is built in. Dropping it releases the
/// context.
pub struct Panel {
    imgui: imgui::Context,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            imgui: create_context(),
        }
    }

    pub fn context_mut(&mut self) -> &mut imgui::Context {
        &mut self.imgui
    }

    /// Builds one frame of the panel and returns its draw data.
    pub fn frame(&mut self, transform: &mut Transform, dt: f32) -> &DrawData {
        let ui = self.imgui.new_frame();
        build_panel(ui, transform, dt);
        self.imgui.render()
    }
}

#[cfg(windows)]
pub use platform::Overlay;

#[cfg(windows)]
mod platform {
    use std::{cell::RefCell, rc::Rc};

    use common::{
        gui::{Dx11Renderer, Win32Platform},
        os::{RawMessage, Window},
        Result,
    };

    use super::Panel;
    use crate::{renderer::Renderer, scene::Transform};

    /// Reached from both the window procedure and the frame loop.
    struct Shared {
        panel: Panel,
        platform: Win32Platform,
    }

    impl Shared {
        fn handle_message(&mut self, message: &RawMessage) -> bool {
            let io = self.panel.context_mut().io_mut();
            self.platform.handle_message(io, message)
        }
    }

    /// Dear ImGui panel plus the backends that feed and draw it.
    pub struct Overlay {
        shared: Rc<RefCell<Shared>>,
        renderer: Dx11Renderer,
    }

    impl Overlay {
        pub fn new(window: &mut Window, renderer: &Renderer) -> Result<Self> {
            let mut panel = Panel::new();
            let platform = Win32Platform::new(panel.context_mut(), window.get_handle());
            let renderer =
                Dx11Renderer::new(panel.context_mut(), renderer.device(), renderer.context())?;

            let shared = Rc::new(RefCell::new(Shared { panel, platform }));

            let hook_shared = Rc::clone(&shared);
            window.set_message_hook(Some(Box::new(move |message: &RawMessage| {
                // Busy while a frame is being built; the message still
                // reaches the application.
                hook_shared
                    .try_borrow_mut()
                    .is_ok_and(|mut shared| shared.handle_message(message))
            })));
            log::debug!("overlay ready");

            Ok(Self { shared, renderer })
        }

        /// Builds the panel and draws it over the current render target.
        pub fn render(&mut self, transform: &mut Transform, dt: f32) -> Result<()> {
            let mut shared = self.shared.borrow_mut();
            let Shared { panel, platform } = &mut *shared;

            platform.prepare_frame(panel.context_mut().io_mut());
            let draw_data = panel.frame(transform, dt);
            self.renderer.render(draw_data)
        }

        /// Detaches from `window` and releases the renderer resources and
        /// the ImGui context.
        pub fn shutdown(self, window: &mut Window) {
            drop(window.set_message_hook(None));
            drop(self);
            log::debug!("overlay shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn timing_rows() {
        assert_eq!(delta_text(0.016), "Delta time: 0.016 sec");
        assert_eq!(fps_text(0.016), "FPS: 62.50");
        assert_eq!(fps_text(0.0), "FPS: --");
    }

    // One test owns the process-wide ImGui context.
    #[test]
    fn panel_draws_from_second_frame_and_releases_its_context() {
        let mut panel = Panel::new();
        panel.context_mut().io_mut().display_size = [1280.0, 720.0];
        panel.context_mut().fonts().build_rgba32_texture();

        let mut transform = Transform {
            position: Vec2::new(0.5, -0.25),
            scale: Vec2::new(0.75, 0.5),
            rotation: 1.0,
        };
        let before = transform;

        // A new auto-resizing window stays hidden for its first frame.
        panel.frame(&mut transform, 0.016);
        assert_eq!(transform, before);

        let draw_data = panel.frame(&mut transform, 0.016);
        assert!(draw_data.total_vtx_count > 0);
        assert_eq!(transform, before);

        drop(panel);
        drop(imgui::Context::create());
    }
}
