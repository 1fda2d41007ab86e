#![cfg_attr(windows, windows_subsystem = "windows")]
#![cfg_attr(not(windows), allow(dead_code))]

mod overlay;
#[cfg(windows)]
mod renderer;
mod scene;

use std::process::ExitCode;

const TITLE: &str = "Hello Triangle";
const RESOLUTION: (i32, i32) = (1280, 720);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandLine {
    pub use_warp_device: bool,
    pub debug: bool,
}

pub fn build_command_line(args: impl IntoIterator<Item = String>) -> CommandLine {
    let mut command_line = CommandLine::default();

    for arg in args {
        if arg.eq_ignore_ascii_case("-warp") || arg.eq_ignore_ascii_case("/warp") {
            command_line.use_warp_device = true;
        } else if arg.eq_ignore_ascii_case("-debug") || arg.eq_ignore_ascii_case("/debug") {
            command_line.debug = true;
        }
    }

    command_line
}

/// Process status for a quit code. Codes outside `0..=255` report failure
/// instead of wrapping.
pub fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(windows)]
mod demo {
    use common::{
        app::{FrameLoop, Pump},
        clock::FrameClock,
        input::Action,
        os::{App, Window},
    };

    use crate::{
        overlay::Overlay,
        renderer::Renderer,
        scene::{Constants, Transform},
    };

    pub struct Demo {
        pub app: App,
        pub window: Window,
        pub renderer: Renderer,
        /// Taken on shutdown.
        pub overlay: Option<Overlay>,
        pub clock: FrameClock,
        pub transform: Transform,
        pub running: bool,
    }

    impl FrameLoop for Demo {
        fn is_running(&self) -> bool {
            self.running
        }

        fn pump(&mut self) -> Pump {
            self.app.pump()
        }

        fn tick(&mut self) {
            let dt = self.clock.tick();

            if let Err(e) = self.renderer.upload(&Constants::new(&self.transform)) {
                log::warn!("skipping constant upload: {e}");
            }

            let input = self.window.input();
            self.transform.apply_input(&input, dt);
            if input.is_down(Action::Exit) {
                self.running = false;
            }

            self.renderer.draw();

            if let Some(overlay) = &mut self.overlay {
                if let Err(e) = overlay.render(&mut self.transform, dt) {
                    log::error!("failed to render overlay {e}");
                }
            }

            self.renderer.present();
        }

        fn shutdown(&mut self) {
            if let Some(overlay) = self.overlay.take() {
                overlay.shutdown(&mut self.window);
            }
        }
    }
}

#[cfg(windows)]
fn main() -> ExitCode {
    use common::{
        app,
        clock::FrameClock,
        input::KeyBindings,
        os::{App, Window},
    };

    use crate::{demo::Demo, overlay::Overlay, renderer::Renderer, scene::Transform};

    common::util::init_logging();

    let command_line = build_command_line(std::env::args());

    let mut title = TITLE.to_string();
    if command_line.use_warp_device {
        title.push_str(" (WARP)");
    }

    let started = app::start(
        || App::init(title, RESOLUTION, KeyBindings::default()),
        |(_, window): &mut (App, Window)| Renderer::new(window, &command_line),
        |(_, window): &mut (App, Window), renderer: &Renderer| Overlay::new(window, renderer),
    );
    let Ok(started) = started else {
        return ExitCode::FAILURE;
    };

    let (app, window) = started.window;
    let mut demo = Demo {
        app,
        window,
        renderer: started.device,
        overlay: Some(started.overlay),
        clock: FrameClock::new(),
        transform: Transform::default(),
        running: true,
    };

    let code = app::run(&mut demo);
    ExitCode::from(exit_status(code))
}

#[cfg(not(windows))]
fn main() -> ExitCode {
    common::util::init_logging();
    log::error!("{TITLE} needs Windows and Direct3D 11");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn switches_accept_either_prefix_and_any_case() {
        assert_eq!(
            build_command_line(args(&["hello_triangle.exe", "/WARP", "-Debug"])),
            CommandLine {
                use_warp_device: true,
                debug: true,
            }
        );
    }

    #[test]
    fn quit_codes_outside_a_byte_are_failures() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(3), 3);
        assert_eq!(exit_status(255), 255);
        assert_eq!(exit_status(256), 1);
        assert_eq!(exit_status(-1), 1);
    }

    #[test]
    fn unknown_arguments_are_ignored() {
        assert_eq!(
            build_command_line(args(&["hello_triangle.exe", "--warp", "warp"])),
            CommandLine::default()
        );
    }
}
