use std::time::Instant;

use imgui::{Io, Key, MouseButton};
use windows::Win32::{
    Foundation::{HWND, RECT},
    UI::{
        Input::KeyboardAndMouse::{
            GetCapture, ReleaseCapture, SetCapture, VIRTUAL_KEY, VK_A, VK_BACK, VK_C, VK_CONTROL,
            VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_HOME, VK_INSERT, VK_LEFT, VK_MENU, VK_NEXT,
            VK_PRIOR, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP, VK_V, VK_X, VK_Y,
            VK_Z,
        },
        WindowsAndMessaging::{
            GetClientRect, WM_CHAR, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDBLCLK, WM_LBUTTONDOWN,
            WM_LBUTTONUP, WM_MBUTTONDBLCLK, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL,
            WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_RBUTTONDBLCLK, WM_RBUTTONDOWN, WM_RBUTTONUP,
            WM_SYSKEYDOWN, WM_SYSKEYUP,
        },
    },
};

use crate::os::RawMessage;

const WHEEL_DELTA: f32 = 120.0;

/// Feeds ImGui IO from Win32 window messages.
pub struct Win32Platform {
    hwnd: HWND,
    last_frame: Instant,
}

impl Win32Platform {
    pub fn new(ctx: &mut imgui::Context, hwnd: HWND) -> Self {
        ctx.set_platform_name(Some(format!(
            "common-win32 {}",
            env!("CARGO_PKG_VERSION")
        )));

        Self {
            hwnd,
            last_frame: Instant::now(),
        }
    }

    /// Translates one message into IO events. Returns `true` when ImGui
    /// wants the mouse and the message was a mouse button or wheel event.
    /// Keyboard messages are never consumed.
    pub fn handle_message(&mut self, io: &mut Io, message: &RawMessage) -> bool {
        let wparam = message.wparam.0;
        let lparam = message.lparam.0;

        match message.message {
            WM_MOUSEMOVE => {
                let x = (lparam & 0xffff) as u16 as i16 as f32;
                let y = ((lparam >> 16) & 0xffff) as u16 as i16 as f32;
                io.add_mouse_pos_event([x, y]);
                false
            }

            WM_LBUTTONDOWN | WM_LBUTTONDBLCLK => self.mouse_button(io, MouseButton::Left, true),
            WM_RBUTTONDOWN | WM_RBUTTONDBLCLK => self.mouse_button(io, MouseButton::Right, true),
            WM_MBUTTONDOWN | WM_MBUTTONDBLCLK => self.mouse_button(io, MouseButton::Middle, true),
            WM_LBUTTONUP => self.mouse_button(io, MouseButton::Left, false),
            WM_RBUTTONUP => self.mouse_button(io, MouseButton::Right, false),
            WM_MBUTTONUP => self.mouse_button(io, MouseButton::Middle, false),

            WM_MOUSEWHEEL => {
                io.add_mouse_wheel_event([0.0, wheel_delta(wparam)]);
                io.want_capture_mouse
            }

            WM_MOUSEHWHEEL => {
                io.add_mouse_wheel_event([-wheel_delta(wparam), 0.0]);
                io.want_capture_mouse
            }

            WM_KEYDOWN | WM_KEYUP | WM_SYSKEYDOWN | WM_SYSKEYUP => {
                let down = matches!(message.message, WM_KEYDOWN | WM_SYSKEYDOWN);
                if let Some(key) = map_key(VIRTUAL_KEY(wparam as u16)) {
                    io.add_key_event(key, down);
                }
                // Key releases must still reach the application's bindings.
                false
            }

            WM_CHAR => {
                if let Some(c) = char::from_u32(wparam as u32).filter(|c| !c.is_control()) {
                    io.add_input_character(c);
                }
                false
            }

            _ => false,
        }
    }

    fn mouse_button(&mut self, io: &mut Io, button: MouseButton, down: bool) -> bool {
        unsafe {
            if down && GetCapture() == HWND::default() {
                SetCapture(self.hwnd);
            } else if !down && GetCapture() == self.hwnd {
                let _ = ReleaseCapture();
            }
        }

        io.add_mouse_button_event(button, down);
        io.want_capture_mouse
    }

    /// Updates display size and frame timing before `new_frame`.
    pub fn prepare_frame(&mut self, io: &mut Io) {
        let mut rect = RECT::default();
        if let Err(e) = unsafe { GetClientRect(self.hwnd, &mut rect) } {
            log::warn!("failed to get client rect {e}");
        }
        io.display_size = [
            (rect.right - rect.left) as f32,
            (rect.bottom - rect.top) as f32,
        ];

        let now = Instant::now();
        io.update_delta_time(now - self.last_frame);
        self.last_frame = now;
    }
}

fn wheel_delta(wparam: usize) -> f32 {
    ((wparam >> 16) & 0xffff) as u16 as i16 as f32 / WHEEL_DELTA
}

fn map_key(key: VIRTUAL_KEY) -> Option<Key> {
    Some(match key {
        VK_TAB => Key::Tab,
        VK_LEFT => Key::LeftArrow,
        VK_RIGHT => Key::RightArrow,
        VK_UP => Key::UpArrow,
        VK_DOWN => Key::DownArrow,
        VK_PRIOR => Key::PageUp,
        VK_NEXT => Key::PageDown,
        VK_HOME => Key::Home,
        VK_END => Key::End,
        VK_INSERT => Key::Insert,
        VK_DELETE => Key::Delete,
        VK_BACK => Key::Backspace,
        VK_SPACE => Key::Space,
        VK_RETURN => Key::Enter,
        VK_ESCAPE => Key::Escape,
        VK_CONTROL => Key::LeftCtrl,
        VK_SHIFT => Key::LeftShift,
        VK_MENU => Key::LeftAlt,
        VK_A => Key::A,
        VK_C => Key::C,
        VK_V => Key::V,
        VK_X => Key::X,
        VK_Y => Key::Y,
        VK_Z => Key::Z,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_delta_is_signed() {
        assert_eq!(wheel_delta(120 << 16), 1.0);
        assert_eq!(wheel_delta((0xff88_usize) << 16), -1.0);
    }

    #[test]
    fn only_editing_keys_are_mapped() {
        assert_eq!(map_key(VK_RETURN), Some(Key::Enter));
        assert_eq!(map_key(VK_CONTROL), Some(Key::LeftCtrl));
        assert_eq!(map_key(VIRTUAL_KEY(b'Q' as u16)), None);
    }
}
