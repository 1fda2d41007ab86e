use std::{ffi::c_void, ptr::NonNull};

use windows::{
    core::{s, PCSTR},
    Win32::{
        Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM},
        System::LibraryLoader::GetModuleHandleA,
        UI::WindowsAndMessaging::{
            AdjustWindowRect, AppendMenuA, CreateMenu, CreateWindowExA, DefWindowProcA,
            DestroyWindow, DispatchMessageA, GetClientRect, GetWindowLongPtrA, LoadCursorA,
            MessageBoxA, PeekMessageA, PostQuitMessage, RegisterClassExA, SetWindowLongPtrA,
            ShowWindow, TranslateMessage, CREATESTRUCTA, CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT,
            GWLP_USERDATA, HMENU, IDC_ARROW, MB_ICONINFORMATION, MB_OK, MF_POPUP, MF_STRING, MSG,
            PM_REMOVE, SW_HIDE, SW_SHOW, WM_COMMAND, WM_CREATE, WM_DESTROY, WM_KEYDOWN, WM_KEYUP,
            WM_KILLFOCUS, WM_NCDESTROY, WM_QUIT, WNDCLASSEXA, WS_OVERLAPPEDWINDOW,
        },
    },
};

use crate::{
    app::Pump,
    error::Context,
    input::{InputState, KeyBindings},
    util::AsCString,
    Result,
};

const CLASS_NAME: PCSTR = s!("LearnD3D11Class");

pub const IDM_ABOUT: u16 = 104;
pub const IDM_EXIT: u16 = 105;

/// A window message as received by the window procedure.
#[derive(Clone, Copy, Debug)]
pub struct RawMessage {
    pub hwnd: HWND,
    pub message: u32,
    pub wparam: WPARAM,
    pub lparam: LPARAM,
}

/// Sees every window message before the application does. Returning
/// `true` consumes the message.
pub type MessageHook = Box<dyn FnMut(&RawMessage) -> bool>;

/// State shared with the window procedure through `GWLP_USERDATA`.
struct WindowState {
    bindings: KeyBindings,
    input: InputState,
    hook: Option<MessageHook>,
}

pub struct Window {
    hwnd: HWND,
    state: NonNull<WindowState>,
}

impl Window {
    fn new(
        title: impl Into<String>,
        window_size: (i32, i32),
        bindings: KeyBindings,
    ) -> Result<Self> {
        let instance = unsafe { GetModuleHandleA(None) }.context("GetModuleHandleA")?;

        let wc = WNDCLASSEXA {
            cbSize: std::mem::size_of::<WNDCLASSEXA>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wndproc),
            hInstance: instance.into(),
            hCursor: unsafe { LoadCursorA(None, PCSTR(IDC_ARROW.0 as _)) }
                .context("LoadCursorA")?,
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        if unsafe { RegisterClassExA(&wc) } == 0 {
            return Err(windows::core::Error::from_win32()).context("RegisterClassExA");
        }

        let menu = create_menu()?;

        let mut window_rect = RECT {
            left: 0,
            top: 0,
            right: window_size.0,
            bottom: window_size.1,
        };
        unsafe { AdjustWindowRect(&mut window_rect, WS_OVERLAPPEDWINDOW, true) }
            .context("AdjustWindowRect")?;

        let state = NonNull::from(Box::leak(Box::new(WindowState {
            bindings,
            input: InputState::default(),
            hook: None,
        })));

        let title: String = title.into();
        let title = title.as_c_string();

        let hwnd = unsafe {
            CreateWindowExA(
                Default::default(),
                CLASS_NAME,
                PCSTR(title.as_ptr() as _),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                window_rect.right - window_rect.left,
                window_rect.bottom - window_rect.top,
                None, // No parent window.
                menu,
                instance,
                Some(state.as_ptr() as *const c_void),
            )
        };

        match hwnd {
            Ok(hwnd) if hwnd != HWND::default() => Ok(Self { hwnd, state }),
            result => {
                // SAFETY: no window owns the state, so this is the only reference.
                drop(unsafe { Box::from_raw(state.as_ptr()) });
                Err(result.err().unwrap_or_else(windows::core::Error::from_win32))
                    .context("CreateWindowExA")
            }
        }
    }

    pub fn get_handle(&self) -> HWND {
        self.hwnd
    }

    pub fn get_physical_size(&self) -> (i32, i32) {
        let mut window_rect = RECT::default();
        if let Err(e) = unsafe { GetClientRect(self.hwnd, &mut window_rect) } {
            log::warn!("failed to get client rect {e}");
        }

        (
            window_rect.right - window_rect.left,
            window_rect.bottom - window_rect.top,
        )
    }

    pub fn set_visible(&self, visible: bool) {
        let show = if visible { SW_SHOW } else { SW_HIDE };
        let _ = unsafe { ShowWindow(self.hwnd, show) };
    }

    /// Snapshot of the logical input state.
    pub fn input(&self) -> InputState {
        let state = unsafe { self.state.as_ref() };
        state.input
    }

    /// Installs or removes the hook that runs ahead of application
    /// handling, returning the previous one.
    pub fn set_message_hook(&mut self, hook: Option<MessageHook>) -> Option<MessageHook> {
        let state = unsafe { self.state.as_mut() };
        std::mem::replace(&mut state.hook, hook)
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        // Fails harmlessly when the window was already destroyed.
        let _ = unsafe { DestroyWindow(self.hwnd) };
        // SAFETY: the window is gone, so the window procedure no longer
        // reaches the state.
        drop(unsafe { Box::from_raw(self.state.as_ptr()) });
    }
}

fn create_menu() -> Result<HMENU> {
    unsafe {
        let file = CreateMenu().context("CreateMenu")?;
        AppendMenuA(file, MF_STRING, IDM_EXIT as usize, s!("E&xit")).context("AppendMenuA")?;

        let help = CreateMenu().context("CreateMenu")?;
        AppendMenuA(help, MF_STRING, IDM_ABOUT as usize, s!("&About...")).context("AppendMenuA")?;

        let menu = CreateMenu().context("CreateMenu")?;
        AppendMenuA(menu, MF_POPUP, file.0 as usize, s!("&File")).context("AppendMenuA")?;
        AppendMenuA(menu, MF_POPUP, help.0 as usize, s!("&Help")).context("AppendMenuA")?;

        Ok(menu)
    }
}

pub struct App {}

impl App {
    pub fn init(
        title: impl Into<String>,
        window_size: (i32, i32),
        bindings: KeyBindings,
    ) -> Result<(App, Window)> {
        let app = App {};

        let window = Window::new(title, window_size, bindings)?;
        window.set_visible(true);

        Ok((app, window))
    }

    /// Dispatches at most one pending message without blocking.
    pub fn pump(&mut self) -> Pump {
        let mut message = MSG::default();
        if !unsafe { PeekMessageA(&mut message, None, 0, 0, PM_REMOVE) }.as_bool() {
            return Pump::Idle;
        }

        if message.message == WM_QUIT {
            return Pump::Quit(message.wParam.0 as i32);
        }

        unsafe {
            let _ = TranslateMessage(&message);
            DispatchMessageA(&message);
        }

        Pump::Dispatched
    }
}

/// Offers `raw` to the hook, then to the application unless the hook
/// consumed it.
///
/// The hook is taken out of the state while it runs: it may call Win32
/// functions that send messages straight back into the window procedure,
/// and those nested messages skip the hook.
fn dispatch_message(state: NonNull<WindowState>, raw: RawMessage) -> bool {
    let mut hook = unsafe { (*state.as_ptr()).hook.take() };
    let consumed = hook.as_mut().is_some_and(|hook| hook(&raw));

    // SAFETY: no other reference to the state is live once the hook returns.
    let window = unsafe { &mut *state.as_ptr() };
    if window.hook.is_none() {
        window.hook = hook;
    }

    consumed || window_wndproc(window, raw)
}

fn window_wndproc(window: &mut WindowState, raw: RawMessage) -> bool {
    match raw.message {
        WM_KILLFOCUS => {
            window.input.clear();
            false
        }

        WM_KEYDOWN | WM_KEYUP => {
            let key = raw.wparam.0 as u16;
            if let Some(action) = window.bindings.action(key) {
                window.input.set(action, raw.message == WM_KEYDOWN);
            }
            true
        }

        _ => false,
    }
}

fn on_command(hwnd: HWND, id: u16) -> bool {
    match id {
        IDM_ABOUT => {
            unsafe {
                MessageBoxA(
                    hwnd,
                    s!("Hello Triangle\nDirect3D 11 + Dear ImGui"),
                    s!("About"),
                    MB_OK | MB_ICONINFORMATION,
                )
            };
            true
        }

        IDM_EXIT => {
            if let Err(e) = unsafe { DestroyWindow(hwnd) } {
                log::error!("DestroyWindow: {e}");
            }
            true
        }

        _ => false,
    }
}

extern "system" fn wndproc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match message {
        WM_CREATE => {
            let create_struct: &CREATESTRUCTA = unsafe { &*(lparam.0 as *const CREATESTRUCTA) };
            unsafe { SetWindowLongPtrA(hwnd, GWLP_USERDATA, create_struct.lpCreateParams as _) };
            LRESULT::default()
        }

        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT::default()
        }

        WM_NCDESTROY => {
            unsafe { SetWindowLongPtrA(hwnd, GWLP_USERDATA, 0) };
            unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
        }

        _ => {
            let user_data = unsafe { GetWindowLongPtrA(hwnd, GWLP_USERDATA) };
            let window = NonNull::<WindowState>::new(user_data as _);
            let raw = RawMessage {
                hwnd,
                message,
                wparam,
                lparam,
            };
            let mut handled = window.is_some_and(|w| dispatch_message(w, raw));

            // Handled after the state borrow ends; the about box runs a
            // nested message loop that re-enters this procedure.
            if message == WM_COMMAND {
                handled = on_command(hwnd, (wparam.0 & 0xffff) as u16);
            }

            if handled {
                LRESULT::default()
            } else {
                unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::input::{vk, Action};

    fn state() -> WindowState {
        WindowState {
            bindings: KeyBindings::default(),
            input: InputState::default(),
            hook: None,
        }
    }

    fn key(message: u32, code: u16) -> RawMessage {
        RawMessage {
            hwnd: HWND::default(),
            message,
            wparam: WPARAM(code as usize),
            lparam: LPARAM(0),
        }
    }

    #[test]
    fn key_messages_drive_bound_actions() {
        let mut s = state();
        assert!(window_wndproc(&mut s, key(WM_KEYDOWN, vk::W)));
        assert!(s.input.is_down(Action::MoveUp));
        assert!(window_wndproc(&mut s, key(WM_KEYUP, vk::W)));
        assert!(!s.input.is_down(Action::MoveUp));
    }

    #[test]
    fn unbound_keys_change_nothing() {
        let mut s = state();
        window_wndproc(&mut s, key(WM_KEYDOWN, b'Q' as u16));
        assert_eq!(s.input, InputState::default());
    }

    #[test]
    fn losing_focus_releases_held_actions() {
        let mut s = state();
        window_wndproc(&mut s, key(WM_KEYDOWN, vk::D));
        window_wndproc(&mut s, key(WM_KEYDOWN, vk::UP));
        assert!(!window_wndproc(&mut s, key(WM_KILLFOCUS, 0)));
        assert_eq!(s.input, InputState::default());
    }

    #[test]
    fn hook_sees_message_then_application_handles_it() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut s = state();
        let log = Rc::clone(&seen);
        s.hook = Some(Box::new(move |raw: &RawMessage| {
            log.borrow_mut().push(raw.message);
            false
        }));

        assert!(dispatch_message(NonNull::from(&mut s), key(WM_KEYDOWN, vk::A)));
        assert_eq!(*seen.borrow(), vec![WM_KEYDOWN]);
        assert!(s.input.is_down(Action::MoveLeft));
        assert!(s.hook.is_some());
    }

    #[test]
    fn consumed_messages_skip_the_application() {
        let mut s = state();
        s.hook = Some(Box::new(|_: &RawMessage| true));

        assert!(dispatch_message(NonNull::from(&mut s), key(WM_KEYDOWN, vk::W)));
        assert!(!s.input.is_down(Action::MoveUp));
    }

    #[test]
    fn without_a_hook_messages_go_straight_to_the_application() {
        let mut s = state();
        assert!(dispatch_message(NonNull::from(&mut s), key(WM_KEYDOWN, vk::S)));
        assert!(s.input.is_down(Action::MoveDown));
    }
}
