//! Logical input actions decoupled from physical keys.
//!
//! The window host translates virtual-key codes into [`Action`]s through
//! [`KeyBindings`]; everything downstream only looks at [`InputState`].

use std::collections::HashMap;

/// Win32 virtual-key codes used by the default bindings.
pub mod vk {
    pub const CONTROL: u16 = 0x11;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const A: u16 = b'A' as u16;
    pub const D: u16 = b'D' as u16;
    pub const S: u16 = b'S' as u16;
    pub const W: u16 = b'W' as u16;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ScaleUp,
    ScaleDown,
    ScaleLeft,
    ScaleRight,
    RotateClockwise,
    RotateCounterClockwise,
    Exit,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::MoveUp,
        Action::MoveDown,
        Action::MoveLeft,
        Action::MoveRight,
        Action::ScaleUp,
        Action::ScaleDown,
        Action::ScaleLeft,
        Action::ScaleRight,
        Action::RotateClockwise,
        Action::RotateCounterClockwise,
        Action::Exit,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBindings {
    keys: HashMap<u16, Action>,
}

impl Default for KeyBindings {
    /// WASD moves, the arrow keys scale, Space/Ctrl rotate, Esc exits.
    fn default() -> Self {
        let mut bindings = Self::empty();
        bindings.bind(vk::W, Action::MoveUp);
        bindings.bind(vk::S, Action::MoveDown);
        bindings.bind(vk::A, Action::MoveLeft);
        bindings.bind(vk::D, Action::MoveRight);
        bindings.bind(vk::UP, Action::ScaleUp);
        bindings.bind(vk::DOWN, Action::ScaleDown);
        bindings.bind(vk::LEFT, Action::ScaleLeft);
        bindings.bind(vk::RIGHT, Action::ScaleRight);
        bindings.bind(vk::SPACE, Action::RotateClockwise);
        bindings.bind(vk::CONTROL, Action::RotateCounterClockwise);
        bindings.bind(vk::ESCAPE, Action::Exit);
        bindings
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Binds `key` to `action`, returning the action it replaces.
    pub fn bind(&mut self, key: u16, action: Action) -> Option<Action> {
        self.keys.insert(key, action)
    }

    pub fn action(&self, key: u16) -> Option<Action> {
        self.keys.get(&key).copied()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    down: [bool; Action::ALL.len()],
}

impl InputState {
    pub fn press(&mut self, action: Action) {
        self.down[action.index()] = true;
    }

    pub fn release(&mut self, action: Action) {
        self.down[action.index()] = false;
    }

    pub fn set(&mut self, action: Action, down: bool) {
        self.down[action.index()] = down;
    }

    pub fn is_down(&self, action: Action) -> bool {
        self.down[action.index()]
    }

    /// `1.0` when only `positive` is held, `-1.0` when only `negative` is,
    /// `0.0` otherwise.
    pub fn axis(&self, positive: Action, negative: Action) -> f32 {
        let mut value = 0.0;
        if self.is_down(positive) {
            value += 1.0;
        }
        if self.is_down(negative) {
            value -= 1.0;
        }
        value
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_bindings_match_demo_layout() {
        let b = KeyBindings::default();
        assert_eq!(b.action(vk::W), Some(Action::MoveUp));
        assert_eq!(b.action(vk::D), Some(Action::MoveRight));
        assert_eq!(b.action(vk::UP), Some(Action::ScaleUp));
        assert_eq!(b.action(vk::LEFT), Some(Action::ScaleLeft));
        assert_eq!(b.action(vk::SPACE), Some(Action::RotateClockwise));
        assert_eq!(b.action(vk::ESCAPE), Some(Action::Exit));
        assert_eq!(b.action(b'Q' as u16), None);
    }

    #[test]
    fn rebinding_replaces_previous_action() {
        let mut b = KeyBindings::default();
        assert_eq!(b.bind(vk::UP, Action::MoveUp), Some(Action::ScaleUp));
        assert_eq!(b.action(vk::UP), Some(Action::MoveUp));
        assert_eq!(b.action(vk::W), Some(Action::MoveUp));
    }

    #[test]
    fn press_and_release_are_idempotent() {
        let mut input = InputState::default();
        input.press(Action::MoveLeft);
        input.press(Action::MoveLeft);
        assert!(input.is_down(Action::MoveLeft));
        input.release(Action::MoveLeft);
        assert!(!input.is_down(Action::MoveLeft));
        input.release(Action::MoveLeft);
        assert_eq!(input, InputState::default());
    }

    #[test]
    fn opposing_actions_cancel_on_an_axis() {
        let mut input = InputState::default();
        assert_eq!(input.axis(Action::MoveRight, Action::MoveLeft), 0.0);
        input.press(Action::MoveRight);
        assert_eq!(input.axis(Action::MoveRight, Action::MoveLeft), 1.0);
        input.press(Action::MoveLeft);
        assert_eq!(input.axis(Action::MoveRight, Action::MoveLeft), 0.0);
        input.release(Action::MoveRight);
        assert_eq!(input.axis(Action::MoveRight, Action::MoveLeft), -1.0);
    }

    #[test]
    fn every_action_has_its_own_slot() {
        let mut input = InputState::default();
        for action in Action::ALL {
            input.press(action);
        }
        assert!(Action::ALL.iter().all(|a| input.is_down(*a)));
        input.clear();
        assert!(Action::ALL.iter().all(|a| !input.is_down(*a)));
    }
}
