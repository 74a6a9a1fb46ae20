//! Input devices and polled input state

use glyph_core::math::MapPoint;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Virtual key codes understood by [`InputSnapshot`].
pub mod keys {
    /// Number of tracked key codes; valid codes are `0..COUNT`.
    pub const COUNT: usize = 223;

    // Mouse buttons
    pub const MOUSE_LEFT: u8 = 1;
    pub const MOUSE_RIGHT: u8 = 2;
    pub const MOUSE_MIDDLE: u8 = 4;

    // Letters
    pub const A: u8 = 65;
    pub const B: u8 = 66;
    pub const C: u8 = 67;
    pub const D: u8 = 68;
    pub const E: u8 = 69;
    pub const F: u8 = 70;
    pub const G: u8 = 71;
    pub const H: u8 = 72;
    pub const I: u8 = 73;
    pub const J: u8 = 74;
    pub const K: u8 = 75;
    pub const L: u8 = 76;
    pub const M: u8 = 77;
    pub const N: u8 = 78;
    pub const O: u8 = 79;
    pub const P: u8 = 80;
    pub const Q: u8 = 81;
    pub const R: u8 = 82;
    pub const S: u8 = 83;
    pub const T: u8 = 84;
    pub const U: u8 = 85;
    pub const V: u8 = 86;
    pub const W: u8 = 87;
    pub const X: u8 = 88;
    pub const Y: u8 = 89;
    pub const Z: u8 = 90;

    // Main row digits
    pub const MAIN_0: u8 = 48;
    pub const MAIN_1: u8 = 49;
    pub const MAIN_2: u8 = 50;
    pub const MAIN_3: u8 = 51;
    pub const MAIN_4: u8 = 52;
    pub const MAIN_5: u8 = 53;
    pub const MAIN_6: u8 = 54;
    pub const MAIN_7: u8 = 55;
    pub const MAIN_8: u8 = 56;
    pub const MAIN_9: u8 = 57;

    // Keypad digits
    pub const NUM_0: u8 = 96;
    pub const NUM_1: u8 = 97;
    pub const NUM_2: u8 = 98;
    pub const NUM_3: u8 = 99;
    pub const NUM_4: u8 = 100;
    pub const NUM_5: u8 = 101;
    pub const NUM_6: u8 = 102;
    pub const NUM_7: u8 = 103;
    pub const NUM_8: u8 = 104;
    pub const NUM_9: u8 = 105;

    /// `F1` through `F24` are consecutive.
    pub const fn function(n: u8) -> u8 {
        F1 + n - 1
    }

    pub const F1: u8 = 112;
    pub const F2: u8 = 113;
    pub const F3: u8 = 114;
    pub const F4: u8 = 115;
    pub const F5: u8 = 116;
    pub const F6: u8 = 117;
    pub const F7: u8 = 118;
    pub const F8: u8 = 119;
    pub const F9: u8 = 120;
    pub const F10: u8 = 121;
    pub const F11: u8 = 122;
    pub const F12: u8 = 123;
    pub const F24: u8 = 135;

    // Main keyboard punctuation, named by the unshifted symbol
    pub const BACK_QUOTE: u8 = 192;
    pub const MAIN_MINUS: u8 = 189;
    pub const EQUAL: u8 = 187;
    pub const BRACKET_LEFT: u8 = 219;
    pub const BRACKET_RIGHT: u8 = 221;
    pub const SEMICOLON: u8 = 186;
    pub const QUOTE: u8 = 222;
    pub const BACKSLASH: u8 = 220;
    pub const COMMA: u8 = 188;
    pub const MAIN_POINT: u8 = 190;
    pub const MAIN_SLASH: u8 = 191;

    // Keypad punctuation
    pub const NUM_POINT: u8 = 110;
    pub const NUM_SLASH: u8 = 111;
    pub const NUM_MULTIPLY: u8 = 106;
    pub const NUM_PLUS: u8 = 107;
    pub const NUM_MINUS: u8 = 109;

    // Control keys
    pub const BACKSPACE: u8 = 8;
    pub const TAB: u8 = 9;
    pub const ENTER: u8 = 13;
    pub const SHIFT: u8 = 16;
    pub const CTRL: u8 = 17;
    pub const ALT: u8 = 18;
    pub const PAUSE: u8 = 19;
    pub const CAPS_LOCK: u8 = 20;
    pub const ESC: u8 = 27;
    pub const SPACE: u8 = 32;
    pub const PAGE_UP: u8 = 33;
    pub const PAGE_DOWN: u8 = 34;
    pub const END: u8 = 35;
    pub const HOME: u8 = 36;
    pub const LEFT: u8 = 37;
    pub const UP: u8 = 38;
    pub const RIGHT: u8 = 39;
    pub const DOWN: u8 = 40;
    pub const PRINT_SCREEN: u8 = 44;
    pub const INSERT: u8 = 45;
    pub const DELETE: u8 = 46;
    pub const WIN: u8 = 91;
    pub const MENU: u8 = 93;
    pub const NUM_LOCK: u8 = 144;
    pub const SCROLL_LOCK: u8 = 145;
}

/// Key and mouse state at one poll.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    keys: [bool; keys::COUNT],
    mouse: MapPoint,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self {
            keys: [false; keys::COUNT],
            mouse: MapPoint::ORIGIN,
        }
    }

    /// Whether `code` is held. Unknown codes read as released.
    pub fn is_down(&self, code: u8) -> bool {
        self.keys.get(code as usize).copied().unwrap_or(false)
    }

    /// Ignored for codes outside `0..keys::COUNT`.
    pub fn set(&mut self, code: u8, down: bool) {
        if let Some(key) = self.keys.get_mut(code as usize) {
            *key = down;
        }
    }

    pub fn press(mut self, code: u8) -> Self {
        self.set(code, true);
        self
    }

    /// Codes currently held, ascending.
    pub fn down_codes(&self) -> impl Iterator<Item = u8> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(code, _)| code as u8)
    }

    /// Mouse position in grid cells.
    pub fn mouse(&self) -> MapPoint {
        self.mouse
    }

    pub fn set_mouse(&mut self, position: MapPoint) {
        self.mouse = position;
    }

    pub fn with_mouse(mut self, position: MapPoint) -> Self {
        self.mouse = position;
        self
    }

    pub fn release_all(&mut self) {
        self.keys = [false; keys::COUNT];
    }
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InputSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSnapshot")
            .field("down", &self.down_codes().collect::<Vec<_>>())
            .field("mouse", &self.mouse)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input device disconnected")]
    Disconnected,

    #[error("input device failure: {0}")]
    Device(String),
}

/// Source of polled input.
pub trait InputDevice: Send {
    /// Overwrite `snapshot` with the current key and mouse state.
    fn poll(&mut self, snapshot: &mut InputSnapshot) -> Result<(), InputError>;
}

/// Device with nothing attached: no keys, mouse at the origin.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputDevice for NullInput {
    fn poll(&mut self, snapshot: &mut InputSnapshot) -> Result<(), InputError> {
        *snapshot = InputSnapshot::new();
        Ok(())
    }
}

/// Replays queued snapshots, one per poll, then holds the last one.
///
/// Frames can be queued from another thread through [`ScriptedInput::script`].
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: Arc<Mutex<VecDeque<InputSnapshot>>>,
    current: InputSnapshot,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames(frames: impl IntoIterator<Item = InputSnapshot>) -> Self {
        let input = Self::new();
        input.frames.lock().extend(frames);
        input
    }

    /// Shared handle for queuing more frames.
    pub fn script(&self) -> InputScript {
        InputScript {
            frames: Arc::clone(&self.frames),
        }
    }
}

impl InputDevice for ScriptedInput {
    fn poll(&mut self, snapshot: &mut InputSnapshot) -> Result<(), InputError> {
        if let Some(next) = self.frames.lock().pop_front() {
            self.current = next;
        }
        *snapshot = self.current;
        Ok(())
    }
}

/// Producer side of a [`ScriptedInput`].
#[derive(Debug, Clone)]
pub struct InputScript {
    frames: Arc<Mutex<VecDeque<InputSnapshot>>>,
}

impl InputScript {
    pub fn push(&self, frame: InputSnapshot) {
        self.frames.lock().push_back(frame);
    }

    /// Frames not yet polled.
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}
