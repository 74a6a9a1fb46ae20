//! Input listeners and change dispatch
//!
//! The event loop polls a device into a fresh [`InputSnapshot`] and hands it
//! to [`InputDispatcher::dispatch`] together with the previous one. For every
//! poll, listeners see newly pressed keys first, then every held key, then
//! released keys, then a single mouse move if the position changed.

use crate::input::InputSnapshot;
use glyph_core::math::MapPoint;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Keyboard and mouse button callbacks. Every method defaults to a no-op.
pub trait ButtonListener: Send {
    /// `code` went down since the previous poll.
    fn on_pressed(&mut self, _code: u8) {}

    /// `code` went up since the previous poll.
    fn on_released(&mut self, _code: u8) {}

    /// `code` is held at this poll. Fires after `on_pressed` on the first poll.
    fn on_active(&mut self, _code: u8) {}
}

pub trait MouseMoveListener: Send {
    fn on_move(&mut self, position: MapPoint, previous: MapPoint);
}

impl<F> MouseMoveListener for F
where
    F: FnMut(MapPoint, MapPoint) + Send,
{
    fn on_move(&mut self, position: MapPoint, previous: MapPoint) {
        self(position, previous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What one [`InputDispatcher::dispatch`] call delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub pressed: usize,
    pub released: usize,
    pub active: usize,
    pub moved: bool,
}

type ButtonRegistry = Mutex<Vec<(ListenerId, Box<dyn ButtonListener>)>>;
type MoveRegistry = Mutex<Vec<(ListenerId, Box<dyn MouseMoveListener>)>>;

/// Listener registry.
///
/// Registration is safe from any thread. Listeners must not register or
/// unregister from inside their own callbacks.
#[derive(Default)]
pub struct InputDispatcher {
    buttons: ButtonRegistry,
    moves: MoveRegistry,
    next_id: AtomicU64,
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_button_listener(&self, listener: impl ButtonListener + 'static) -> ListenerId {
        let id = self.next_id();
        self.buttons.lock().push((id, Box::new(listener)));
        id
    }

    pub fn add_mouse_listener(&self, listener: impl MouseMoveListener + 'static) -> ListenerId {
        let id = self.next_id();
        self.moves.lock().push((id, Box::new(listener)));
        id
    }

    /// Remove a listener of either kind. Returns `false` if it was unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut buttons = self.buttons.lock();
        let before = buttons.len();
        buttons.retain(|(listener, _)| *listener != id);
        if buttons.len() != before {
            return true;
        }
        drop(buttons);

        let mut moves = self.moves.lock();
        let before = moves.len();
        moves.retain(|(listener, _)| *listener != id);
        moves.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.buttons.lock().len() + self.moves.lock().len()
    }

    /// Deliver the difference between `previous` and `current`.
    pub fn dispatch(&self, previous: &InputSnapshot, current: &InputSnapshot) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        let pressed: Vec<u8> = current
            .down_codes()
            .filter(|&code| !previous.is_down(code))
            .collect();
        let active: Vec<u8> = current.down_codes().collect();
        let released: Vec<u8> = previous
            .down_codes()
            .filter(|&code| !current.is_down(code))
            .collect();

        if !(pressed.is_empty() && active.is_empty() && released.is_empty()) {
            let mut buttons = self.buttons.lock();
            for (_, listener) in buttons.iter_mut() {
                for &code in &pressed {
                    listener.on_pressed(code);
                }
                for &code in &active {
                    listener.on_active(code);
                }
                for &code in &released {
                    listener.on_released(code);
                }
            }
            summary.pressed = pressed.len();
            summary.active = active.len();
            summary.released = released.len();
        }

        if current.mouse() != previous.mouse() {
            for (_, listener) in self.moves.lock().iter_mut() {
                listener.on_move(current.mouse(), previous.mouse());
            }
            summary.moved = true;
        }
        summary
    }
}

impl fmt::Debug for InputDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDispatcher")
            .field("buttons", &self.buttons.lock().len())
            .field("moves", &self.moves.lock().len())
            .finish()
    }
}
