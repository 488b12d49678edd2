//! Normalized input events and the queue the engine drains them from.
//!
//! Every state machine in this crate reports input by pushing an
//! [`InputEvent`] into an [`InputQueue`]. The queue assigns each event a
//! monotonically increasing id, so the order the engine observes is exactly
//! the order the events were produced in.

use bitflags::bitflags;
use std::collections::VecDeque;

bitflags! {
    /// Modifier snapshot carried by every event. Only shift, control, alt
    /// and meta are tracked; lock keys and layout groups are not exposed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

bitflags! {
    /// Currently-pressed tracked mouse buttons. Wheel ticks and unmapped
    /// buttons never set a bit here.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ButtonMask: u32 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
}

impl MouseButton {
    pub(crate) fn from_raw(code: u32) -> Option<MouseButton> {
        const BTN_LEFT: u32 = 0x110;
        const BTN_RIGHT: u32 = 0x111;
        const BTN_MIDDLE: u32 = 0x112;

        match code {
            BTN_LEFT => Some(MouseButton::Left),
            BTN_RIGHT => Some(MouseButton::Right),
            BTN_MIDDLE => Some(MouseButton::Middle),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Right => 2,
            MouseButton::Middle => 3,
            MouseButton::WheelUp => 4,
            MouseButton::WheelDown => 5,
        }
    }

    pub(crate) fn mask_bit(self) -> Option<ButtonMask> {
        match self {
            MouseButton::Left => Some(ButtonMask::LEFT),
            MouseButton::Right => Some(ButtonMask::RIGHT),
            MouseButton::Middle => Some(ButtonMask::MIDDLE),
            MouseButton::WheelUp | MouseButton::WheelDown => None,
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputEvent {
    pub id: u32,
    pub device: u32,
    pub modifiers: Modifiers,
    pub kind: InputEventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEventKind {
    MouseMotion {
        position: Point,
        /// Identical to `position`; the protocol has no multi-surface
        /// global coordinate space.
        global_position: Point,
        relative: Point,
        speed: (f64, f64),
        button_mask: ButtonMask,
    },
    MouseButton {
        position: Point,
        global_position: Point,
        button_index: u32,
        button_mask: ButtonMask,
        pressed: bool,
        double_click: bool,
    },
    Key {
        scancode: u32,
        unicode: u32,
        pressed: bool,
        /// Synthesized by the repeat timer rather than a fresh hardware press.
        echo: bool,
    },
}

/// FIFO queue of normalized events. `push_event` never blocks.
#[derive(Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    next_id: u32,
}

impl InputQueue {
    pub fn push_event(&mut self, modifiers: Modifiers, kind: InputEventKind) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.events.push_back(InputEvent {
            id,
            device: 0,
            modifiers,
            kind,
        });
    }

    pub fn poll(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_order_and_ids() {
        let mut queue = InputQueue::default();
        for scancode in [1, 2, 3] {
            queue.push_event(
                Modifiers::empty(),
                InputEventKind::Key {
                    scancode,
                    unicode: 0,
                    pressed: true,
                    echo: false,
                },
            );
        }
        let first = queue.poll().unwrap();
        let second = queue.poll().unwrap();
        let third = queue.poll().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(third.id, 2);
        assert!(matches!(
            first.kind,
            InputEventKind::Key { scancode: 1, .. }
        ));
        assert!(matches!(
            third.kind,
            InputEventKind::Key { scancode: 3, .. }
        ));
        assert!(queue.poll().is_none());
    }

    #[test]
    fn test_button_mapping() {
        #[track_caller]
        fn check(code: u32, expected: Option<MouseButton>) {
            assert_eq!(MouseButton::from_raw(code), expected);
        }

        check(0x110, Some(MouseButton::Left));
        check(0x111, Some(MouseButton::Right));
        check(0x112, Some(MouseButton::Middle));
        check(0x113, None);
        check(0, None);
    }

    #[test]
    fn test_wheel_buttons_have_no_mask_bit() {
        assert_eq!(MouseButton::Left.mask_bit(), Some(ButtonMask::LEFT));
        assert_eq!(MouseButton::WheelUp.mask_bit(), None);
        assert_eq!(MouseButton::WheelDown.mask_bit(), None);
    }
}
