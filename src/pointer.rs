//! Pointer state machine: normalized motion, buttons, wheel and
//! double-click detection.

use crate::events::{ButtonMask, InputEventKind, InputQueue, Modifiers, MouseButton, Point};
use log::warn;
use wayland_client::protocol::{
    wl_pointer::{Axis, WlPointer},
    wl_surface::WlSurface,
};

const DOUBLE_CLICK_WINDOW_MS: u32 = 400;
const DOUBLE_CLICK_RADIUS: f64 = 5.0;

/// Protocol-side pointer resources. Created when the seat grants the pointer
/// capability and dropped when it is revoked.
pub(crate) struct Pointer {
    pub(crate) wl_pointer: WlPointer,
    pub(crate) cursor_surface: WlSurface,
    pub(crate) enter_serial: u32,
    pub(crate) input: PointerInput,
}

impl Pointer {
    pub(crate) fn new(wl_pointer: WlPointer, cursor_surface: WlSurface) -> Pointer {
        Pointer {
            wl_pointer,
            cursor_surface,
            enter_serial: 0,
            input: PointerInput::default(),
        }
    }
}

/// Derived pointer state, independent of any protocol object.
#[derive(Default)]
pub(crate) struct PointerInput {
    pos: Point,
    speed: (f64, f64),
    last_motion_time: u32,
    button_mask: ButtonMask,
    last_click_pos: Point,
    last_click_time: u32,
}

impl PointerInput {
    pub(crate) fn position(&self) -> Point {
        self.pos
    }

    pub(crate) fn button_mask(&self) -> ButtonMask {
        self.button_mask
    }

    /// Moves the tracked position without emitting an event. Used on pointer
    /// enter, which is not a tracked input event.
    pub(crate) fn set_position(&mut self, x: i32, y: i32) {
        self.pos = Point { x, y };
    }

    pub(crate) fn motion(
        &mut self,
        time: u32,
        x: i32,
        y: i32,
        modifiers: Modifiers,
        queue: &mut InputQueue,
    ) {
        let pos = Point { x, y };
        let rel = Point {
            x: pos.x - self.pos.x,
            y: pos.y - self.pos.y,
        };
        // the event carries the speed accumulated up to the previous motion
        queue.push_event(
            modifiers,
            InputEventKind::MouseMotion {
                position: pos,
                global_position: pos,
                relative: rel,
                speed: self.speed,
                button_mask: self.button_mask,
            },
        );

        let elapsed = time.wrapping_sub(self.last_motion_time);
        if elapsed > 0 && elapsed < 1000 {
            self.speed = (
                f64::from(rel.x) * 1000.0 / f64::from(elapsed),
                f64::from(rel.y) * 1000.0 / f64::from(elapsed),
            );
        } else {
            self.speed = (0.0, 0.0);
        }
        self.pos = pos;
        self.last_motion_time = time;
    }

    pub(crate) fn button(
        &mut self,
        time: u32,
        raw: u32,
        pressed: bool,
        modifiers: Modifiers,
        queue: &mut InputQueue,
    ) {
        let Some(button) = MouseButton::from_raw(raw) else {
            warn!("pointer button {raw:#x} is not supported");
            return;
        };

        if let Some(bit) = button.mask_bit() {
            self.button_mask.set(bit, pressed);
        }

        let mut double_click = false;
        if pressed && button == MouseButton::Left {
            let elapsed = time.wrapping_sub(self.last_click_time);
            let distance = self.last_click_pos.distance_to(self.pos);
            if elapsed < DOUBLE_CLICK_WINDOW_MS && distance < DOUBLE_CLICK_RADIUS {
                double_click = true;
            }
            self.last_click_pos = self.pos;
            self.last_click_time = time;
        }

        queue.push_event(
            modifiers,
            InputEventKind::MouseButton {
                position: self.pos,
                global_position: self.pos,
                button_index: button.index(),
                button_mask: self.button_mask,
                pressed,
                double_click,
            },
        );
    }

    /// A wheel tick is modeled as an instantaneous press+release pair of a
    /// synthetic button. Only the vertical axis is supported.
    pub(crate) fn axis(
        &mut self,
        axis: Axis,
        value: f64,
        modifiers: Modifiers,
        queue: &mut InputQueue,
    ) {
        if axis != Axis::VerticalScroll {
            warn!("pointer axis {axis:?} is not supported");
            return;
        }
        let button = if value > 0.0 {
            MouseButton::WheelDown
        } else if value < 0.0 {
            MouseButton::WheelUp
        } else {
            return;
        };
        for pressed in [true, false] {
            queue.push_event(
                modifiers,
                InputEventKind::MouseButton {
                    position: self.pos,
                    global_position: self.pos,
                    button_index: button.index(),
                    button_mask: self.button_mask,
                    pressed,
                    double_click: false,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTN_LEFT: u32 = 0x110;
    const BTN_RIGHT: u32 = 0x111;
    const BTN_MIDDLE: u32 = 0x112;

    fn press_release_sequence(events: &[(u32, bool)]) -> ButtonMask {
        let mut input = PointerInput::default();
        let mut queue = InputQueue::default();
        for (i, &(raw, pressed)) in events.iter().enumerate() {
            input.button(i as u32, raw, pressed, Modifiers::empty(), &mut queue);
        }
        input.button_mask()
    }

    #[test]
    fn test_mask_tracks_last_state_per_button() {
        #[track_caller]
        fn check(events: &[(u32, bool)], expected: ButtonMask) {
            assert_eq!(press_release_sequence(events), expected);
        }

        check(&[(BTN_LEFT, true)], ButtonMask::LEFT);
        check(&[(BTN_LEFT, true), (BTN_LEFT, false)], ButtonMask::empty());
        check(
            &[(BTN_LEFT, true), (BTN_RIGHT, true), (BTN_MIDDLE, true)],
            ButtonMask::LEFT | ButtonMask::RIGHT | ButtonMask::MIDDLE,
        );
        check(
            &[(BTN_LEFT, true), (BTN_RIGHT, true), (BTN_LEFT, false)],
            ButtonMask::RIGHT,
        );
        // untracked buttons never touch the mask
        check(&[(0x113, true), (BTN_MIDDLE, true)], ButtonMask::MIDDLE);
    }

    #[test]
    fn test_unmapped_button_emits_nothing() {
        let mut input = PointerInput::default();
        let mut queue = InputQueue::default();
        input.button(10, 0x113, true, Modifiers::empty(), &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_double_click_window_and_radius_are_strict() {
        #[track_caller]
        fn check(dt: u32, offset: i32, expected: bool) {
            let mut input = PointerInput::default();
            let mut queue = InputQueue::default();
            input.set_position(100, 100);
            input.button(1000, BTN_LEFT, true, Modifiers::empty(), &mut queue);
            input.button(1000, BTN_LEFT, false, Modifiers::empty(), &mut queue);
            input.set_position(100 + offset, 100);
            input.button(1000 + dt, BTN_LEFT, true, Modifiers::empty(), &mut queue);
            let last = std::iter::from_fn(|| queue.poll()).last().unwrap();
            match last.kind {
                InputEventKind::MouseButton { double_click, .. } => {
                    assert_eq!(double_click, expected);
                }
                _ => panic!("expected a button event"),
            }
        }

        check(399, 4, true);
        check(400, 4, false); // exactly 400 ms: not a double click
        check(399, 5, false); // exactly 5 px: not a double click
        check(400, 5, false);
        check(50, 0, true);
    }

    #[test]
    fn test_left_press_always_updates_click_anchor() {
        let mut input = PointerInput::default();
        let mut queue = InputQueue::default();
        input.set_position(0, 0);
        input.button(1000, BTN_LEFT, true, Modifiers::empty(), &mut queue);
        input.set_position(500, 0);
        // far away: not a double click, but the anchor moves here
        input.button(1100, BTN_LEFT, true, Modifiers::empty(), &mut queue);
        input.button(1200, BTN_LEFT, true, Modifiers::empty(), &mut queue);
        let last = std::iter::from_fn(|| queue.poll()).last().unwrap();
        assert!(matches!(
            last.kind,
            InputEventKind::MouseButton {
                double_click: true,
                ..
            }
        ));
    }

    #[test]
    fn test_axis_emits_press_release_pair() {
        #[track_caller]
        fn check(axis: Axis, value: f64, expected: Option<MouseButton>) {
            let mut input = PointerInput::default();
            let mut queue = InputQueue::default();
            input.axis(axis, value, Modifiers::empty(), &mut queue);
            match expected {
                None => assert!(queue.is_empty()),
                Some(button) => {
                    assert_eq!(queue.len(), 2);
                    for expect_pressed in [true, false] {
                        match queue.poll().unwrap().kind {
                            InputEventKind::MouseButton {
                                button_index,
                                pressed,
                                ..
                            } => {
                                assert_eq!(button_index, button.index());
                                assert_eq!(pressed, expect_pressed);
                            }
                            _ => panic!("expected a button event"),
                        }
                    }
                }
            }
        }

        check(Axis::VerticalScroll, 10.0, Some(MouseButton::WheelDown));
        check(Axis::VerticalScroll, -10.0, Some(MouseButton::WheelUp));
        check(Axis::VerticalScroll, 0.0, None);
        check(Axis::HorizontalScroll, 10.0, None);
    }

    #[test]
    fn test_motion_reports_previous_speed() {
        let mut input = PointerInput::default();
        let mut queue = InputQueue::default();
        input.motion(100, 10, 0, Modifiers::empty(), &mut queue);
        input.motion(200, 30, 0, Modifiers::empty(), &mut queue);

        let first = queue.poll().unwrap();
        match first.kind {
            InputEventKind::MouseMotion {
                position,
                global_position,
                relative,
                speed,
                ..
            } => {
                assert_eq!(position, Point { x: 10, y: 0 });
                assert_eq!(global_position, position);
                assert_eq!(relative, Point { x: 10, y: 0 });
                assert_eq!(speed, (0.0, 0.0));
            }
            _ => panic!("expected a motion event"),
        }
        let second = queue.poll().unwrap();
        match second.kind {
            InputEventKind::MouseMotion {
                relative, speed, ..
            } => {
                assert_eq!(relative, Point { x: 20, y: 0 });
                // accumulated from the first motion: 10 px over 100 ms
                assert_eq!(speed, (100.0, 0.0));
            }
            _ => panic!("expected a motion event"),
        }
    }
}
