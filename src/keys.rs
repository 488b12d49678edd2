//! Engine key constants and the keysym translation table.
//!
//! Raw protocol key codes are offset by 8 relative to the keysym table, so
//! every xkb lookup uses `raw + 8` and the fallback scancode for a keysym
//! missing from the table is `raw + 8` as well.

use crate::events::Modifiers;
use xkbcommon::xkb::keysyms;

const SPECIAL: u32 = 1 << 24;

pub const ESCAPE: u32 = SPECIAL | 0x01;
pub const TAB: u32 = SPECIAL | 0x02;
pub const BACKTAB: u32 = SPECIAL | 0x03;
pub const BACKSPACE: u32 = SPECIAL | 0x04;
pub const ENTER: u32 = SPECIAL | 0x05;
pub const KP_ENTER: u32 = SPECIAL | 0x06;
pub const INSERT: u32 = SPECIAL | 0x07;
pub const DELETE: u32 = SPECIAL | 0x08;
pub const PAUSE: u32 = SPECIAL | 0x09;
pub const PRINT: u32 = SPECIAL | 0x0a;
pub const SYSREQ: u32 = SPECIAL | 0x0b;
pub const CLEAR: u32 = SPECIAL | 0x0c;
pub const HOME: u32 = SPECIAL | 0x0d;
pub const END: u32 = SPECIAL | 0x0e;
pub const LEFT: u32 = SPECIAL | 0x0f;
pub const UP: u32 = SPECIAL | 0x10;
pub const RIGHT: u32 = SPECIAL | 0x11;
pub const DOWN: u32 = SPECIAL | 0x12;
pub const PAGE_UP: u32 = SPECIAL | 0x13;
pub const PAGE_DOWN: u32 = SPECIAL | 0x14;
pub const SHIFT: u32 = SPECIAL | 0x15;
pub const CONTROL: u32 = SPECIAL | 0x16;
pub const META: u32 = SPECIAL | 0x17;
pub const ALT: u32 = SPECIAL | 0x18;
pub const CAPS_LOCK: u32 = SPECIAL | 0x19;
pub const NUM_LOCK: u32 = SPECIAL | 0x1a;
pub const SCROLL_LOCK: u32 = SPECIAL | 0x1b;
pub const F1: u32 = SPECIAL | 0x1c;
pub const F2: u32 = SPECIAL | 0x1d;
pub const F3: u32 = SPECIAL | 0x1e;
pub const F4: u32 = SPECIAL | 0x1f;
pub const F5: u32 = SPECIAL | 0x20;
pub const F6: u32 = SPECIAL | 0x21;
pub const F7: u32 = SPECIAL | 0x22;
pub const F8: u32 = SPECIAL | 0x23;
pub const F9: u32 = SPECIAL | 0x24;
pub const F10: u32 = SPECIAL | 0x25;
pub const F11: u32 = SPECIAL | 0x26;
pub const F12: u32 = SPECIAL | 0x27;
pub const MENU: u32 = SPECIAL | 0x28;
pub const HELP: u32 = SPECIAL | 0x29;
pub const KP_MULTIPLY: u32 = SPECIAL | 0x81;
pub const KP_DIVIDE: u32 = SPECIAL | 0x82;
pub const KP_SUBTRACT: u32 = SPECIAL | 0x83;
pub const KP_PERIOD: u32 = SPECIAL | 0x84;
pub const KP_ADD: u32 = SPECIAL | 0x85;
pub const KP_0: u32 = SPECIAL | 0x86;
pub const KP_1: u32 = SPECIAL | 0x87;
pub const KP_2: u32 = SPECIAL | 0x88;
pub const KP_3: u32 = SPECIAL | 0x89;
pub const KP_4: u32 = SPECIAL | 0x8a;
pub const KP_5: u32 = SPECIAL | 0x8b;
pub const KP_6: u32 = SPECIAL | 0x8c;
pub const KP_7: u32 = SPECIAL | 0x8d;
pub const KP_8: u32 = SPECIAL | 0x8e;
pub const KP_9: u32 = SPECIAL | 0x8f;

/// Scancode for a keysym resolved against the active keymap, falling back
/// to `raw + 8` when the keysym is not in the table.
pub(crate) fn scancode_from_parts(sym: u32, raw: u32) -> u32 {
    keysym_to_scancode(sym).unwrap_or(raw + 8)
}

/// Modifier flag toggled directly by a key event, if the scancode is one of
/// the four tracked modifiers.
pub(crate) fn modifier_flag(scancode: u32) -> Option<Modifiers> {
    match scancode {
        SHIFT => Some(Modifiers::SHIFT),
        CONTROL => Some(Modifiers::CTRL),
        ALT => Some(Modifiers::ALT),
        META => Some(Modifiers::META),
        _ => None,
    }
}

fn keysym_to_scancode(sym: u32) -> Option<u32> {
    match sym {
        keysyms::KEY_Escape => Some(ESCAPE),
        keysyms::KEY_Tab => Some(TAB),
        keysyms::KEY_ISO_Left_Tab => Some(BACKTAB),
        keysyms::KEY_BackSpace => Some(BACKSPACE),
        keysyms::KEY_Return => Some(ENTER),
        keysyms::KEY_KP_Enter => Some(KP_ENTER),
        keysyms::KEY_Insert => Some(INSERT),
        keysyms::KEY_Delete => Some(DELETE),
        keysyms::KEY_Pause => Some(PAUSE),
        keysyms::KEY_Print => Some(PRINT),
        keysyms::KEY_Sys_Req => Some(SYSREQ),
        keysyms::KEY_Clear => Some(CLEAR),
        keysyms::KEY_Home => Some(HOME),
        keysyms::KEY_End => Some(END),
        keysyms::KEY_Left => Some(LEFT),
        keysyms::KEY_Up => Some(UP),
        keysyms::KEY_Right => Some(RIGHT),
        keysyms::KEY_Down => Some(DOWN),
        keysyms::KEY_Prior => Some(PAGE_UP),
        keysyms::KEY_Next => Some(PAGE_DOWN),
        keysyms::KEY_Shift_L | keysyms::KEY_Shift_R => Some(SHIFT),
        keysyms::KEY_Control_L | keysyms::KEY_Control_R => Some(CONTROL),
        keysyms::KEY_Alt_L | keysyms::KEY_Alt_R => Some(ALT),
        keysyms::KEY_Super_L
        | keysyms::KEY_Super_R
        | keysyms::KEY_Meta_L
        | keysyms::KEY_Meta_R => Some(META),
        keysyms::KEY_Caps_Lock => Some(CAPS_LOCK),
        keysyms::KEY_Num_Lock => Some(NUM_LOCK),
        keysyms::KEY_Scroll_Lock => Some(SCROLL_LOCK),
        keysyms::KEY_F1 => Some(F1),
        keysyms::KEY_F2 => Some(F2),
        keysyms::KEY_F3 => Some(F3),
        keysyms::KEY_F4 => Some(F4),
        keysyms::KEY_F5 => Some(F5),
        keysyms::KEY_F6 => Some(F6),
        keysyms::KEY_F7 => Some(F7),
        keysyms::KEY_F8 => Some(F8),
        keysyms::KEY_F9 => Some(F9),
        keysyms::KEY_F10 => Some(F10),
        keysyms::KEY_F11 => Some(F11),
        keysyms::KEY_F12 => Some(F12),
        keysyms::KEY_Menu => Some(MENU),
        keysyms::KEY_Help => Some(HELP),
        keysyms::KEY_KP_Multiply => Some(KP_MULTIPLY),
        keysyms::KEY_KP_Divide => Some(KP_DIVIDE),
        keysyms::KEY_KP_Subtract => Some(KP_SUBTRACT),
        keysyms::KEY_KP_Decimal => Some(KP_PERIOD),
        keysyms::KEY_KP_Add => Some(KP_ADD),
        keysyms::KEY_KP_0 | keysyms::KEY_KP_Insert => Some(KP_0),
        keysyms::KEY_KP_1 | keysyms::KEY_KP_End => Some(KP_1),
        keysyms::KEY_KP_2 | keysyms::KEY_KP_Down => Some(KP_2),
        keysyms::KEY_KP_3 | keysyms::KEY_KP_Next => Some(KP_3),
        keysyms::KEY_KP_4 | keysyms::KEY_KP_Left => Some(KP_4),
        keysyms::KEY_KP_5 | keysyms::KEY_KP_Begin => Some(KP_5),
        keysyms::KEY_KP_6 | keysyms::KEY_KP_Right => Some(KP_6),
        keysyms::KEY_KP_7 | keysyms::KEY_KP_Home => Some(KP_7),
        keysyms::KEY_KP_8 | keysyms::KEY_KP_Up => Some(KP_8),
        keysyms::KEY_KP_9 | keysyms::KEY_KP_Prior => Some(KP_9),
        // printable ASCII keysyms are their own codepoint; letters map to
        // the uppercase engine constant
        0x20..=0x7e => Some(u32::from((sym as u8).to_ascii_uppercase())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_hits() {
        #[track_caller]
        fn check(sym: u32, expected: u32) {
            assert_eq!(keysym_to_scancode(sym), Some(expected));
        }

        check(keysyms::KEY_Escape, ESCAPE);
        check(keysyms::KEY_Prior, PAGE_UP);
        check(keysyms::KEY_Shift_L, SHIFT);
        check(keysyms::KEY_Shift_R, SHIFT);
        check(keysyms::KEY_Super_L, META);
        check(keysyms::KEY_KP_Insert, KP_0);
        check(keysyms::KEY_F12, F12);
        check(u32::from(b'a'), u32::from(b'A'));
        check(u32::from(b' '), u32::from(b' '));
    }

    #[test]
    fn test_fallback_is_raw_plus_eight() {
        // keysym with no table entry
        let sym = keysyms::KEY_Hangul;
        assert_eq!(keysym_to_scancode(sym), None);
        assert_eq!(scancode_from_parts(sym, 100), 108);
        // translation is a pure function of its inputs
        assert_eq!(scancode_from_parts(sym, 100), 108);
        assert_eq!(scancode_from_parts(keysyms::KEY_Escape, 100), ESCAPE);
    }

    #[test]
    fn test_modifier_flags() {
        assert_eq!(modifier_flag(SHIFT), Some(Modifiers::SHIFT));
        assert_eq!(modifier_flag(CONTROL), Some(Modifiers::CTRL));
        assert_eq!(modifier_flag(ALT), Some(Modifiers::ALT));
        assert_eq!(modifier_flag(META), Some(Modifiers::META));
        assert_eq!(modifier_flag(ESCAPE), None);
        assert_eq!(modifier_flag(CAPS_LOCK), None);
    }
}
