//! Keyboard state machine: keymap loading, modifier tracking and the polled
//! auto-repeat timer.

use crate::{
    events::{InputEventKind, InputQueue, Modifiers},
    keys,
};
use anyhow::{Context as _, Result};
use memmap2::MmapOptions;
use std::{
    fs::File,
    os::fd::OwnedFd,
    time::{Duration, Instant},
};
use wayland_client::protocol::wl_keyboard::WlKeyboard;
use xkbcommon::xkb;

/// Keyboard state. The struct outlives the wl_keyboard: a revoked capability
/// drops the protocol object but keeps the compiled keymap and interpreter
/// state until finalize.
pub(crate) struct Keyboard {
    pub(crate) wl_keyboard: Option<WlKeyboard>,
    context: xkb::Context,
    state: Option<xkb::State>,
    modifiers: Modifiers,
    pub(crate) repeat: RepeatTimer,
}

impl Keyboard {
    pub(crate) fn new() -> Keyboard {
        Keyboard {
            wl_keyboard: None,
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            state: None,
            modifiers: Modifiers::empty(),
            repeat: RepeatTimer::default(),
        }
    }

    pub(crate) fn attach(&mut self, wl_keyboard: WlKeyboard) {
        if let Some(old) = self.wl_keyboard.replace(wl_keyboard) {
            old.release();
        }
    }

    pub(crate) fn detach(&mut self) {
        if let Some(wl_keyboard) = self.wl_keyboard.take() {
            wl_keyboard.release();
        }
        self.repeat.disarm();
    }

    pub(crate) fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// One-time keymap load from the compositor's shared-memory region. The
    /// mapping is scoped to this call and released on every exit path.
    pub(crate) fn load_keymap(&mut self, fd: OwnedFd, size: u32) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let file = File::from(fd);
        let mmap = unsafe { MmapOptions::new().len(size as usize).map(&file) }
            .context("failed to map the keymap")?;
        let end = mmap
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(mmap.len());
        let text =
            std::str::from_utf8(&mmap[..end]).context("keymap is not valid utf-8")?;
        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text.to_owned(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .context("failed to compile the keymap")?;
        // the interpreter state keeps the keymap alive for the rest of the
        // session
        self.state = Some(xkb::State::new(&keymap));
        Ok(())
    }

    /// Recomputes the modifier snapshot from the masks the compositor sent.
    /// This is the only derivation path for lock-independent modifier state.
    pub(crate) fn update_modifiers(
        &mut self,
        mods_depressed: u32,
        mods_latched: u32,
        mods_locked: u32,
        group: u32,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
        let mut modifiers = Modifiers::empty();
        if state.mod_name_is_active(xkb::MOD_NAME_SHIFT, xkb::STATE_MODS_EFFECTIVE) {
            modifiers |= Modifiers::SHIFT;
        }
        if state.mod_name_is_active(xkb::MOD_NAME_CTRL, xkb::STATE_MODS_EFFECTIVE) {
            modifiers |= Modifiers::CTRL;
        }
        if state.mod_name_is_active(xkb::MOD_NAME_ALT, xkb::STATE_MODS_EFFECTIVE) {
            modifiers |= Modifiers::ALT;
        }
        if state.mod_name_is_active(xkb::MOD_NAME_LOGO, xkb::STATE_MODS_EFFECTIVE) {
            modifiers |= Modifiers::META;
        }
        self.modifiers = modifiers;
    }

    pub(crate) fn key(
        &mut self,
        raw: u32,
        pressed: bool,
        now: Instant,
        queue: &mut InputQueue,
    ) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let scancode = keys::scancode_from_parts(state.key_get_one_sym(raw + 8), raw);
        let unicode = state.key_get_utf32(raw + 8);
        match keys::modifier_flag(scancode) {
            // modifier keys toggle the snapshot directly and never repeat
            Some(flag) => self.modifiers.set(flag, pressed),
            None if pressed => self.repeat.press(raw, now),
            None => self.repeat.release(raw),
        }
        queue.push_event(
            self.modifiers,
            InputEventKind::Key {
                scancode,
                unicode,
                pressed,
                echo: false,
            },
        );
    }

    /// Called once per main-loop iteration; emits at most one echo.
    pub(crate) fn poll_repeat(&mut self, now: Instant, queue: &mut InputQueue) {
        let Some(raw) = self.repeat.poll(now) else {
            return;
        };
        let Some(state) = self.state.as_ref() else {
            return;
        };
        queue.push_event(
            self.modifiers,
            InputEventKind::Key {
                scancode: keys::scancode_from_parts(state.key_get_one_sym(raw + 8), raw),
                unicode: state.key_get_utf32(raw + 8),
                pressed: true,
                echo: true,
            },
        );
    }
}

/// Soft timer for key auto-repeat, polled from the main loop rather than
/// driven by an asynchronous timer, so echoes stay ordered relative to the
/// iteration they fire in.
#[derive(Default)]
pub(crate) struct RepeatTimer {
    rate: i32,
    delay: i32,
    key: Option<u32>,
    deadline: Option<Instant>,
}

impl RepeatTimer {
    /// Rate and delay come from the compositor and may arrive late or be
    /// zero; a non-positive rate disarms repeat entirely.
    pub(crate) fn set_info(&mut self, rate: i32, delay: i32) {
        self.rate = rate;
        self.delay = delay;
        if rate <= 0 {
            self.disarm();
        }
    }

    pub(crate) fn press(&mut self, raw: u32, now: Instant) {
        if self.rate <= 0 {
            return;
        }
        self.key = Some(raw);
        self.deadline = Some(now + Duration::from_millis(self.delay.max(0) as u64));
    }

    pub(crate) fn release(&mut self, raw: u32) {
        if self.key == Some(raw) {
            self.disarm();
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.key = None;
        self.deadline = None;
    }

    pub(crate) fn poll(&mut self, now: Instant) -> Option<u32> {
        let key = self.key?;
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        // rate is positive whenever a key is armed
        self.deadline = Some(deadline + Duration::from_millis(1000 / self.rate as u64));
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_echo_waits_for_the_delay() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(25, 600);
        timer.press(30, t0);

        assert_eq!(timer.poll(t0), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(599)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(600)), Some(30));
    }

    #[test]
    fn test_echoes_are_spaced_by_the_rate() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(25, 600); // 40 ms between echoes
        timer.press(30, t0);

        assert_eq!(timer.poll(t0 + Duration::from_millis(600)), Some(30));
        assert_eq!(timer.poll(t0 + Duration::from_millis(600)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(639)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(640)), Some(30));
        assert_eq!(timer.poll(t0 + Duration::from_millis(680)), Some(30));
    }

    #[test]
    fn test_release_before_deadline_produces_no_echo() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(25, 600);
        timer.press(30, t0);
        timer.release(30);
        assert_eq!(timer.poll(t0 + Duration::from_millis(10_000)), None);
    }

    #[test]
    fn test_release_of_a_different_key_keeps_the_timer() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(25, 600);
        timer.press(30, t0);
        timer.release(31);
        assert_eq!(timer.poll(t0 + Duration::from_millis(600)), Some(30));
    }

    #[test]
    fn test_zero_rate_never_arms() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(0, 600);
        timer.press(30, t0);
        assert_eq!(timer.poll(t0 + Duration::from_millis(10_000)), None);

        // a repeat-info update to rate zero disarms a held key
        timer.set_info(25, 600);
        timer.press(30, t0);
        timer.set_info(0, 600);
        assert_eq!(timer.poll(t0 + Duration::from_millis(10_000)), None);
    }

    #[test]
    fn test_new_press_replaces_the_held_key() {
        let t0 = Instant::now();
        let mut timer = RepeatTimer::default();
        timer.set_info(25, 100);
        timer.press(30, t0);
        timer.press(31, t0 + Duration::from_millis(50));
        assert_eq!(timer.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(150)), Some(31));
    }
}
