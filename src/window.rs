//! The authoritative video-mode record for the toplevel window.

/// Single source of truth for the window's size and state flags. Compositor
/// configures and local API calls both mutate this record through the same
/// methods, so the graphics context and API queries always observe the same
/// values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoMode {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub resizable: bool,
    pub maximized: bool,
}

impl Default for VideoMode {
    fn default() -> VideoMode {
        VideoMode {
            width: 800,
            height: 600,
            fullscreen: false,
            resizable: true,
            maximized: false,
        }
    }
}

impl VideoMode {
    pub fn new(width: u32, height: u32, fullscreen: bool) -> VideoMode {
        VideoMode {
            width,
            height,
            fullscreen,
            ..VideoMode::default()
        }
    }

    /// Applies a negotiated size. Returns false (record unchanged) while the
    /// window is marked non-resizable. A zero dimension keeps the current
    /// value; compositors send zero to let the client decide.
    pub(crate) fn apply_configure(&mut self, width: u32, height: u32) -> bool {
        if !self.resizable {
            return false;
        }
        if width > 0 {
            self.width = width;
        }
        if height > 0 {
            self.height = height;
        }
        true
    }

    /// Fullscreen and maximized are mutually exclusive; both are no-ops on a
    /// non-resizable window. Returns whether the record changed.
    pub(crate) fn set_fullscreen(&mut self, enabled: bool) -> bool {
        if !self.resizable {
            return false;
        }
        self.fullscreen = enabled;
        if enabled {
            self.maximized = false;
        }
        true
    }

    pub(crate) fn set_maximized(&mut self, enabled: bool) -> bool {
        if !self.resizable {
            return false;
        }
        self.maximized = enabled;
        if enabled {
            self.fullscreen = false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_respects_resizable() {
        let mut mode = VideoMode::default();
        assert!(mode.apply_configure(1024, 768));
        assert_eq!((mode.width, mode.height), (1024, 768));

        mode.resizable = false;
        assert!(!mode.apply_configure(640, 480));
        assert_eq!((mode.width, mode.height), (1024, 768));
    }

    #[test]
    fn test_configure_keeps_zero_dimensions() {
        let mut mode = VideoMode::default();
        assert!(mode.apply_configure(0, 720));
        assert_eq!((mode.width, mode.height), (800, 720));
        assert!(mode.apply_configure(1280, 0));
        assert_eq!((mode.width, mode.height), (1280, 720));
    }

    #[test]
    fn test_fullscreen_and_maximized_are_exclusive() {
        let mut mode = VideoMode::default();

        assert!(mode.set_maximized(true));
        assert!(mode.maximized);

        assert!(mode.set_fullscreen(true));
        assert!(mode.fullscreen);
        assert!(!mode.maximized);

        assert!(mode.set_maximized(true));
        assert!(mode.maximized);
        assert!(!mode.fullscreen);

        assert!(mode.set_fullscreen(false));
        assert!(mode.maximized);
    }

    #[test]
    fn test_flags_are_noops_when_not_resizable() {
        let mut mode = VideoMode {
            resizable: false,
            ..VideoMode::default()
        };
        assert!(!mode.set_fullscreen(true));
        assert!(!mode.fullscreen);
        assert!(!mode.set_maximized(true));
        assert!(!mode.maximized);
    }
}
