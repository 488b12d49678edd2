//! Cursor-shape presentation backed by a wl_shm cursor theme.
//!
//! The theme is loaded once the shared-memory global is bound. Each engine
//! cursor shape resolves to a theme cursor name at load time, so a missing
//! shape is caught up front instead of at first use.

use anyhow::{ensure, Context as _, Result};
use log::warn;
use std::collections::HashMap;
use wayland_client::{
    protocol::{wl_buffer::WlBuffer, wl_pointer::WlPointer, wl_shm::WlShm, wl_surface::WlSurface},
    Connection,
};
use wayland_cursor::CursorTheme;

const FALLBACK: &str = "left_ptr";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CursorShape {
    Arrow,
    IBeam,
    PointingHand,
    Cross,
    Wait,
    Busy,
    Drag,
    CanDrop,
    Forbidden,
    VSize,
    HSize,
    BDiagSize,
    FDiagSize,
    Move,
    VSplit,
    HSplit,
    Help,
}

impl CursorShape {
    pub const ALL: [CursorShape; 17] = [
        CursorShape::Arrow,
        CursorShape::IBeam,
        CursorShape::PointingHand,
        CursorShape::Cross,
        CursorShape::Wait,
        CursorShape::Busy,
        CursorShape::Drag,
        CursorShape::CanDrop,
        CursorShape::Forbidden,
        CursorShape::VSize,
        CursorShape::HSize,
        CursorShape::BDiagSize,
        CursorShape::FDiagSize,
        CursorShape::Move,
        CursorShape::VSplit,
        CursorShape::HSplit,
        CursorShape::Help,
    ];

    /// Theme cursor names to try for this shape, most specific first.
    fn candidates(self) -> &'static [&'static str] {
        match self {
            CursorShape::Arrow => &["left_ptr", "default"],
            CursorShape::IBeam => &["xterm", "text"],
            CursorShape::PointingHand => &["hand2", "hand1", "pointer"],
            CursorShape::Cross => &["crosshair", "cross"],
            CursorShape::Wait => &["watch", "wait"],
            CursorShape::Busy => &["left_ptr_watch", "progress"],
            CursorShape::Drag => &["grabbing", "closedhand"],
            CursorShape::CanDrop => &["grabbing", "dnd-drop"],
            CursorShape::Forbidden => &["crossed_circle", "not-allowed"],
            CursorShape::VSize => &["sb_v_double_arrow", "ns-resize"],
            CursorShape::HSize => &["sb_h_double_arrow", "ew-resize"],
            CursorShape::BDiagSize => &["fd_double_arrow", "nesw-resize"],
            CursorShape::FDiagSize => &["bd_double_arrow", "nwse-resize"],
            CursorShape::Move => &["fleur", "move"],
            CursorShape::VSplit => &["sb_v_double_arrow", "row-resize"],
            CursorShape::HSplit => &["sb_h_double_arrow", "col-resize"],
            CursorShape::Help => &["question_arrow", "help"],
        }
    }
}

/// Loaded cursor theme plus the validated shape-to-name mapping.
pub(crate) struct CursorSet {
    theme: CursorTheme,
    names: HashMap<CursorShape, &'static str>,
}

impl CursorSet {
    pub(crate) fn load(conn: &Connection, shm: WlShm, size: u32) -> Result<CursorSet> {
        let mut theme =
            CursorTheme::load(conn, shm, size).context("failed to load the cursor theme")?;
        ensure!(
            theme.get_cursor(FALLBACK).is_some(),
            "cursor theme has no {FALLBACK:?} cursor"
        );

        let mut names = HashMap::new();
        for shape in CursorShape::ALL {
            let name = shape
                .candidates()
                .iter()
                .copied()
                .find(|name| theme.get_cursor(name).is_some());
            let name = name.unwrap_or_else(|| {
                warn!("cursor theme has no image for {shape:?}, using {FALLBACK:?}");
                FALLBACK
            });
            names.insert(shape, name);
        }
        Ok(CursorSet { theme, names })
    }

    /// Attaches the shape's image to the cursor surface and points the
    /// compositor at it. Presentation only; input semantics are unaffected.
    pub(crate) fn attach(
        &mut self,
        shape: CursorShape,
        wl_pointer: &WlPointer,
        serial: u32,
        surface: &WlSurface,
    ) {
        let name = self.names[&shape];
        let Some(cursor) = self.theme.get_cursor(name) else {
            return;
        };
        let image = &cursor[0];
        let buffer: &WlBuffer = image;
        let (hotspot_x, hotspot_y) = image.hotspot();
        wl_pointer.set_cursor(serial, Some(surface), hotspot_x as i32, hotspot_y as i32);
        surface.attach(Some(buffer), 0, 0);
        surface.damage_buffer(0, 0, i32::MAX, i32::MAX);
        surface.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_shape_has_candidates() {
        for shape in CursorShape::ALL {
            assert!(
                !shape.candidates().is_empty(),
                "{shape:?} has no cursor names"
            );
        }
    }

    #[test]
    fn test_shape_enumeration_is_complete() {
        let mut seen = std::collections::HashSet::new();
        for shape in CursorShape::ALL {
            assert!(seen.insert(shape), "{shape:?} listed twice");
        }
        assert_eq!(seen.len(), CursorShape::ALL.len());
    }
}
