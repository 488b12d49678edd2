//! Monitor descriptors, updated incrementally from per-output events.
//!
//! Each output global gets one descriptor, appended in discovery order; its
//! position in the collection is the externally visible screen index. Fields
//! accumulate in the pending half of a double buffer and become observable
//! only when the output's "done" event commits them. The collection is
//! append-only: a removed global leaves its descriptor in place.

use crate::events::Point;
use handy::typed::{TypedHandle, TypedHandleMap};
use wayland_client::{
    protocol::wl_output::{Subpixel, WlOutput},
    Proxy as _,
};

pub(crate) type OutputId = TypedHandle<Output>;

#[derive(Default)]
pub(crate) struct Output {
    pub(crate) wl_output: Option<WlOutput>,
    pub(crate) state: DoubleBuffered<OutputInfo>,
}

#[derive(Clone)]
pub struct OutputInfo {
    pub position: Point,
    /// Physical dimensions in millimeters.
    pub physical_size: (i32, i32),
    /// Current pixel mode.
    pub size: (i32, i32),
    /// Refresh rate in millihertz.
    pub refresh: i32,
    pub scale: i32,
    pub subpixel: Subpixel,
    pub make: String,
    pub model: String,
}

impl Default for OutputInfo {
    fn default() -> OutputInfo {
        OutputInfo {
            position: Point::default(),
            physical_size: (0, 0),
            size: (0, 0),
            refresh: 0,
            scale: 1,
            subpixel: Subpixel::Unknown,
            make: String::new(),
            model: String::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct DoubleBuffered<T> {
    pub(crate) pending: T,
    pub(crate) current: Option<T>,
}

impl<T: Clone> DoubleBuffered<T> {
    pub(crate) fn commit(&mut self) {
        match self.current.as_mut() {
            Some(current) => current.clone_from(&self.pending),
            None => self.current = Some(self.pending.clone()),
        }
    }
}

pub(crate) struct OutputTracker {
    map: TypedHandleMap<Output>,
    order: Vec<OutputId>,
}

impl OutputTracker {
    pub(crate) fn new() -> OutputTracker {
        OutputTracker {
            map: TypedHandleMap::new(),
            order: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self) -> OutputId {
        let id = self.map.insert(Output::default());
        self.order.push(id);
        id
    }

    pub(crate) fn set_wl_output(&mut self, id: OutputId, wl_output: WlOutput) {
        self.map[id].wl_output = Some(wl_output);
    }

    pub(crate) fn get_mut(&mut self, id: OutputId) -> &mut Output {
        &mut self.map[id]
    }

    pub(crate) fn screen_count(&self) -> usize {
        self.order.len()
    }

    /// Committed descriptor for a screen index, if the output has seen its
    /// first "done" event.
    pub(crate) fn info(&self, screen: usize) -> Option<&OutputInfo> {
        let id = self.order.get(screen)?;
        self.map[*id].state.current.as_ref()
    }

    pub(crate) fn screen_position(&self, screen: usize) -> Point {
        self.info(screen).map(|info| info.position).unwrap_or_default()
    }

    pub(crate) fn screen_size(&self, screen: usize) -> (i32, i32) {
        self.info(screen).map(|info| info.size).unwrap_or_default()
    }

    /// Releases every bound output proxy. The descriptors stay readable.
    pub(crate) fn release_all(&mut self) {
        for &id in &self.order {
            if let Some(wl_output) = self.map[id].wl_output.take() {
                if wl_output.version() >= 3 {
                    wl_output.release();
                }
            }
        }
    }
}

impl Default for OutputTracker {
    fn default() -> OutputTracker {
        OutputTracker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_provisional_until_done() {
        let mut tracker = OutputTracker::new();
        let id = tracker.register();

        let output = tracker.get_mut(id);
        output.state.pending.position = Point { x: 1920, y: 0 };
        output.state.pending.size = (2560, 1440);

        // no "done" yet: queries read as zero
        assert_eq!(tracker.screen_position(0), Point::default());
        assert_eq!(tracker.screen_size(0), (0, 0));

        tracker.get_mut(id).state.commit();
        assert_eq!(tracker.screen_position(0), Point { x: 1920, y: 0 });
        assert_eq!(tracker.screen_size(0), (2560, 1440));
    }

    #[test]
    fn test_out_of_range_screen_reads_as_zero() {
        let mut tracker = OutputTracker::new();
        assert_eq!(tracker.screen_count(), 0);
        assert_eq!(tracker.screen_position(0), Point::default());
        assert_eq!(tracker.screen_size(7), (0, 0));

        tracker.register();
        assert_eq!(tracker.screen_count(), 1);
        assert_eq!(tracker.screen_size(1), (0, 0));
    }

    #[test]
    fn test_screen_index_follows_discovery_order() {
        let mut tracker = OutputTracker::new();
        let first = tracker.register();
        let second = tracker.register();

        tracker.get_mut(first).state.pending.size = (1920, 1080);
        tracker.get_mut(first).state.commit();
        tracker.get_mut(second).state.pending.size = (1280, 1024);
        tracker.get_mut(second).state.commit();

        assert_eq!(tracker.screen_count(), 2);
        assert_eq!(tracker.screen_size(0), (1920, 1080));
        assert_eq!(tracker.screen_size(1), (1280, 1024));
    }
}
