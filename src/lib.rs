#![allow(clippy::single_match, clippy::match_single_binding)]

//! Wayland display bridge for a game engine: window lifecycle, monitor
//! tracking and normalized input events over a single compositor connection.

mod backend;
mod cursor;
mod engine;
mod events;
mod keyboard;
pub mod keys;
mod output;
mod pointer;
mod system;
mod window;

pub use backend::{Backend, MouseMode, Platform, PlatformOptions};
pub use cursor::CursorShape;
pub use engine::{
    ContextOptions, GraphicsBackend, GraphicsContext, RenderThreadMode, Subsystem, SurfaceHandles,
};
pub use events::{
    ButtonMask, InputEvent, InputEventKind, InputQueue, Modifiers, MouseButton, Point,
};
pub use output::OutputInfo;
pub use system::{shell_open, system_dir, SystemDir};
pub use window::VideoMode;
