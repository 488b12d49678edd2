//! Seams between the display backend and the rest of the engine.

use crate::window::VideoMode;
use anyhow::Result;
use wayland_client::{protocol::wl_surface::WlSurface, Connection};

/// Threading model requested for rendering. Only the single-threaded modes
/// are supported; a separate render thread is rejected at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderThreadMode {
    #[default]
    SingleSafe,
    SingleUnsafe,
    Separate,
}

/// Options forwarded verbatim to the graphics backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextOptions {
    pub opengl3: bool,
}

/// Raw display handles a graphics backend needs to build a drawable.
pub struct SurfaceHandles<'a> {
    pub connection: &'a Connection,
    pub surface: &'a WlSurface,
}

pub trait GraphicsBackend {
    fn create_context(
        &mut self,
        handles: SurfaceHandles<'_>,
        mode: &VideoMode,
        options: &ContextOptions,
    ) -> Result<Box<dyn GraphicsContext>>;
}

pub trait GraphicsContext {
    fn make_current(&mut self) -> Result<()>;
    fn release_current(&mut self) -> Result<()>;
    fn swap_buffers(&mut self) -> Result<()>;
    fn resize(&mut self, width: u32, height: u32);
}

/// An engine subsystem tied to the platform lifecycle: started after the
/// graphics context exists, stopped in reverse order at shutdown.
pub trait Subsystem {
    fn name(&self) -> &str;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
}
