//! Connection setup, protocol dispatch and the engine-facing surface.

use crate::{
    cursor::{CursorSet, CursorShape},
    engine::{ContextOptions, GraphicsBackend, GraphicsContext, RenderThreadMode, Subsystem, SurfaceHandles},
    events::{ButtonMask, InputEvent, InputQueue, Point},
    keyboard::Keyboard,
    output::{OutputId, OutputInfo, OutputTracker},
    pointer::Pointer,
    window::VideoMode,
};
use anyhow::{anyhow, ensure, Context as _, Result};
use calloop::EventLoop;
use calloop_wayland_source::WaylandSource;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use wayland_client::{
    globals::{registry_queue_init, Global, GlobalListContents},
    protocol::{
        wl_compositor::WlCompositor,
        wl_keyboard::{self, KeyState, KeymapFormat, WlKeyboard},
        wl_output::{self, WlOutput},
        wl_pointer::{self, ButtonState, WlPointer},
        wl_registry::{self, WlRegistry},
        wl_seat::{self, Capability, WlSeat},
        wl_shm::WlShm,
        wl_surface::{self, WlSurface},
    },
    Connection, Dispatch, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

/// Upper bound on one dispatch wait, so the repeat timer and the engine
/// iteration advance even while the compositor is silent.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseMode {
    #[default]
    Visible,
    Hidden,
}

/// Startup parameters for [`Platform::initialize`].
pub struct PlatformOptions {
    pub mode: VideoMode,
    pub title: String,
    pub app_id: String,
    pub cursor_size: u32,
    pub render_thread_mode: RenderThreadMode,
    pub context: ContextOptions,
}

impl Default for PlatformOptions {
    fn default() -> PlatformOptions {
        PlatformOptions {
            mode: VideoMode::default(),
            title: String::new(),
            app_id: String::new(),
            cursor_size: 24,
            render_thread_mode: RenderThreadMode::default(),
            context: ContextOptions::default(),
        }
    }
}

struct Globals {
    wl_shm: WlShm,
    wl_compositor: WlCompositor,
    wm_base: XdgWmBase,
}

struct Window {
    wl_surface: WlSurface,
    xdg_surface: XdgSurface,
    toplevel: XdgToplevel,
    mode: VideoMode,
    pending_size: Option<(u32, u32)>,
}

/// Dispatch state: every bound protocol object plus the derived input and
/// window state the engine queries.
pub struct Backend {
    will_quit: bool,
    conn: Connection,
    globals: Globals,
    _seat: WlSeat,
    window: Window,
    outputs: OutputTracker,
    pointer: Option<Pointer>,
    keyboard: Keyboard,
    cursors: CursorSet,
    cursor_shape: CursorShape,
    mouse_mode: MouseMode,
    context: Option<Box<dyn GraphicsContext>>,
    subsystems: Vec<Box<dyn Subsystem>>,
    input: InputQueue,
    fatal: Option<anyhow::Error>,
    minimized: bool,
}

/// Owns the event loop and the backend it drives.
pub struct Platform {
    event_loop: EventLoop<'static, Backend>,
    pub backend: Backend,
}

impl Platform {
    pub fn initialize(
        options: PlatformOptions,
        graphics: &mut dyn GraphicsBackend,
        subsystems: Vec<Box<dyn Subsystem>>,
    ) -> Result<Platform> {
        ensure!(
            options.render_thread_mode != RenderThreadMode::Separate,
            "separate render thread mode is not supported"
        );

        let conn =
            Connection::connect_to_env().context("failed to connect to the compositor")?;
        let (global_list, mut queue) = registry_queue_init::<Backend>(&conn)?;
        let qhandle = queue.handle();
        let globals = Globals {
            wl_shm: global_list
                .bind(&qhandle, 1..=1, ())
                .context("compositor doesn't support wl_shm")?,
            wl_compositor: global_list
                .bind(&qhandle, 4..=6, ())
                .context("compositor doesn't support wl_compositor")?,
            wm_base: global_list
                .bind(&qhandle, 1..=6, ())
                .context("compositor doesn't support xdg_wm_base")?,
        };

        let mut outputs = OutputTracker::new();
        let mut seat = None;
        global_list.contents().with_list(|list| {
            for &Global {
                name,
                ref interface,
                version,
            } in list
            {
                match interface.as_str() {
                    "wl_seat" if seat.is_none() => {
                        seat = Some(global_list.registry().bind::<WlSeat, (), Backend>(
                            name,
                            version.max(1),
                            &qhandle,
                            (),
                        ));
                    }
                    "wl_seat" => debug!("ignoring extra seat global {name}"),
                    "wl_output" => {
                        let output_id = outputs.register();
                        let wl_output = global_list.registry().bind::<WlOutput, OutputId, Backend>(
                            name,
                            version.max(1),
                            &qhandle,
                            output_id,
                        );
                        outputs.set_wl_output(output_id, wl_output);
                    }
                    _ => {}
                }
            }
        });
        let seat = seat.context("compositor doesn't support wl_seat")?;
        ensure!(outputs.screen_count() > 0, "compositor advertised no outputs");

        let cursors = CursorSet::load(&conn, globals.wl_shm.clone(), options.cursor_size)?;

        let wl_surface = globals.wl_compositor.create_surface(&qhandle, ());
        let xdg_surface = globals.wm_base.get_xdg_surface(&wl_surface, &qhandle, ());
        let toplevel = xdg_surface.get_toplevel(&qhandle, ());
        toplevel.set_title(options.title.clone());
        toplevel.set_app_id(options.app_id.clone());
        let mode = options.mode;
        if !mode.resizable {
            toplevel.set_min_size(mode.width as i32, mode.height as i32);
            toplevel.set_max_size(mode.width as i32, mode.height as i32);
        }
        if mode.fullscreen {
            toplevel.set_fullscreen(None);
        } else if mode.maximized {
            toplevel.set_maximized();
        }
        wl_surface.commit();

        let mut backend = Backend {
            will_quit: false,
            conn,
            globals,
            _seat: seat,
            window: Window {
                wl_surface,
                xdg_surface,
                toplevel,
                mode,
                pending_size: None,
            },
            outputs,
            pointer: None,
            keyboard: Keyboard::new(),
            cursors,
            cursor_shape: CursorShape::Arrow,
            mouse_mode: MouseMode::default(),
            context: None,
            subsystems: Vec::new(),
            input: InputQueue::default(),
            fatal: None,
            minimized: false,
        };
        // one pass for the initial output/seat bursts, one for the replies
        // they trigger (keymap, first configure)
        queue.roundtrip(&mut backend).context("initial roundtrip failed")?;
        queue.roundtrip(&mut backend).context("initial roundtrip failed")?;
        if let Some(err) = backend.fatal.take() {
            return Err(err);
        }
        info!(
            "connected: {} outputs, window {}x{}",
            backend.outputs.screen_count(),
            backend.window.mode.width,
            backend.window.mode.height
        );

        let context = graphics
            .create_context(
                SurfaceHandles {
                    connection: &backend.conn,
                    surface: &backend.window.wl_surface,
                },
                &backend.window.mode,
                &options.context,
            )
            .context("failed to create the graphics context")?;
        backend.context = Some(context);

        for mut subsystem in subsystems {
            subsystem
                .start()
                .with_context(|| format!("failed to start {}", subsystem.name()))?;
            backend.subsystems.push(subsystem);
        }

        let event_loop =
            EventLoop::try_new().context("failed to create the event loop")?;
        WaylandSource::new(backend.conn.clone(), queue)
            .insert(event_loop.handle())
            .map_err(|err| {
                anyhow::Error::new(err.error).context("failed to register the wayland source")
            })?;
        Ok(Platform { event_loop, backend })
    }

    /// Drives dispatch until the quit flag is set or `iterate` returns true.
    /// `iterate` runs once per loop pass, after pending protocol events and
    /// the repeat timer have been serviced.
    pub fn run(&mut self, mut iterate: impl FnMut(&mut Backend) -> bool) -> Result<()> {
        loop {
            self.event_loop
                .dispatch(Some(POLL_INTERVAL), &mut self.backend)
                .context("event loop dispatch failed")?;
            if let Some(err) = self.backend.fatal.take() {
                return Err(err);
            }
            self.backend.advance_repeat(Instant::now());
            if self.backend.will_quit || iterate(&mut self.backend) {
                return Ok(());
            }
        }
    }

    /// Tears down in reverse construction order: subsystems, graphics
    /// context, input devices, surfaces.
    pub fn finalize(mut self) {
        while let Some(mut subsystem) = self.backend.subsystems.pop() {
            subsystem.stop();
        }
        self.backend.context = None;
        self.backend.keyboard.detach();
        if let Some(pointer) = self.backend.pointer.take() {
            pointer.wl_pointer.release();
            pointer.cursor_surface.destroy();
        }
        self.backend.window.toplevel.destroy();
        self.backend.window.xdg_surface.destroy();
        self.backend.window.wl_surface.destroy();
        self.backend.outputs.release_all();
        let _ = self.backend.conn.flush();
    }
}

impl Backend {
    pub fn name(&self) -> &'static str {
        "Wayland"
    }

    pub fn poll_event(&mut self) -> Option<InputEvent> {
        self.input.poll()
    }

    pub fn pending_events(&self) -> usize {
        self.input.len()
    }

    pub fn video_mode(&self) -> VideoMode {
        self.window.mode
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window.mode.width, self.window.mode.height)
    }

    /// Local resizes go through the same path as compositor configures, so
    /// the resizable gate and the context resize apply to both.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.handle_configure(width, height);
    }

    pub fn is_resizable(&self) -> bool {
        self.window.mode.resizable
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.window.mode.resizable = resizable;
        if resizable {
            self.window.toplevel.set_min_size(0, 0);
            self.window.toplevel.set_max_size(0, 0);
        } else {
            let width = self.window.mode.width as i32;
            let height = self.window.mode.height as i32;
            self.window.toplevel.set_min_size(width, height);
            self.window.toplevel.set_max_size(width, height);
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.window.mode.fullscreen
    }

    pub fn set_fullscreen(&mut self, enabled: bool) {
        if !self.window.mode.set_fullscreen(enabled) {
            return;
        }
        if enabled {
            self.window.toplevel.set_fullscreen(None);
        } else {
            self.window.toplevel.unset_fullscreen();
        }
    }

    pub fn is_maximized(&self) -> bool {
        self.window.mode.maximized
    }

    pub fn set_maximized(&mut self, enabled: bool) {
        if !self.window.mode.set_maximized(enabled) {
            return;
        }
        if enabled {
            self.window.toplevel.set_maximized();
        } else {
            self.window.toplevel.unset_maximized();
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Minimization is a one-way request; the compositor reconfigures the
    /// toplevel when the window is brought back.
    pub fn set_minimized(&mut self, enabled: bool) {
        if enabled {
            self.window.toplevel.set_minimized();
            self.minimized = true;
        } else {
            warn!("a minimized window cannot be restored from the client side");
        }
    }

    pub fn set_window_title(&mut self, title: &str) {
        self.window.toplevel.set_title(title.to_owned());
    }

    pub fn window_position(&self) -> Point {
        warn!("the compositor does not expose window positions, reporting the origin");
        Point::default()
    }

    pub fn set_window_position(&mut self, _position: Point) {
        warn!("the compositor does not allow windows to position themselves");
    }

    pub fn screen_count(&self) -> usize {
        self.outputs.screen_count()
    }

    /// The protocol has no focus-to-output mapping usable here; the first
    /// discovered screen stands in.
    pub fn current_screen(&self) -> usize {
        0
    }

    pub fn screen_position(&self, screen: usize) -> Point {
        self.outputs.screen_position(screen)
    }

    pub fn screen_size(&self, screen: usize) -> (i32, i32) {
        self.outputs.screen_size(screen)
    }

    /// Full committed descriptor for a screen, if the output has completed
    /// its first event burst.
    pub fn screen_info(&self, screen: usize) -> Option<&OutputInfo> {
        self.outputs.info(screen)
    }

    pub fn cursor_shape(&self) -> CursorShape {
        self.cursor_shape
    }

    pub fn set_cursor_shape(&mut self, shape: CursorShape) {
        self.cursor_shape = shape;
        self.apply_cursor();
    }

    pub fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    pub fn set_mouse_mode(&mut self, mode: MouseMode) {
        self.mouse_mode = mode;
        self.apply_cursor();
    }

    pub fn mouse_position(&self) -> Point {
        self.pointer
            .as_ref()
            .map(|pointer| pointer.input.position())
            .unwrap_or_default()
    }

    pub fn mouse_button_mask(&self) -> ButtonMask {
        self.pointer
            .as_ref()
            .map(|pointer| pointer.input.button_mask())
            .unwrap_or_default()
    }

    pub fn set_clipboard(&mut self, text: &str) {
        debug!("clipboard is not supported, dropping {} bytes", text.len());
    }

    pub fn clipboard(&self) -> String {
        debug!("clipboard is not supported, reporting empty");
        String::new()
    }

    pub fn set_icon(&mut self, width: u32, height: u32, _rgba: &[u8]) {
        debug!("window icons are not supported, dropping a {width}x{height} image");
    }

    pub fn can_draw(&self) -> bool {
        !self.minimized
    }

    pub fn make_current(&mut self) -> Result<()> {
        self.graphics_context()?.make_current()
    }

    pub fn release_current(&mut self) -> Result<()> {
        self.graphics_context()?.release_current()
    }

    pub fn swap_buffers(&mut self) -> Result<()> {
        self.graphics_context()?.swap_buffers()
    }

    pub fn quit(&mut self) {
        self.will_quit = true;
    }

    fn graphics_context(&mut self) -> Result<&mut Box<dyn GraphicsContext>> {
        self.context
            .as_mut()
            .context("graphics context is not initialized")
    }

    fn handle_configure(&mut self, width: u32, height: u32) {
        if !self.window.mode.apply_configure(width, height) {
            return;
        }
        if let Some(context) = self.context.as_mut() {
            context.resize(self.window.mode.width, self.window.mode.height);
        }
    }

    fn apply_cursor(&mut self) {
        let Some(pointer) = self.pointer.as_ref() else {
            return;
        };
        match self.mouse_mode {
            MouseMode::Visible => self.cursors.attach(
                self.cursor_shape,
                &pointer.wl_pointer,
                pointer.enter_serial,
                &pointer.cursor_surface,
            ),
            MouseMode::Hidden => {
                pointer.wl_pointer.set_cursor(pointer.enter_serial, None, 0, 0);
            }
        }
    }

    fn advance_repeat(&mut self, now: Instant) {
        self.keyboard.poll_repeat(now, &mut self.input);
    }

    fn fail(&mut self, err: anyhow::Error) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }
}

macro_rules! empty_dispatch {
    ($($t:ty),*) => {
        $(
            impl Dispatch<$t, ()> for Backend {
                fn event(
                    _: &mut Self,
                    _: &$t,
                    _: <$t as wayland_client::Proxy>::Event,
                    _: &(),
                    _: &Connection,
                    _: &QueueHandle<Self>,
                ) {
                }
            }
        )*
    };
}

empty_dispatch![WlShm, WlCompositor];

impl Dispatch<WlRegistry, GlobalListContents> for Backend {
    fn event(
        _state: &mut Self,
        _proxy: &WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_registry::Event;
        match event {
            Event::Global {
                name,
                interface,
                version,
            } => debug!("global {name}: {interface} v{version}"),
            // outputs are kept after removal; their descriptors stay valid
            Event::GlobalRemove { name } => debug!("global {name} removed"),
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for Backend {
    fn event(
        _state: &mut Self,
        proxy: &XdgWmBase,
        event: xdg_wm_base::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use xdg_wm_base::Event;
        match event {
            Event::Ping { serial } => proxy.pong(serial),
            _ => {}
        }
    }
}

impl Dispatch<XdgSurface, ()> for Backend {
    fn event(
        state: &mut Self,
        proxy: &XdgSurface,
        event: xdg_surface::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use xdg_surface::Event;
        match event {
            Event::Configure { serial } => {
                proxy.ack_configure(serial);
                if let Some((width, height)) = state.window.pending_size.take() {
                    state.handle_configure(width, height);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<XdgToplevel, ()> for Backend {
    fn event(
        state: &mut Self,
        _proxy: &XdgToplevel,
        event: xdg_toplevel::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use xdg_toplevel::Event;
        match event {
            Event::Configure {
                width,
                height,
                states: _,
            } => {
                // a reconfigure means the toplevel is visible again
                state.minimized = false;
                if width > 0 || height > 0 {
                    state.window.pending_size = Some((width as u32, height as u32));
                }
            }
            Event::Close => state.will_quit = true,
            _ => {}
        }
    }
}

impl Dispatch<WlSeat, ()> for Backend {
    fn event(
        state: &mut Self,
        proxy: &WlSeat,
        event: wl_seat::Event,
        &(): &(),
        _conn: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        use wl_seat::Event;
        match event {
            Event::Capabilities { capabilities } => {
                let WEnum::Value(capabilities) = capabilities else {
                    return;
                };
                match (
                    state.pointer.is_some(),
                    capabilities.contains(Capability::Pointer),
                ) {
                    (false, true) => {
                        info!("seat granted the pointer capability");
                        let wl_pointer = proxy.get_pointer(qhandle, ());
                        let cursor_surface =
                            state.globals.wl_compositor.create_surface(qhandle, ());
                        state.pointer = Some(Pointer::new(wl_pointer, cursor_surface));
                    }
                    (true, false) => {
                        info!("seat revoked the pointer capability");
                        if let Some(pointer) = state.pointer.take() {
                            pointer.wl_pointer.release();
                            pointer.cursor_surface.destroy();
                        }
                    }
                    _ => {}
                }
                match (
                    state.keyboard.wl_keyboard.is_some(),
                    capabilities.contains(Capability::Keyboard),
                ) {
                    (false, true) => {
                        info!("seat granted the keyboard capability");
                        state.keyboard.attach(proxy.get_keyboard(qhandle, ()));
                    }
                    (true, false) => {
                        info!("seat revoked the keyboard capability");
                        state.keyboard.detach();
                    }
                    _ => {}
                }
            }
            Event::Name { name } => debug!("seat name: {name}"),
            _ => {}
        }
    }
}

impl Dispatch<WlKeyboard, ()> for Backend {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_keyboard::Event;
        match event {
            Event::Keymap { format, fd, size } => match format {
                WEnum::Value(KeymapFormat::XkbV1) => {
                    if let Err(err) = state.keyboard.load_keymap(fd, size) {
                        state.fail(err);
                    }
                }
                WEnum::Value(_) | WEnum::Unknown(_) => {
                    state.fail(anyhow!("unsupported keymap format {format:?}"));
                }
            },
            Event::Key {
                serial: _,
                time: _,
                key,
                state: key_state,
            } => {
                let pressed = matches!(key_state, WEnum::Value(KeyState::Pressed));
                state
                    .keyboard
                    .key(key, pressed, Instant::now(), &mut state.input);
            }
            Event::Modifiers {
                serial: _,
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
            } => {
                state
                    .keyboard
                    .update_modifiers(mods_depressed, mods_latched, mods_locked, group);
            }
            Event::RepeatInfo { rate, delay } => state.keyboard.repeat.set_info(rate, delay),
            Event::Enter { .. } | Event::Leave { .. } => {}
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, ()> for Backend {
    fn event(
        state: &mut Self,
        _proxy: &WlPointer,
        event: wl_pointer::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_pointer::Event;
        let modifiers = state.keyboard.modifiers();
        match event {
            Event::Enter {
                serial,
                surface: _,
                surface_x,
                surface_y,
            } => {
                let Some(pointer) = state.pointer.as_mut() else {
                    return;
                };
                pointer.enter_serial = serial;
                pointer.input.set_position(surface_x as i32, surface_y as i32);
                state.apply_cursor();
            }
            Event::Leave { .. } => {}
            Event::Motion {
                time,
                surface_x,
                surface_y,
            } => {
                let Some(pointer) = state.pointer.as_mut() else {
                    return;
                };
                pointer.input.motion(
                    time,
                    surface_x as i32,
                    surface_y as i32,
                    modifiers,
                    &mut state.input,
                );
            }
            Event::Button {
                serial: _,
                time,
                button,
                state: button_state,
            } => {
                let Some(pointer) = state.pointer.as_mut() else {
                    return;
                };
                let pressed = matches!(button_state, WEnum::Value(ButtonState::Pressed));
                pointer
                    .input
                    .button(time, button, pressed, modifiers, &mut state.input);
            }
            Event::Axis {
                time: _,
                axis,
                value,
            } => {
                let WEnum::Value(axis) = axis else {
                    return;
                };
                let Some(pointer) = state.pointer.as_mut() else {
                    return;
                };
                pointer.input.axis(axis, value, modifiers, &mut state.input);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, OutputId> for Backend {
    fn event(
        state: &mut Self,
        _proxy: &WlOutput,
        event: wl_output::Event,
        &data: &OutputId,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_output::Event;
        let this = state.outputs.get_mut(data);
        match event {
            Event::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                subpixel,
                make,
                model,
                transform: _,
            } => {
                let pending = &mut this.state.pending;
                pending.position = Point { x, y };
                pending.physical_size = (physical_width, physical_height);
                if let WEnum::Value(subpixel) = subpixel {
                    pending.subpixel = subpixel;
                }
                pending.make = make;
                pending.model = model;
            }
            Event::Mode {
                flags,
                width,
                height,
                refresh,
            } => {
                let WEnum::Value(flags) = flags else {
                    return;
                };
                if flags.contains(wl_output::Mode::Current) {
                    this.state.pending.size = (width, height);
                    this.state.pending.refresh = refresh;
                }
            }
            Event::Done => this.state.commit(),
            Event::Scale { factor } => this.state.pending.scale = factor,
            Event::Name { name: _ } => {}
            Event::Description { description: _ } => {}
            _ => {}
        }
    }
}

impl Dispatch<WlSurface, ()> for Backend {
    fn event(
        _state: &mut Self,
        _proxy: &WlSurface,
        event: wl_surface::Event,
        &(): &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        use wl_surface::Event;
        match event {
            Event::Enter { output: _ } => {}
            Event::Leave { output: _ } => {}
            _ => {}
        }
    }
}
