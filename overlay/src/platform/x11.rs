//! X11 platform implementation for overlay windows
//!
//! Creates a 32-bit ARGB override-redirect window so the window manager
//! neither decorates nor moves it. Per-pixel transparency needs a running
//! compositor; without one the transparent areas show black.

use std::fmt::Display;

use tracing::{debug, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ConnectionError;
use x11rb::protocol::Event;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{
    AtomEnum, ColormapAlloc, ConfigureWindowAux, ConnectionExt as _, CreateGCAux,
    CreateWindowAux, EventMask, ImageFormat, PropMode, Screen, StackMode, VisualClass, Visualid,
    Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{
    MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, clamp_to_virtual_screen,
    rgba_to_bgra,
};

/// Fixed part of a PutImage request.
const PUT_IMAGE_HEADER_BYTES: usize = 24;

const LEFT_BUTTON: u8 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

/// Get all connected monitors without requiring an existing overlay window.
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    match RustConnection::connect(None) {
        Ok((conn, screen_num)) => match conn.setup().roots.get(screen_num) {
            Some(screen) => query_monitors(&conn, screen),
            None => Vec::new(),
        },
        Err(e) => {
            warn!(error = %e, "Cannot connect to the X server");
            Vec::new()
        }
    }
}

/// Monitors as reported by RandR, or the whole screen when RandR is missing.
fn query_monitors(conn: &RustConnection, screen: &Screen) -> Vec<MonitorInfo> {
    let reply = conn
        .randr_get_monitors(screen.root, true)
        .map_err(x11rb::errors::ReplyError::from)
        .and_then(|cookie| cookie.reply());

    let monitors = match reply {
        Ok(reply) => reply.monitors,
        Err(e) => {
            debug!(error = %e, "RandR monitor query failed, using the root window");
            Vec::new()
        }
    };

    if monitors.is_empty() {
        let (width, height) = (
            u32::from(screen.width_in_pixels),
            u32::from(screen.height_in_pixels),
        );
        return vec![MonitorInfo {
            id: format!("screen ({}x{}@0,0)", width, height),
            name: "screen".to_string(),
            x: 0,
            y: 0,
            width,
            height,
            is_primary: true,
        }];
    }

    monitors
        .into_iter()
        .enumerate()
        .map(|(index, monitor)| {
            let name = conn
                .get_atom_name(monitor.name)
                .ok()
                .and_then(|cookie| cookie.reply().ok())
                .map(|reply| String::from_utf8_lossy(&reply.name).into_owned())
                .unwrap_or_else(|| format!("monitor-{}", index));
            let (x, y) = (i32::from(monitor.x), i32::from(monitor.y));
            let (width, height) = (u32::from(monitor.width), u32::from(monitor.height));

            MonitorInfo {
                id: format!("{} ({}x{}@{},{})", name, width, height, x, y),
                name,
                x,
                y,
                width,
                height,
                is_primary: monitor.primary,
            }
        })
        .collect()
}

fn find_argb_visual(screen: &Screen) -> Option<Visualid> {
    screen
        .allowed_depths
        .iter()
        .filter(|depth| depth.depth == 32)
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.class == VisualClass::TRUE_COLOR)
        .map(|visual| visual.visual_id)
}

fn x11_error(e: impl Display) -> PlatformError {
    PlatformError::Other(format!("X11: {}", e))
}

fn to_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Overlay Window
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct DragStart {
    pointer_x: i32,
    pointer_y: i32,
    window_x: i32,
    window_y: i32,
}

pub struct X11Overlay {
    conn: RustConnection,
    screen: Screen,
    window: Window,
    gc: u32,
    colormap: u32,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    pixel_data: Vec<u8>,
    bgra_buffer: Vec<u8>,
    monitors: Vec<MonitorInfo>,
    drag: Option<DragStart>,
    damaged: bool,
    running: bool,
}

impl X11Overlay {
    fn put_image(&mut self) -> Result<(), ConnectionError> {
        rgba_to_bgra(&self.pixel_data, &mut self.bgra_buffer);

        let stride = self.width as usize * 4;
        if stride == 0 || self.height == 0 {
            return Ok(());
        }

        // Large windows exceed the request size limit; send them in bands
        let max_payload = self
            .conn
            .maximum_request_bytes()
            .saturating_sub(PUT_IMAGE_HEADER_BYTES);
        let rows_per_request = (max_payload / stride).max(1);

        for (band, rows) in self.bgra_buffer.chunks(rows_per_request * stride).enumerate() {
            let top = band * rows_per_request;
            let band_height = rows.len() / stride;
            self.conn.put_image(
                ImageFormat::Z_PIXMAP,
                self.window,
                self.gc,
                to_u16(self.width),
                to_u16(band_height as u32),
                0,
                to_i16(top as i32),
                0,
                32,
                rows,
            )?;
        }
        self.conn.flush()
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Expose(e) if e.count == 0 => self.damaged = true,
            Event::ButtonPress(e) if e.detail == LEFT_BUTTON => {
                self.drag = Some(DragStart {
                    pointer_x: i32::from(e.root_x),
                    pointer_y: i32::from(e.root_y),
                    window_x: self.x,
                    window_y: self.y,
                });
            }
            Event::ButtonRelease(e) if e.detail == LEFT_BUTTON => self.drag = None,
            Event::MotionNotify(e) => {
                if let Some(start) = self.drag {
                    let dx = i32::from(e.root_x) - start.pointer_x;
                    let dy = i32::from(e.root_y) - start.pointer_y;
                    self.set_position(start.window_x + dx, start.window_y + dy);
                }
            }
            Event::DestroyNotify(_) => self.running = false,
            Event::Error(e) => warn!(error = ?e, "X11 protocol error"),
            _ => {}
        }
    }
}

impl OverlayPlatform for X11Overlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(x11_error)?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .cloned()
            .ok_or(PlatformError::NoDisplay)?;
        let visual = find_argb_visual(&screen)
            .ok_or_else(|| PlatformError::Other("X11: no 32-bit TrueColor visual".to_string()))?;

        let colormap = conn.generate_id().map_err(x11_error)?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual)
            .map_err(x11_error)?;

        let window = conn.generate_id().map_err(x11_error)?;
        let attributes = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .override_redirect(1)
            .colormap(colormap)
            .event_mask(
                EventMask::EXPOSURE
                    | EventMask::BUTTON_PRESS
                    | EventMask::BUTTON_RELEASE
                    | EventMask::BUTTON1_MOTION
                    | EventMask::STRUCTURE_NOTIFY,
            );
        conn.create_window(
            32,
            window,
            screen.root,
            to_i16(config.x),
            to_i16(config.y),
            to_u16(config.width),
            to_u16(config.height),
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &attributes,
        )
        .map_err(x11_error)?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            config.title.as_bytes(),
        )
        .map_err(x11_error)?;

        let gc = conn.generate_id().map_err(x11_error)?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(x11_error)?;

        conn.map_window(window).map_err(x11_error)?;
        conn.flush().map_err(x11_error)?;

        let monitors = query_monitors(&conn, &screen);
        let size = (config.width * config.height * 4) as usize;
        debug!(
            x = config.x,
            y = config.y,
            width = config.width,
            height = config.height,
            "Created X11 overlay window"
        );

        Ok(Self {
            conn,
            screen,
            window,
            gc,
            colormap,
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            pixel_data: vec![0u8; size],
            bgra_buffer: vec![0u8; size],
            monitors,
            drag: None,
            damaged: false,
            running: true,
        })
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn x(&self) -> i32 {
        self.x
    }

    fn y(&self) -> i32 {
        self.y
    }

    fn set_position(&mut self, x: i32, y: i32) {
        let (x, y) = clamp_to_virtual_screen(x, y, self.width, self.height, &self.monitors);
        if x == self.x && y == self.y {
            return;
        }
        self.x = x;
        self.y = y;

        let moved = self
            .conn
            .configure_window(self.window, &ConfigureWindowAux::new().x(x).y(y))
            .map(|_| ())
            .and_then(|()| self.conn.flush());
        if let Err(e) = moved {
            warn!(error = %e, "Failed to move overlay window");
        }
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.pixel_data)
    }

    fn commit(&mut self) {
        if let Err(e) = self.put_image() {
            warn!(error = %e, "Failed to draw overlay window");
            self.running = false;
        }
    }

    fn raise(&mut self) {
        let raised = self
            .conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .map(|_| ())
            .and_then(|()| self.conn.flush());
        if let Err(e) = raised {
            warn!(error = %e, "Failed to raise overlay window");
        }
    }

    fn poll_events(&mut self) -> bool {
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Lost connection to the X server");
                    self.running = false;
                    break;
                }
            }
        }
        self.running
    }

    fn take_damaged(&mut self) -> bool {
        std::mem::take(&mut self.damaged)
    }

    fn get_monitors(&self) -> Vec<MonitorInfo> {
        query_monitors(&self.conn, &self.screen)
    }
}

impl Drop for X11Overlay {
    fn drop(&mut self) {
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_colormap(self.colormap);
        let _ = self.conn.flush();
    }
}
