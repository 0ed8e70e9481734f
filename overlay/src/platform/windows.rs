//! Win32 backend
//!
//! A layered popup (`WS_EX_LAYERED`) fed through `UpdateLayeredWindow`, so
//! every pixel carries its own alpha. The window keeps mouse input so the
//! left button can drag it around.

use std::ffi::c_void;
use std::mem::size_of;

use tracing::{debug, warn};
use windows::Win32::Foundation::{
    BOOL, COLORREF, HWND, LPARAM, LRESULT, POINT, RECT, SIZE, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION, CreateCompatibleDC, CreateDIBSection,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, EnumDisplayMonitors, GetDC, GetMonitorInfoW,
    HBITMAP, HDC, HGDIOBJ, HMONITOR, MONITORINFOEXW, ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos, HTCLIENT,
    HWND_TOPMOST, IDC_ARROW, LoadCursorW, MSG, PM_REMOVE, PeekMessageW, RegisterClassExW,
    SET_WINDOW_POS_FLAGS, SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SetWindowPos, ShowWindow,
    TranslateMessage, ULW_ALPHA, UpdateLayeredWindow, WM_DESTROY, WM_ERASEBKGND, WM_LBUTTONDOWN,
    WM_LBUTTONUP, WM_MOUSEMOVE, WM_NCHITTEST, WM_QUIT, WNDCLASSEXW, WS_EX_LAYERED,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
};
use windows::core::PCWSTR;

use super::{
    MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, clamp_to_virtual_screen,
    rgba_to_bgra,
};

const WINDOW_CLASS: &str = "ScLogMonitorOverlayClass";
const ERROR_CLASS_ALREADY_EXISTS: i32 = 1410;
const MONITORINFOF_PRIMARY: u32 = 1;
const AC_SRC_OVER: u8 = 0;
const AC_SRC_ALPHA: u8 = 1;

fn utf16z(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn os_error(call: &str, e: impl std::fmt::Display) -> PlatformError {
    PlatformError::Other(format!("{call} failed: {e}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Displays
// ─────────────────────────────────────────────────────────────────────────────

unsafe extern "system" fn collect_monitor(
    handle: HMONITOR,
    _dc: HDC,
    _clip: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let found = unsafe { &mut *(data.0 as *mut Vec<MonitorInfo>) };

    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;
    if unsafe { GetMonitorInfoW(handle, &mut info.monitorInfo) }.as_bool() {
        let bounds = info.monitorInfo.rcMonitor;
        let end = info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len());
        let name = String::from_utf16_lossy(&info.szDevice[..end]);
        let (width, height) = (
            (bounds.right - bounds.left).max(0) as u32,
            (bounds.bottom - bounds.top).max(0) as u32,
        );

        found.push(MonitorInfo {
            id: format!("{name} ({width}x{height}@{},{})", bounds.left, bounds.top),
            name,
            x: bounds.left,
            y: bounds.top,
            width,
            height,
            is_primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
        });
    }

    // Keep enumerating
    BOOL::from(true)
}

/// Every attached display, in enumeration order.
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let mut found: Vec<MonitorInfo> = Vec::new();
    let data = LPARAM(&mut found as *mut Vec<MonitorInfo> as isize);
    unsafe {
        let _ = EnumDisplayMonitors(None, None, Some(collect_monitor), data);
    }
    found
}

// ─────────────────────────────────────────────────────────────────────────────
// Backing surface
// ─────────────────────────────────────────────────────────────────────────────

/// Top-down 32-bit DIB selected into a memory DC.
struct Surface {
    dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    bits: *mut u8,
    len: usize,
}

impl Surface {
    fn new(width: u32, height: u32) -> Result<Self, PlatformError> {
        let header = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        unsafe {
            let screen = GetDC(HWND::default());
            let dc = CreateCompatibleDC(screen);
            let mut bits: *mut c_void = std::ptr::null_mut();
            let bitmap = CreateDIBSection(screen, &header, DIB_RGB_COLORS, &mut bits, None, 0);
            ReleaseDC(HWND::default(), screen);

            if dc.is_invalid() {
                return Err(PlatformError::BufferError("no memory DC".to_string()));
            }
            let bitmap = match bitmap {
                Ok(bitmap) if !bits.is_null() => bitmap,
                Ok(bitmap) => {
                    let _ = DeleteObject(bitmap);
                    let _ = DeleteDC(dc);
                    return Err(PlatformError::BufferError("DIB has no pixels".to_string()));
                }
                Err(e) => {
                    let _ = DeleteDC(dc);
                    return Err(PlatformError::BufferError(format!("CreateDIBSection: {e}")));
                }
            };
            let previous = SelectObject(dc, bitmap);

            Ok(Self {
                dc,
                bitmap,
                previous,
                bits: bits.cast::<u8>(),
                len: (width * height * 4) as usize,
            })
        }
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        // Valid for `len` bytes until the bitmap is deleted in Drop
        unsafe { std::slice::from_raw_parts_mut(self.bits, self.len) }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.dc);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Window
// ─────────────────────────────────────────────────────────────────────────────

/// Cursor and window position when a drag started, in screen coordinates.
#[derive(Debug, Clone, Copy)]
struct DragStart {
    cursor: POINT,
    window: (i32, i32),
}

pub struct WindowsOverlay {
    hwnd: HWND,
    surface: Surface,
    width: u32,
    height: u32,
    position: (i32, i32),
    rgba: Vec<u8>,
    monitors: Vec<MonitorInfo>,
    drag: Option<DragStart>,
    running: bool,
}

fn ensure_window_class() -> Result<(), PlatformError> {
    let name = utf16z(WINDOW_CLASS);
    unsafe {
        let module = GetModuleHandleW(None).map_err(|e| os_error("GetModuleHandleW", e))?;
        let class = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(overlay_wndproc),
            hInstance: module.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: PCWSTR(name.as_ptr()),
            ..Default::default()
        };
        if RegisterClassExW(&class) == 0 {
            let e = std::io::Error::last_os_error();
            if e.raw_os_error() != Some(ERROR_CLASS_ALREADY_EXISTS) {
                return Err(os_error("RegisterClassExW", e));
            }
        }
    }
    Ok(())
}

fn cursor() -> POINT {
    let mut point = POINT::default();
    unsafe {
        let _ = GetCursorPos(&mut point);
    }
    point
}

fn keep_on_top(hwnd: HWND, x: i32, y: i32, flags: SET_WINDOW_POS_FLAGS) {
    unsafe {
        let _ = SetWindowPos(hwnd, HWND_TOPMOST, x, y, 0, 0, flags | SWP_NOSIZE | SWP_NOACTIVATE);
    }
}

impl WindowsOverlay {
    fn present(&mut self) {
        rgba_to_bgra(&self.rgba, self.surface.pixels_mut());

        let origin = POINT { x: 0, y: 0 };
        let target = POINT {
            x: self.position.0,
            y: self.position.1,
        };
        let size = SIZE {
            cx: self.width as i32,
            cy: self.height as i32,
        };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA,
        };

        unsafe {
            let screen = GetDC(HWND::default());
            let result = UpdateLayeredWindow(
                self.hwnd,
                screen,
                Some(&target),
                Some(&size),
                self.surface.dc,
                Some(&origin),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );
            ReleaseDC(HWND::default(), screen);
            if let Err(e) = result {
                warn!(error = %e, "Overlay update failed");
            }
        }
    }
}

impl OverlayPlatform for WindowsOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        ensure_window_class()?;

        let class = utf16z(WINDOW_CLASS);
        let title = utf16z(&config.title);
        let hwnd = unsafe {
            let module = GetModuleHandleW(None).map_err(|e| os_error("GetModuleHandleW", e))?;
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
                PCWSTR(class.as_ptr()),
                PCWSTR(title.as_ptr()),
                WS_POPUP,
                config.x,
                config.y,
                config.width as i32,
                config.height as i32,
                None,
                None,
                module,
                None,
            )
            .map_err(|e| os_error("CreateWindowExW", e))?
        };

        let surface = match Surface::new(config.width, config.height) {
            Ok(surface) => surface,
            Err(e) => {
                unsafe {
                    let _ = DestroyWindow(hwnd);
                }
                return Err(e);
            }
        };

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }
        debug!(
            x = config.x,
            y = config.y,
            width = config.width,
            height = config.height,
            "Layered window shown"
        );

        Ok(Self {
            hwnd,
            surface,
            width: config.width,
            height: config.height,
            position: (config.x, config.y),
            rgba: vec![0; (config.width * config.height * 4) as usize],
            monitors: get_all_monitors(),
            drag: None,
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
        self.position.0
    }

    fn y(&self) -> i32 {
        self.position.1
    }

    fn set_position(&mut self, x: i32, y: i32) {
        let clamped = clamp_to_virtual_screen(x, y, self.width, self.height, &self.monitors);
        if clamped != self.position {
            self.position = clamped;
            keep_on_top(self.hwnd, clamped.0, clamped.1, Default::default());
        }
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.rgba)
    }

    fn commit(&mut self) {
        self.present();
    }

    fn raise(&mut self) {
        keep_on_top(self.hwnd, 0, 0, SWP_NOMOVE);
    }

    fn poll_events(&mut self) -> bool {
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, self.hwnd, 0, 0, PM_REMOVE) }.as_bool() {
            match msg.message {
                WM_QUIT | WM_DESTROY => self.running = false,
                WM_LBUTTONDOWN => {
                    self.drag = Some(DragStart {
                        cursor: cursor(),
                        window: self.position,
                    });
                    unsafe {
                        let _ = SetCapture(self.hwnd);
                    }
                }
                WM_LBUTTONUP => {
                    self.drag = None;
                    unsafe {
                        let _ = ReleaseCapture();
                    }
                }
                WM_MOUSEMOVE => {
                    if let Some(start) = self.drag {
                        let now = cursor();
                        self.set_position(
                            start.window.0 + now.x - start.cursor.x,
                            start.window.1 + now.y - start.cursor.y,
                        );
                    }
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        }
        self.running
    }

    fn take_damaged(&mut self) -> bool {
        // Layered windows keep their last committed pixels
        false
    }

    fn get_monitors(&self) -> Vec<MonitorInfo> {
        get_all_monitors()
    }
}

impl Drop for WindowsOverlay {
    fn drop(&mut self) {
        if !self.hwnd.is_invalid() {
            unsafe {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Whole window is client area, so clicks reach the drag handler
        WM_NCHITTEST => LRESULT(HTCLIENT as isize),
        WM_ERASEBKGND => LRESULT(1),
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}
