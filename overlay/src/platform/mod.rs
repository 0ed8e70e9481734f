//! Platform abstraction for overlay windows
//!
//! Every backend provides a frameless, always-on-top window with per-pixel
//! alpha that the user can drag with the left mouse button. Pixels are
//! handed over as premultiplied RGBA; backends convert to their native
//! layout on commit.

#[cfg(all(unix, not(target_os = "macos")))]
mod x11;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(all(unix, not(target_os = "macos")))]
pub use self::x11::{X11Overlay as NativeOverlay, get_all_monitors};

#[cfg(target_os = "windows")]
pub use self::windows::{WindowsOverlay as NativeOverlay, get_all_monitors};

#[cfg(not(any(all(unix, not(target_os = "macos")), target_os = "windows")))]
pub use self::unsupported::{UnsupportedOverlay as NativeOverlay, get_all_monitors};

/// Window creation parameters, in absolute screen coordinates.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Window title, shown by task switchers.
    pub title: String,
}

/// A connected display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Stable identifier including resolution and position.
    pub id: String,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("overlay windows are not supported on this platform")]
    Unsupported,

    #[error("no display available")]
    NoDisplay,

    #[error("pixel buffer error: {0}")]
    BufferError(String),

    #[error("{0}")]
    Other(String),
}

pub trait OverlayPlatform: Sized {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn x(&self) -> i32;
    fn y(&self) -> i32;

    /// Move the window, clamped to the visible desktop.
    fn set_position(&mut self, x: i32, y: i32);

    /// Premultiplied RGBA, `width * height * 4` bytes. Written before `commit`.
    fn pixel_buffer(&mut self) -> Option<&mut [u8]>;

    /// Push the pixel buffer to the screen.
    fn commit(&mut self);

    /// Put the window back on top of the stacking order.
    fn raise(&mut self);

    /// Pump pending window events. Returns `false` once the window is gone.
    fn poll_events(&mut self) -> bool;

    /// Whether the window system discarded our pixels since the last call.
    fn take_damaged(&mut self) -> bool;

    fn get_monitors(&self) -> Vec<MonitorInfo>;
}

/// Clamp a window position so it stays fully inside the bounding box of
/// all monitors.
pub fn clamp_to_virtual_screen(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    monitors: &[MonitorInfo],
) -> (i32, i32) {
    if monitors.is_empty() {
        return (x, y);
    }

    let min_x = monitors.iter().map(|m| m.x).min().unwrap_or(0);
    let min_y = monitors.iter().map(|m| m.y).min().unwrap_or(0);
    let max_x = monitors
        .iter()
        .map(|m| m.x + m.width as i32)
        .max()
        .unwrap_or(0);
    let max_y = monitors
        .iter()
        .map(|m| m.y + m.height as i32)
        .max()
        .unwrap_or(0);

    let clamped_x = x.min(max_x - width as i32).max(min_x);
    let clamped_y = y.min(max_y - height as i32).max(min_y);
    (clamped_x, clamped_y)
}

/// Convert premultiplied RGBA into the BGRA order both native backends take.
pub(crate) fn rgba_to_bgra(rgba: &[u8], bgra: &mut [u8]) {
    for (src, dst) in rgba.chunks_exact(4).zip(bgra.chunks_exact_mut(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = src[3];
    }
}

#[cfg(not(any(all(unix, not(target_os = "macos")), target_os = "windows")))]
mod unsupported {
    use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

    pub fn get_all_monitors() -> Vec<MonitorInfo> {
        Vec::new()
    }

    pub struct UnsupportedOverlay;

    impl OverlayPlatform for UnsupportedOverlay {
        fn new(_config: OverlayConfig) -> Result<Self, PlatformError> {
            Err(PlatformError::Unsupported)
        }

        fn width(&self) -> u32 {
            0
        }

        fn height(&self) -> u32 {
            0
        }

        fn x(&self) -> i32 {
            0
        }

        fn y(&self) -> i32 {
            0
        }

        fn set_position(&mut self, _x: i32, _y: i32) {}

        fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
            None
        }

        fn commit(&mut self) {}

        fn raise(&mut self) {}

        fn poll_events(&mut self) -> bool {
            false
        }

        fn take_damaged(&mut self) -> bool {
            false
        }

        fn get_monitors(&self) -> Vec<MonitorInfo> {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(x: i32, y: i32, width: u32, height: u32) -> MonitorInfo {
        MonitorInfo {
            id: format!("{}x{}@{},{}", width, height, x, y),
            name: "test".to_string(),
            x,
            y,
            width,
            height,
            is_primary: x == 0 && y == 0,
        }
    }

    #[test]
    fn test_clamp_keeps_window_on_screen() {
        let monitors = vec![monitor(0, 0, 1920, 1080), monitor(1920, 0, 1920, 1080)];

        assert_eq!(clamp_to_virtual_screen(100, 50, 400, 100, &monitors), (100, 50));
        assert_eq!(clamp_to_virtual_screen(-50, -10, 400, 100, &monitors), (0, 0));
        assert_eq!(
            clamp_to_virtual_screen(3700, 1050, 400, 100, &monitors),
            (3440, 980)
        );
    }

    #[test]
    fn test_clamp_without_monitors_is_identity() {
        assert_eq!(clamp_to_virtual_screen(-5, 7, 10, 10, &[]), (-5, 7));
    }

    #[test]
    fn test_rgba_to_bgra_swaps_red_and_blue() {
        let rgba = [1, 2, 3, 4, 10, 20, 30, 40];
        let mut bgra = [0u8; 8];
        rgba_to_bgra(&rgba, &mut bgra);
        assert_eq!(bgra, [3, 2, 1, 4, 30, 20, 10, 40]);
    }
}
