//! Always-on-top overlay for the log monitor
//!
//! A frameless, transparent strip pinned to the top of a display that shows
//! the last few records the monitor rendered. The window can be dragged with
//! the left mouse button and is re-raised periodically so the game cannot
//! bury it.
//!
//! # Layers
//!
//! - [`platform`] - native windows (X11 on Linux, Win32 on Windows)
//! - [`Renderer`] - text rasterization with cosmic-text into a tiny-skia pixmap
//! - [`OverlayFrame`] - window chrome plus styled line drawing
//! - [`OverlaySink`] - the [`sclm_core::Sink`] the dispatcher feeds

mod buffer;
mod frame;
pub mod layout;
pub mod platform;
mod renderer;
mod sink;
pub mod utils;

pub use buffer::LineBuffer;
pub use frame::OverlayFrame;
pub use layout::{Geometry, overlay_geometry, overlay_height, select_monitor};
pub use platform::{MonitorInfo, NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError};
pub use renderer::Renderer;
pub use sink::OverlaySink;
