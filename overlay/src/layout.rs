//! Overlay placement.
//!
//! The overlay spans two thirds of its display's width, centred on the top
//! edge, and is exactly tall enough for the configured number of lines.

use crate::platform::MonitorInfo;

/// Vertical space per line on top of the font size.
pub const LINE_SPACING: u32 = 5;
/// Chrome and padding around the text block.
pub const VERTICAL_PADDING: u32 = 40;

/// Absolute screen rectangle of the overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub fn overlay_height(lines: usize, font_size: u32) -> u32 {
    let lines = u32::try_from(lines).unwrap_or(u32::MAX);
    lines
        .saturating_mul(font_size + LINE_SPACING)
        .saturating_add(VERTICAL_PADDING)
}

/// The display at `index`, or the primary display when out of range.
///
/// Falls back to the first display when none reports itself as primary.
pub fn select_monitor(monitors: &[MonitorInfo], index: usize) -> Option<&MonitorInfo> {
    monitors
        .get(index)
        .or_else(|| monitors.iter().find(|m| m.is_primary))
        .or_else(|| monitors.first())
}

pub fn overlay_geometry(monitor: &MonitorInfo, lines: usize, font_size: u32) -> Geometry {
    let width = monitor.width * 2 / 3;
    let x = monitor.x + i32::try_from((monitor.width - width) / 2).unwrap_or(0);
    Geometry {
        x,
        y: monitor.y,
        width,
        height: overlay_height(lines, font_size),
    }
}
