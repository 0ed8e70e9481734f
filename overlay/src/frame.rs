//! Overlay frame
//!
//! `OverlayFrame` owns a platform window together with the pixmap and text
//! renderer that draw into it, and paints the chrome shared by every frame:
//! - Transparent background
//! - A faint top border and a blue drag-indicator gradient
//! - Styled text lines with a dark glow so they stay readable over the game

use sclm_core::render::Segment;
use tiny_skia::{
    Color, GradientStop, LinearGradient, Paint, Pixmap, Point, Rect, SpreadMode, Transform,
};

use crate::platform::{OverlayPlatform, PlatformError};
use crate::renderer::Renderer;
use crate::utils::{color_from_rgb, text_shadow};

pub const BORDER_HEIGHT: f32 = 3.0;
pub const INDICATOR_HEIGHT: f32 = 4.0;
/// Space between the chrome and the first line, and left of every line.
pub const TEXT_PADDING: f32 = 8.0;

pub struct OverlayFrame<P> {
    window: P,
    pixmap: Pixmap,
    renderer: Renderer,
    font_size: f32,
}

impl<P: OverlayPlatform> OverlayFrame<P> {
    pub fn new(window: P, font_size: u32) -> Result<Self, PlatformError> {
        let pixmap = Pixmap::new(window.width(), window.height()).ok_or_else(|| {
            PlatformError::BufferError(format!(
                "cannot allocate a {}x{} pixmap",
                window.width(),
                window.height()
            ))
        })?;

        Ok(Self {
            window,
            pixmap,
            renderer: Renderer::new(),
            font_size: font_size as f32,
        })
    }

    pub fn window(&self) -> &P {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut P {
        &mut self.window
    }

    pub fn line_height(&self) -> f32 {
        self.font_size + crate::layout::LINE_SPACING as f32
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Clear to transparent and draw the chrome.
    pub fn begin_frame(&mut self) {
        let width = self.pixmap.width() as f32;
        self.pixmap.fill(Color::TRANSPARENT);

        if let Some(border) = Rect::from_xywh(0.0, 0.0, width, BORDER_HEIGHT) {
            let mut paint = Paint::default();
            paint.set_color_rgba8(255, 255, 255, 102);
            self.pixmap
                .fill_rect(border, &paint, Transform::identity(), None);
        }

        let gradient = LinearGradient::new(
            Point::from_xy(0.0, 0.0),
            Point::from_xy(width, 0.0),
            vec![
                GradientStop::new(0.0, Color::from_rgba8(30, 144, 255, 0)),
                GradientStop::new(0.5, Color::from_rgba8(30, 144, 255, 191)),
                GradientStop::new(1.0, Color::from_rgba8(30, 144, 255, 0)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        );
        if let (Some(shader), Some(strip)) = (
            gradient,
            Rect::from_xywh(0.0, BORDER_HEIGHT, width, INDICATOR_HEIGHT),
        ) {
            let paint = Paint {
                shader,
                ..Paint::default()
            };
            self.pixmap
                .fill_rect(strip, &paint, Transform::identity(), None);
        }
    }

    /// Draw one rendered line as the `row`-th line of text.
    pub fn draw_line(&mut self, row: usize, segments: &[Segment]) {
        let top = BORDER_HEIGHT + INDICATOR_HEIGHT + TEXT_PADDING + row as f32 * self.line_height();
        let right_edge = self.pixmap.width() as f32 - TEXT_PADDING;
        let mut x = TEXT_PADDING;

        for segment in segments {
            if x >= right_edge {
                break;
            }
            let color = color_from_rgb(segment.style.color());
            let advance = self.draw_text_glowed(&segment.text, x, top, color);

            if segment.link.is_some() {
                let underline_y = top + self.font_size * 1.15;
                self.fill_rect(x, underline_y, advance, 1.0, color);
            }
            x += advance;
        }
    }

    /// Hand the pixels to the window.
    pub fn end_frame(&mut self) {
        if let Some(buffer) = self.window.pixel_buffer() {
            let pixels = self.pixmap.data();
            if buffer.len() == pixels.len() {
                buffer.copy_from_slice(pixels);
            }
        }
        self.window.commit();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Drawing helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        if let Some(rect) = Rect::from_xywh(x, y, width, height) {
            let mut paint = Paint::default();
            paint.set_color(color);
            self.pixmap
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    /// Draw bold text with a surrounding dark glow. Returns the advance width.
    pub fn draw_text_glowed(&mut self, text: &str, x: f32, y: f32, color: Color) -> f32 {
        let shadow = text_shadow();
        let d = 1.0_f32;
        for &(dx, dy) in &[
            (-d, -d),
            (0.0, -d),
            (d, -d),
            (-d, 0.0),
            (d, 0.0),
            (-d, d),
            (0.0, d),
            (d, d),
        ] {
            self.renderer.draw_text(
                &mut self.pixmap,
                text,
                x + dx,
                y + dy,
                self.font_size,
                shadow,
                true,
            );
        }
        self.renderer
            .draw_text(&mut self.pixmap, text, x, y, self.font_size, color, true)
    }

    pub fn measure_text(&mut self, text: &str) -> (f32, f32) {
        self.renderer.measure_text(text, self.font_size, true)
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data()
    }
}
