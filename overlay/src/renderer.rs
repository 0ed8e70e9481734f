//! Text rasterization.
//!
//! Text is shaped with cosmic-text and its glyph coverage is blended into a
//! tiny-skia pixmap one run at a time.

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

/// Line box height relative to the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.25;

pub struct Renderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Loads the system font database. Slow; create once per window.
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        }
    }

    fn shape(&mut self, text: &str, font_size: f32, bold: bool) -> Buffer {
        let metrics = Metrics::new(font_size, font_size * LINE_HEIGHT_FACTOR);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);

        let weight = if bold { Weight::BOLD } else { Weight::NORMAL };
        let attrs = Attrs::new().family(Family::Monospace).weight(weight);
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);
        buffer
    }

    /// Width and height of `text` laid out on a single line.
    pub fn measure_text(&mut self, text: &str, font_size: f32, bold: bool) -> (f32, f32) {
        let buffer = self.shape(text, font_size, bold);
        let width = buffer
            .layout_runs()
            .map(|run| run.line_w)
            .fold(0.0_f32, f32::max);
        let lines = buffer.layout_runs().count().max(1);
        (width, lines as f32 * font_size * LINE_HEIGHT_FACTOR)
    }

    /// Draw `text` with its line box's top-left corner at (`x`, `y`).
    ///
    /// Returns the advance width.
    pub fn draw_text(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Color,
        bold: bool,
    ) -> f32 {
        if text.is_empty() {
            return 0.0;
        }

        let buffer = self.shape(text, font_size, bold);
        let advance = buffer
            .layout_runs()
            .map(|run| run.line_w)
            .fold(0.0_f32, f32::max);

        let rgba = color.to_color_u8();
        let text_color =
            cosmic_text::Color::rgba(rgba.red(), rgba.green(), rgba.blue(), rgba.alpha());

        let Self {
            font_system,
            swash_cache,
        } = self;
        let mut paint = Paint {
            anti_alias: false,
            ..Paint::default()
        };
        buffer.draw(
            font_system,
            swash_cache,
            text_color,
            |gx, gy, width, height, coverage| {
                if coverage.a() == 0 {
                    return;
                }
                let Some(rect) = Rect::from_xywh(
                    x + gx as f32,
                    y + gy as f32,
                    width as f32,
                    height as f32,
                ) else {
                    return;
                };
                paint.set_color_rgba8(coverage.r(), coverage.g(), coverage.b(), coverage.a());
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            },
        );

        advance
    }
}
