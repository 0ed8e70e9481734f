//! Colour conversion between the shared palette and tiny-skia.

use sclm_core::render::Rgb;
use tiny_skia::Color;

/// Opaque tiny-skia colour for a palette entry.
#[inline]
pub fn color_from_rgb(rgb: Rgb) -> Color {
    Color::from_rgba8(rgb.0, rgb.1, rgb.2, 255)
}

/// Convert [u8; 4] RGBA array to tiny_skia Color
#[inline]
pub fn color_from_rgba(rgba: [u8; 4]) -> Color {
    Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Glow drawn behind overlay text.
pub fn text_shadow() -> Color {
    color_from_rgba([0, 0, 0, 160])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclm_core::render::palette;

    #[test]
    fn test_palette_colors_are_opaque() {
        let color = color_from_rgb(palette::TIMESTAMP).to_color_u8();
        assert_eq!(
            (color.red(), color.green(), color.blue(), color.alpha()),
            (0x1E, 0x90, 0xFF, 255)
        );
    }

    #[test]
    fn test_text_shadow_is_translucent() {
        let shadow = text_shadow().to_color_u8();
        assert_eq!(shadow.alpha(), 160);
        assert_eq!(shadow.red(), 0);
    }
}
