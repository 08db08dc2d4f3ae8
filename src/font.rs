//! The font interface consumed by the renderer.
//!
//! Rasterization lives outside this crate; the painter only needs
//! pre-shaped per-codepoint glyphs and the font's line metrics. Glyph
//! bitmaps are either 8-bit coverage masks tinted with the resolved
//! foreground, or pre-rendered ARGB images composited as-is (color emoji).

use std::sync::Arc;

use unicode_width::UnicodeWidthChar;

/// Pixel format of a glyph bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphFormat {
    /// 8-bit coverage mask, one byte per pixel.
    AlphaMask,
    /// Pre-rendered premultiplied ARGB32, four bytes per pixel.
    Rgba,
}

/// A rasterized glyph for a single code point.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Bitmap rows, `stride` bytes apart. Shared so lookups stay cheap.
    pub data: Arc<[u8]>,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    /// Horizontal bearing from the pen position.
    pub x: i32,
    /// Vertical bearing above the baseline.
    pub y: i32,
    /// Terminal columns this glyph occupies (2 for wide CJK forms).
    pub cols: u8,
    pub format: GlyphFormat,
}

/// Extents shared by every glyph in the font.
#[derive(Debug, Clone, Copy)]
pub struct FontExtents {
    pub height: i32,
    pub ascent: i32,
    pub descent: i32,
    /// Advance of the widest single-column glyph: the cell width.
    pub max_advance: i32,
}

/// Placement of an underline or strikeout bar, relative to the baseline.
#[derive(Debug, Clone, Copy)]
pub struct LineMetrics {
    /// Distance above the baseline (negative = below).
    pub position: i32,
    pub thickness: i32,
}

/// Glyph source for the renderer.
///
/// Implementations must be shareable across render workers.
pub trait Font: Send + Sync {
    /// Looks up the glyph for one code point. `None` means the renderer
    /// paints background (and cursor) only and advances a single column.
    fn glyph_for(&self, wc: char) -> Option<Glyph>;

    fn extents(&self) -> FontExtents;

    fn underline(&self) -> LineMetrics;

    fn strikeout(&self) -> LineMetrics;
}

/// Column count for a code point when the font has no glyph to say.
///
/// SOFT HYPHEN (U+00AD) deliberately reports 1, matching the width table
/// the renderer was built against.
pub fn fallback_width(wc: char) -> usize {
    wc.width().unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_width_wide_and_narrow() {
        assert_eq!(fallback_width('a'), 1);
        assert_eq!(fallback_width('宽'), 2);
        // Control chars never advance zero columns.
        assert_eq!(fallback_width('\u{1}'), 1);
    }

    #[test]
    fn soft_hyphen_keeps_width_one() {
        assert_eq!(fallback_width('\u{ad}'), 1);
    }
}
