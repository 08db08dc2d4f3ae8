//! Shared fixtures: a deterministic font and pixel-probing helpers.
#![allow(dead_code)]

use std::sync::Arc;

use wayterm::font::{Font, FontExtents, Glyph, GlyphFormat, LineMetrics, fallback_width};
use wayterm::render::color::Palette;
use wayterm::term::Terminal;

/// Cell metrics the test font reports.
pub const CW: usize = 8;
pub const CH: usize = 16;

/// A code point the test font has no glyph for.
pub const MISSING_GLYPH: char = '\u{f8ff}';

/// Fixed-cell font with solid-coverage glyphs: every painted glyph is a
/// filled box, so "glyph present" and "background only" are trivially
/// distinguishable at the pixel level.
pub struct TestFont;

fn mask_glyph(width: i32, height: i32, cols: u8) -> Glyph {
    // Cairo requires 4-byte aligned strides.
    let stride = (width + 3) & !3;
    let data: Arc<[u8]> = vec![0xff; (stride * height) as usize].into();
    Glyph {
        data,
        width,
        height,
        stride,
        x: 1,
        y: 11,
        cols,
        format: GlyphFormat::AlphaMask,
    }
}

impl Font for TestFont {
    fn glyph_for(&self, wc: char) -> Option<Glyph> {
        if wc == MISSING_GLYPH {
            return None;
        }
        if fallback_width(wc) > 1 {
            Some(mask_glyph(12, 12, 2))
        } else {
            Some(mask_glyph(6, 12, 1))
        }
    }

    fn extents(&self) -> FontExtents {
        FontExtents {
            height: CH as i32,
            ascent: 12,
            descent: 4,
            max_advance: CW as i32,
        }
    }

    fn underline(&self) -> LineMetrics {
        LineMetrics {
            position: -2,
            thickness: 2,
        }
    }

    fn strikeout(&self) -> LineMetrics {
        LineMetrics {
            position: 4,
            thickness: 2,
        }
    }
}

pub fn test_font() -> Arc<dyn Font> {
    Arc::new(TestFont)
}

pub fn term(cols: usize, rows: usize, scrollback: usize) -> Terminal {
    Terminal::new(cols, rows, scrollback, CW, CH, 1, Palette::default())
}

/// ARGB32 canvas exactly covering the grid.
pub struct Canvas {
    pub buf: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

impl Canvas {
    pub fn for_grid(cols: usize, rows: usize) -> Self {
        let width = (cols * CW) as i32;
        let height = (rows * CH) as i32;
        Self {
            buf: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let off = y * self.stride() + x * 4;
        self.buf[off..off + 4].try_into().unwrap()
    }

    /// Bytes of one cell's pixel rectangle.
    pub fn cell_region(&self, col: usize, row: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(CW * CH * 4);
        for y in row * CH..(row + 1) * CH {
            let off = y * self.stride() + col * CW * 4;
            out.extend_from_slice(&self.buf[off..off + CW * 4]);
        }
        out
    }

    /// Bytes of one full row band.
    pub fn row_region(&self, row: usize) -> Vec<u8> {
        let start = row * CH * self.stride();
        self.buf[start..start + CH * self.stride()].to_vec()
    }
}

/// Default palette background as stored by cairo (premultiplied ARGB32,
/// little endian).
pub const BG_PIXEL: [u8; 4] = [0x11, 0x11, 0x11, 0xff];
/// Default palette foreground.
pub const FG_PIXEL: [u8; 4] = [0xcc, 0xdc, 0xdc, 0xff];

/// True when every viewport cell has its clean bit set.
pub fn view_all_clean(term: &Terminal) -> bool {
    let grid = term.grid();
    (0..term.rows()).all(|r| grid.row_in_view(r).map(|row| row.all_clean()).unwrap_or(false))
}
