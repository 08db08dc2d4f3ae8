//! The per-cell compositor.
//!
//! A pure function from cell state to pixels: every paint happens inside
//! a Cairo image surface wrapped around one row band of the shm canvas,
//! so workers on different rows never share cairo state. Color
//! resolution follows the triple-XOR rule: block cursor, reverse video
//! and selection each flip fg/bg, and an even number of flips cancels.

use cairo::{Context, Format, ImageSurface, Operator};
use log::warn;
use std::sync::Arc;

use crate::font::{Font, Glyph, GlyphFormat};
use crate::render::color::{ALPHA_OPAQUE, Argb, Palette};
use crate::term::cell::{CellAttrs, Row};
use crate::term::selection::Selection;
use crate::term::CursorStyle;
use crate::util::Rect;

/// Immutable paint inputs, fixed for the duration of one frame.
#[derive(Clone)]
pub struct PaintParams {
    pub font: Arc<dyn Font>,
    pub palette: Palette,
    pub selection: Selection,
    /// Ring index of the top viewport row.
    pub view: usize,
    /// Ring capacity of the grid being painted.
    pub num_ring_rows: usize,
    pub cell_width: usize,
    pub cell_height: usize,
    pub scale: u32,
    pub cursor_style: CursorStyle,
    /// Terminal-wide reverse video (DECSCNM).
    pub reverse_video: bool,
    /// Blink phase is currently Off: blinking glyphs are hidden.
    pub blink_off: bool,
}

/// Raw view of the target pixel buffer, shareable with render workers.
///
/// Workers may dereference it only between the frame's start post and
/// the done fence; see the worker pool for the full protocol.
#[derive(Clone, Copy)]
pub struct CanvasPtr {
    ptr: *mut u8,
    len: usize,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
}

impl CanvasPtr {
    pub fn from_slice(buf: &mut [u8], width: i32, height: i32, stride: i32) -> Self {
        debug_assert!(buf.len() >= (height * stride) as usize);
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            width,
            height,
            stride,
        }
    }

    /// Moves `len` bytes from offset `src` to offset `dst` with memmove
    /// semantics (the ranges may overlap). Main-thread only, outside the
    /// worker window.
    pub(crate) fn shift(&self, src: usize, dst: usize, len: usize) {
        assert!(src + len <= self.len && dst + len <= self.len);
        // SAFETY: both ranges are in bounds and ptr::copy permits
        // overlapping source and destination.
        unsafe { std::ptr::copy(self.ptr.add(src), self.ptr.add(dst), len) };
    }

    /// Wraps one horizontal band in a Cairo surface.
    ///
    /// # Safety
    ///
    /// The caller must be the sole writer of the band `[y, y + h)` for
    /// the lifetime of the returned surface, and the surface must be
    /// dropped before the underlying buffer goes away.
    unsafe fn band_surface(&self, y: i32, h: i32) -> Result<ImageSurface, cairo::Error> {
        debug_assert!(y >= 0 && y + h <= self.height);
        debug_assert!(((y + h) * self.stride) as usize <= self.len);
        unsafe {
            ImageSurface::create_for_data_unsafe(
                self.ptr.add((y * self.stride) as usize),
                Format::ARgb32,
                self.width,
                h,
                self.stride,
            )
        }
    }
}

/// Paints every non-clean cell of one viewport row into its band.
pub(crate) fn render_row(params: &PaintParams, canvas: &CanvasPtr, row: &mut Row, view_row: usize) {
    let h = params.cell_height as i32;
    let y = view_row as i32 * h;
    if y + h > canvas.height {
        return;
    }
    // SAFETY: each row index is dispatched to at most one painter per
    // frame, so this band has a single writer until the surface drops.
    let band = match unsafe { canvas.band_surface(y, h) } {
        Ok(band) => band,
        Err(err) => {
            warn!("failed to wrap row {} band: {}", view_row, err);
            return;
        }
    };
    let Ok(cr) = Context::new(&band) else {
        warn!("failed to create cairo context for row {}", view_row);
        return;
    };

    let mut col = 0;
    while col < row.cells.len() {
        let advance = render_cell(params, &cr, row, view_row, col, false);
        // Spacer cells under a wide glyph are covered by its fill.
        for spacer in col + 1..(col + advance).min(row.cells.len()) {
            row.cells[spacer].attrs.insert(CellAttrs::CLEAN);
        }
        col += advance.max(1);
    }

    band.flush();
    drop(cr);
}

/// Paints a single cell, with or without the cursor, directly from the
/// frame driver (cursor erase and overlay are main-thread passes).
///
/// Returns the damage rectangle when the cell was actually painted.
pub(crate) fn render_cell_band(
    params: &PaintParams,
    canvas: &CanvasPtr,
    row: &mut Row,
    view_row: usize,
    col: usize,
    has_cursor: bool,
) -> Option<Rect> {
    let h = params.cell_height as i32;
    let y = view_row as i32 * h;
    if y + h > canvas.height {
        return None;
    }
    // SAFETY: called on the main thread outside the worker window, so
    // the band has a single writer.
    let band = unsafe { canvas.band_surface(y, h) }.ok()?;
    let cr = Context::new(&band).ok()?;
    let cols = render_cell(params, &cr, row, view_row, col, has_cursor);
    band.flush();
    drop(cr);
    if cols == 0 {
        return None;
    }
    Rect::new(
        (col * params.cell_width) as i32,
        y,
        (cols * params.cell_width) as i32,
        h,
    )
}

/// The cell compositor: resolves colors, fills the background,
/// composites the glyph and draws decorations into the row band.
///
/// Returns the number of cell columns written, 0 when the cell was
/// already clean and untouched.
pub(crate) fn render_cell(
    params: &PaintParams,
    cr: &Context,
    row: &mut Row,
    view_row: usize,
    col: usize,
    has_cursor: bool,
) -> usize {
    let cell = &mut row.cells[col];
    if cell.is_clean() {
        return 0;
    }
    cell.attrs.insert(CellAttrs::CLEAN);
    let attrs = cell.attrs;
    let wc = cell.wc;
    let cell_fg = cell.fg;
    let cell_bg = cell.bg;

    let abs_row = (params.view + view_row) % params.num_ring_rows;
    let selected = params
        .selection
        .contains(abs_row, col, params.num_ring_rows);
    let block_cursor = has_cursor && params.cursor_style == CursorStyle::Block;

    let mut fg = if attrs.contains(CellAttrs::HAVE_FG) {
        cell_fg
    } else if params.reverse_video {
        params.palette.bg
    } else {
        params.palette.fg
    };
    let mut bg = if attrs.contains(CellAttrs::HAVE_BG) {
        cell_bg
    } else if params.reverse_video {
        params.palette.fg
    } else {
        params.palette.bg
    };

    // An even number of reversing sources cancels out.
    let flip = block_cursor ^ attrs.contains(CellAttrs::REVERSE) ^ selected;
    if flip {
        std::mem::swap(&mut fg, &mut bg);
    }

    let blink_hidden = attrs.contains(CellAttrs::BLINK) && params.blink_off;
    if blink_hidden {
        fg = bg;
    }

    let bg_alpha = if block_cursor {
        ALPHA_OPAQUE
    } else {
        params.palette.alpha
    };
    let mut fg_argb = Argb::opaque(fg);
    let mut bg_argb = Argb::from_rgb(bg, bg_alpha);
    if attrs.contains(CellAttrs::DIM) {
        fg_argb = fg_argb.dim();
    }
    if block_cursor {
        if let Some(cc) = params.palette.cursor_cursor.get() {
            bg_argb = Argb::opaque(cc);
        }
        if let Some(ct) = params.palette.cursor_text.get() {
            fg_argb = Argb::opaque(ct);
        }
    }

    let glyph = if wc == '\0' {
        None
    } else {
        params.font.glyph_for(wc)
    };
    let cell_cols = glyph
        .as_ref()
        .map(|g| (g.cols as usize).max(1))
        .unwrap_or(1);

    let cw = params.cell_width as f64;
    let ch = params.cell_height as f64;
    let x = col as f64 * cw;
    let extents = params.font.extents();

    // Background, replacing whatever the band held (including alpha).
    set_source(cr, bg_argb);
    cr.set_operator(Operator::Source);
    cr.rectangle(x, 0.0, cell_cols as f64 * cw, ch);
    let _ = cr.fill();
    cr.set_operator(Operator::Over);

    // A cell whose glyph is missing renders background and cursor only:
    // no bars either, they would advertise content that is not there.
    if !blink_hidden
        && !attrs.contains(CellAttrs::CONCEAL)
        && let Some(glyph) = glyph.as_ref()
    {
        composite_glyph(cr, glyph, fg_argb, x, extents.ascent);

        if attrs.contains(CellAttrs::UNDERLINE) {
            let ul = params.font.underline();
            bar(
                cr,
                fg_argb,
                x,
                baseline_bar_y(extents.ascent, ul.position, ul.thickness),
                cell_cols as f64 * cw,
                ul.thickness as f64,
            );
        }
        if attrs.contains(CellAttrs::STRIKETHROUGH) {
            let st = params.font.strikeout();
            bar(
                cr,
                fg_argb,
                x,
                baseline_bar_y(extents.ascent, st.position, st.thickness),
                cell_cols as f64 * cw,
                st.thickness as f64,
            );
        }
    }

    if has_cursor {
        let cursor_color = params
            .palette
            .cursor_cursor
            .get()
            .map(Argb::opaque)
            .unwrap_or(fg_argb);
        match params.cursor_style {
            // Block is entirely the fg/bg swap above.
            CursorStyle::Block => {}
            CursorStyle::Bar => {
                bar(cr, cursor_color, x, 0.0, params.scale as f64, ch);
            }
            CursorStyle::Underline => {
                let ul = params.font.underline();
                bar(
                    cr,
                    cursor_color,
                    x,
                    baseline_bar_y(extents.ascent, ul.position, ul.thickness),
                    cell_cols as f64 * cw,
                    ul.thickness as f64,
                );
            }
        }
    }

    cell_cols
}

/// Vertical placement of an underline/strikeout bar.
fn baseline_bar_y(ascent: i32, position: i32, thickness: i32) -> f64 {
    (ascent - position) as f64 - thickness as f64 / 2.0
}

fn set_source(cr: &Context, color: Argb) {
    let (r, g, b, a) = color.to_source();
    cr.set_source_rgba(r, g, b, a);
}

fn bar(cr: &Context, color: Argb, x: f64, y: f64, w: f64, h: f64) {
    set_source(cr, color);
    cr.rectangle(x, y, w, h);
    let _ = cr.fill();
}

/// Composites one glyph at the pen position.
///
/// Coverage masks multiply a solid fg source; pre-rendered color glyphs
/// are alpha-composited as-is.
fn composite_glyph(cr: &Context, glyph: &Glyph, fg: Argb, pen_x: f64, ascent: i32) {
    let gx = pen_x + glyph.x as f64;
    let gy = (ascent - glyph.y) as f64;
    let format = match glyph.format {
        GlyphFormat::AlphaMask => Format::A8,
        GlyphFormat::Rgba => Format::ARgb32,
    };
    // SAFETY: cairo only reads from this surface (mask or source), the
    // glyph data outlives it, and it is dropped before returning. The
    // const-to-mut cast is required by the cairo constructor signature.
    let surface = match unsafe {
        ImageSurface::create_for_data_unsafe(
            glyph.data.as_ptr() as *mut u8,
            format,
            glyph.width,
            glyph.height,
            glyph.stride,
        )
    } {
        Ok(surface) => surface,
        Err(err) => {
            warn!("failed to wrap glyph bitmap: {}", err);
            return;
        }
    };

    match glyph.format {
        GlyphFormat::AlphaMask => {
            set_source(cr, fg);
            let _ = cr.mask_surface(&surface, gx, gy);
        }
        GlyphFormat::Rgba => {
            if cr.set_source_surface(&surface, gx, gy).is_ok() {
                let _ = cr.paint();
            }
        }
    }
}

/// Fills one rectangle of the whole canvas, for margins and the flash
/// tint. Main-thread only.
pub(crate) fn fill_rect(canvas: &CanvasPtr, rect: Rect, color: Argb, op: Operator) {
    if !rect.is_valid() {
        return;
    }
    // SAFETY: called outside the worker window, single writer.
    let surface = match unsafe { canvas.band_surface(0, canvas.height) } {
        Ok(surface) => surface,
        Err(err) => {
            warn!("failed to wrap canvas: {}", err);
            return;
        }
    };
    let Ok(cr) = Context::new(&surface) else {
        return;
    };
    set_source(&cr, color);
    cr.set_operator(op);
    cr.rectangle(
        rect.x as f64,
        rect.y as f64,
        rect.width as f64,
        rect.height as f64,
    );
    let _ = cr.fill();
    surface.flush();
    drop(cr);
}
