//! The frame driver.
//!
//! One call renders one frame into an acquired shm canvas: erase the
//! previous cursor, honor flash and buffer-identity full refreshes,
//! apply queued scroll moves, dispatch dirty rows to the pool (or paint
//! them inline), fence, overlay the cursor, and hand the caller the
//! commit decision plus the damage list. The compositor's frame
//! callback is the only clock; the caller must not invoke this while a
//! callback is outstanding.

use std::sync::Arc;

use cairo::Operator;
use log::{debug, warn};

use crate::font::Font;
use crate::render::color::Argb;
use crate::render::painter::{self, CanvasPtr, PaintParams};
use crate::render::workers::{FrameJob, RowPtr, WorkerPool};
use crate::term::cell::Row;
use crate::term::damage::ScrollDamage;
use crate::term::{BlinkPhase, Terminal};
use crate::util::Rect;

/// Premultiplied half-translucent yellow for the visual bell tint.
const FLASH_TINT: Argb = Argb {
    a: 0x7fff,
    r: 0x7fff,
    g: 0x7fff,
    b: 0,
};

/// Where the cursor was drawn last frame, so it can be erased.
#[derive(Debug, Clone, Copy)]
struct LastCursor {
    abs_row: usize,
    col: usize,
}

/// What the caller does with the buffer after the frame.
#[derive(Debug)]
pub struct FrameOutcome {
    /// False means nothing observable changed: release the buffer back
    /// to the pool and do not commit.
    pub committed: bool,
    /// Buffer-pixel rectangles the compositor must re-read.
    pub damage: Vec<Rect>,
}

pub struct Renderer {
    workers: WorkerPool,
    last_buf: Option<usize>,
    last_cursor: Option<LastCursor>,
    was_flashing: bool,
}

impl Renderer {
    pub fn new(worker_count: usize) -> Self {
        Self {
            workers: WorkerPool::new(worker_count),
            last_buf: None,
            last_cursor: None,
            was_flashing: false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.count()
    }

    /// Renders one frame into `canvas` (ARGB32, `width * 4` stride).
    pub fn render_frame(
        &mut self,
        term: &mut Terminal,
        font: &Arc<dyn Font>,
        canvas: &mut [u8],
        width: i32,
        height: i32,
    ) -> FrameOutcome {
        let stride = width * 4;
        let buf_id = canvas.as_ptr() as usize;
        let mut damage: Vec<Rect> = Vec::new();
        let mut all_clean = term.damage.is_empty();
        let rows = term.rows();

        let params = PaintParams {
            font: Arc::clone(font),
            palette: term.palette,
            selection: term.selection,
            view: term.grid().view,
            num_ring_rows: term.grid().num_rows(),
            cell_width: term.cell_width,
            cell_height: term.cell_height,
            scale: term.scale,
            cursor_style: term.cursor.style,
            reverse_video: term.reverse_video,
            blink_off: term.blink.phase == BlinkPhase::Off,
        };
        let canvas_view = CanvasPtr::from_slice(canvas, width, height, stride);

        // Erase the cursor drawn last frame. If its cell is still clean
        // the row dispatch would skip it, so repaint it here without the
        // cursor; a moved cursor always forces a commit.
        if let Some(last) = self.last_cursor.take() {
            if last.abs_row != term.cursor_abs() || last.col != term.cursor.col {
                all_clean = false;
            }
            let grid = term.grid_mut();
            if let Some(vr) = grid.view_row_of(last.abs_row, rows) {
                let row = grid.row_abs_mut(last.abs_row);
                if last.col < row.cells.len() && row.cells[last.col].is_clean() {
                    row.cells[last.col].invalidate();
                    if let Some(rect) =
                        painter::render_cell_band(&params, &canvas_view, row, vr, last.col, false)
                    {
                        damage.push(rect);
                    }
                }
            }
        }

        // Flash transitions and buffers this renderer has not painted
        // yet need everything redone, margins included.
        let buffer_is_new = self.last_buf != Some(buf_id);
        let flash_ended = self.was_flashing && !term.flash;
        if term.flash || buffer_is_new || flash_ended {
            if buffer_is_new {
                debug!("painting into a fresh buffer, forcing full refresh");
            }
            paint_margins(term, &canvas_view, &mut damage);
            term.damage_view();
            all_clean = false;
        }
        self.last_buf = Some(buf_id);

        // Bulk-move scrolled bands before any cell repaint so the two
        // representations agree.
        let records: Vec<ScrollDamage> = term.damage.drain().collect();
        for record in &records {
            apply_scroll(&canvas_view, term.cell_height, record, &mut damage);
        }

        // Re-evaluate blink before dispatch: the grid is off-limits to
        // this thread once workers hold row pointers.
        let any_blink = term.any_visible_blink();
        if term.blink.armed && !any_blink {
            term.blink.disarm();
        } else if !term.blink.armed && any_blink {
            term.blink.arm();
        }

        let dispatched = if self.workers.count() > 0 {
            self.dispatch_parallel(term, &params, canvas_view, &mut damage)
        } else {
            dispatch_inline(term, &params, &canvas_view, &mut damage)
        };
        if dispatched {
            all_clean = false;
        }

        // Cursor overlay: a second pass strictly after the done fence.
        // Repainting an unmoved cursor reproduces last frame's pixels,
        // so it does not by itself force a commit.
        if term.cursor_visible() {
            let abs = term.cursor_abs();
            let col = term.cursor.col;
            let grid = term.grid_mut();
            if let Some(vr) = grid.view_row_of(abs, rows) {
                let row = grid.row_abs_mut(abs);
                if col < row.cells.len() {
                    row.cells[col].invalidate();
                    if let Some(rect) =
                        painter::render_cell_band(&params, &canvas_view, row, vr, col, true)
                    {
                        damage.push(rect);
                    }
                    self.last_cursor = Some(LastCursor { abs_row: abs, col });
                }
            }
        }

        self.was_flashing = term.flash;

        if all_clean {
            debug!("frame is clean, skipping commit");
            return FrameOutcome {
                committed: false,
                damage: Vec::new(),
            };
        }

        if term.flash {
            if let Some(full) = Rect::new(0, 0, width, height) {
                painter::fill_rect(&canvas_view, full, FLASH_TINT, Operator::Over);
                damage.push(full);
            }
        }

        FrameOutcome {
            committed: true,
            damage,
        }
    }

    /// Queues dirty viewport rows to the pool and blocks on the done
    /// fence. Returns whether any row was dispatched.
    fn dispatch_parallel(
        &self,
        term: &mut Terminal,
        params: &PaintParams,
        canvas: CanvasPtr,
        damage: &mut Vec<Rect>,
    ) -> bool {
        let rows = term.rows();
        let cols = term.cols();
        let (cw, ch) = (term.cell_width, term.cell_height);
        let grid = term.grid_mut();

        let mut row_ptrs: Vec<RowPtr> = (0..rows).map(|_| RowPtr(std::ptr::null_mut())).collect();
        let mut queued = Vec::new();
        let mut band = RowBand::new(cols * cw, ch);
        for r in 0..rows {
            let dirty = grid.row_in_view(r).map(|row| row.dirty).unwrap_or(false);
            if !dirty {
                continue;
            }
            let row = grid.row_in_view_mut(r);
            row.dirty = false;
            row_ptrs[r] = RowPtr(row as *mut Row);
            queued.push(r);
            band.add(r, damage);
        }
        band.flush(damage);
        if queued.is_empty() {
            return false;
        }

        self.workers.begin_frame(FrameJob {
            canvas,
            rows: row_ptrs,
            params: params.clone(),
        });
        for r in &queued {
            self.workers.dispatch_row(*r);
        }
        self.workers.finish_frame();
        true
    }
}

/// Single-threaded row dispatch for pools of size zero.
fn dispatch_inline(
    term: &mut Terminal,
    params: &PaintParams,
    canvas: &CanvasPtr,
    damage: &mut Vec<Rect>,
) -> bool {
    let rows = term.rows();
    let cols = term.cols();
    let (cw, ch) = (term.cell_width, term.cell_height);
    let grid = term.grid_mut();

    let mut any = false;
    let mut band = RowBand::new(cols * cw, ch);
    for r in 0..rows {
        let dirty = grid.row_in_view(r).map(|row| row.dirty).unwrap_or(false);
        if !dirty {
            continue;
        }
        let row = grid.row_in_view_mut(r);
        row.dirty = false;
        painter::render_row(params, canvas, row, r);
        band.add(r, damage);
        any = true;
    }
    band.flush(damage);
    any
}

/// Coalesces the damage of contiguous dirty rows into one rectangle per
/// run, so a full-screen repaint reports one band instead of one rect
/// per row.
struct RowBand {
    width: usize,
    cell_height: usize,
    current: Option<Rect>,
}

impl RowBand {
    fn new(width: usize, cell_height: usize) -> Self {
        Self {
            width,
            cell_height,
            current: None,
        }
    }

    fn add(&mut self, r: usize, damage: &mut Vec<Rect>) {
        let Some(rect) = Rect::new(
            0,
            (r * self.cell_height) as i32,
            self.width as i32,
            self.cell_height as i32,
        ) else {
            return;
        };
        self.current = Some(match self.current.take() {
            Some(prev) if prev.y + prev.height == rect.y => prev.union(&rect),
            Some(prev) => {
                damage.push(prev);
                rect
            }
            None => rect,
        });
    }

    fn flush(&mut self, damage: &mut Vec<Rect>) {
        if let Some(rect) = self.current.take() {
            damage.push(rect);
        }
    }
}

/// Fills the dead area right of and below the cell grid.
fn paint_margins(term: &Terminal, canvas: &CanvasPtr, damage: &mut Vec<Rect>) {
    let used_w = (term.cols() * term.cell_width) as i32;
    let used_h = (term.rows() * term.cell_height) as i32;
    let bg = Argb::from_rgb(term.palette.bg, term.palette.alpha);
    if let Some(right) = Rect::new(used_w, 0, canvas.width - used_w, canvas.height) {
        painter::fill_rect(canvas, right, bg, Operator::Source);
        damage.push(right);
    }
    if let Some(bottom) = Rect::new(0, used_h, used_w, canvas.height - used_h) {
        painter::fill_rect(canvas, bottom, bg, Operator::Source);
        damage.push(bottom);
    }
}

/// Applies one scroll record as a byte move between two row bands, then
/// records damage over the destination band.
fn apply_scroll(
    canvas: &CanvasPtr,
    cell_height: usize,
    record: &ScrollDamage,
    damage: &mut Vec<Rect>,
) {
    let stride = canvas.stride as usize;
    let (region, lines, down) = match record {
        ScrollDamage::Scroll { region, lines } => (region, *lines, false),
        ScrollDamage::ScrollReverse { region, lines } => (region, *lines, true),
    };
    let moved_rows = region.len().saturating_sub(lines);
    if moved_rows == 0 {
        return;
    }
    let band = moved_rows * cell_height * stride;
    let (src, dst) = if down {
        (
            region.start * cell_height * stride,
            (region.start + lines) * cell_height * stride,
        )
    } else {
        (
            (region.start + lines) * cell_height * stride,
            region.start * cell_height * stride,
        )
    };
    let limit = (canvas.height as usize) * stride;
    if src + band > limit || dst + band > limit {
        warn!("scroll record {:?} exceeds buffer, dropped", record);
        return;
    }
    canvas.shift(src, dst, band);

    let dst_row = if down { region.start + lines } else { region.start };
    if let Some(rect) = Rect::new(
        0,
        (dst_row * cell_height) as i32,
        canvas.width,
        (moved_rows * cell_height) as i32,
    ) {
        damage.push(rect);
    }
}
