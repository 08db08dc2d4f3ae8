//! Terminal-side state: grids, cursor, selection, blink and flash.
//!
//! This module owns the data the renderer reads and the bookkeeping the
//! emulator mutates through. Every mutation keeps the damage model
//! consistent: touching a cell clears its `CLEAN` bit, scrolls append the
//! matching pixel-move record, viewport moves invalidate the view.

pub mod cell;
pub mod damage;
pub mod grid;
pub mod resize;
pub mod selection;

pub use cell::{Cell, CellAttrs, Row};
pub use damage::{DamageLog, ScrollDamage};
pub use grid::Grid;
pub use selection::{SelCoord, Selection};

use log::warn;

use crate::font::fallback_width;
use crate::render::RenderError;
use crate::render::blink::BlinkClock;
use crate::render::color::Palette;

/// Cursor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    /// Logical row, relative to the grid offset.
    pub row: usize,
    pub col: usize,
    pub style: CursorStyle,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPhase {
    On,
    Off,
}

/// Blink attribute state plus the timer that drives it.
///
/// Without a clock (or after a timer syscall failure) the phase stays
/// `On`: blinking content renders steadily instead of disappearing.
pub struct BlinkState {
    pub phase: BlinkPhase,
    pub armed: bool,
    degraded: bool,
    clock: Option<BlinkClock>,
}

impl BlinkState {
    pub fn new(clock: Option<BlinkClock>) -> Self {
        Self {
            phase: BlinkPhase::On,
            armed: false,
            degraded: false,
            clock,
        }
    }

    /// Starts the 500 ms cycle. A timer failure is logged once and the
    /// subsystem degrades to always-on.
    pub fn arm(&mut self) {
        if self.armed || self.degraded {
            return;
        }
        match self.clock.as_ref().map(BlinkClock::arm) {
            Some(Ok(())) => self.armed = true,
            Some(Err(err)) => {
                warn!("{}; blinking stays on", RenderError::TimerArmFailed(err));
                self.degraded = true;
                self.phase = BlinkPhase::On;
            }
            None => {
                self.degraded = true;
            }
        }
    }

    /// Stops the cycle and resets the phase so re-armed blinking starts
    /// visible.
    pub fn disarm(&mut self) {
        if self.armed
            && let Some(clock) = self.clock.as_ref()
            && let Err(err) = clock.disarm()
        {
            warn!("failed to disarm blink timer: {}", err);
        }
        self.armed = false;
        self.phase = BlinkPhase::On;
    }

    pub fn toggle(&mut self) {
        self.phase = match self.phase {
            BlinkPhase::On => BlinkPhase::Off,
            BlinkPhase::Off => BlinkPhase::On,
        };
    }

    pub fn clock(&self) -> Option<&BlinkClock> {
        self.clock.as_ref()
    }
}

/// Which grid is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Normal,
    Alt,
}

pub struct Terminal {
    normal: Grid,
    alt: Grid,
    screen: Screen,
    pub palette: Palette,
    pub cursor: Cursor,
    pub selection: Selection,
    pub blink: BlinkState,
    /// Visual-bell tint requested.
    pub flash: bool,
    /// Terminal-wide reverse video (DECSCNM).
    pub reverse_video: bool,
    /// Integer DPI multiplier.
    pub scale: u32,
    /// Cell metrics in buffer pixels (already scaled).
    pub cell_width: usize,
    pub cell_height: usize,
    rows: usize,
    cols: usize,
    scrollback: usize,
    /// Rows of scrollback actually filled so far.
    sb_filled: usize,
    pub damage: DamageLog,
}

impl Terminal {
    pub fn new(
        cols: usize,
        rows: usize,
        scrollback: usize,
        cell_width: usize,
        cell_height: usize,
        scale: u32,
        palette: Palette,
    ) -> Self {
        assert!(cols > 0 && rows > 0);
        Self {
            normal: Grid::new(rows + scrollback, cols),
            alt: Grid::new(rows, cols),
            screen: Screen::Normal,
            palette,
            cursor: Cursor::default(),
            selection: Selection::NONE,
            blink: BlinkState::new(None),
            flash: false,
            reverse_video: false,
            scale: scale.max(1),
            cell_width,
            cell_height,
            rows,
            cols,
            scrollback,
            sb_filled: 0,
            damage: DamageLog::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn scrollback(&self) -> usize {
        self.scrollback
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn grid(&self) -> &Grid {
        match self.screen {
            Screen::Normal => &self.normal,
            Screen::Alt => &self.alt,
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        match self.screen {
            Screen::Normal => &mut self.normal,
            Screen::Alt => &mut self.alt,
        }
    }

    pub(crate) fn grids_mut(&mut self) -> (&mut Grid, &mut Grid) {
        (&mut self.normal, &mut self.alt)
    }

    pub(crate) fn replace_grids(&mut self, normal: Grid, alt: Grid) {
        self.normal = normal;
        self.alt = alt;
    }

    pub(crate) fn set_dimensions(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.sb_filled = self.sb_filled.min(self.normal.num_rows() - rows);
    }

    /// Switches to the alternate screen (no scrollback).
    pub fn enter_alt(&mut self) {
        if self.screen == Screen::Alt {
            return;
        }
        self.screen = Screen::Alt;
        self.clear_selection();
        self.damage_view();
    }

    /// Returns to the normal screen, forcing a full repaint of it.
    pub fn leave_alt(&mut self) {
        if self.screen == Screen::Normal {
            return;
        }
        self.screen = Screen::Normal;
        self.clear_selection();
        self.damage_view();
    }

    /// Writes one character at a logical position.
    ///
    /// A wide character clears the following spacer column so stale
    /// content cannot peek out from under the double-width glyph.
    pub fn put_char(&mut self, row: usize, col: usize, wc: char) {
        if row >= self.rows || col >= self.cols {
            return;
        }
        let cols = self.cols;
        let wide = fallback_width(wc) > 1;
        let grid_row = self.grid_mut().row_logical_mut(row);
        grid_row.cells[col].set_char(wc);
        if wide && col + 1 < cols {
            grid_row.cells[col + 1].set_char('\0');
        }
        grid_row.dirty = true;
    }

    /// Writes a string starting at a logical position, for tests and
    /// simple clients. Stops at the right edge.
    pub fn put_str(&mut self, row: usize, col: usize, s: &str) {
        let mut c = col;
        for wc in s.chars() {
            if c >= self.cols {
                break;
            }
            self.put_char(row, c, wc);
            c += fallback_width(wc);
        }
    }

    /// Ring index of the cursor cell.
    pub fn cursor_abs(&self) -> usize {
        self.grid().wrap(self.grid().offset + self.cursor.row)
    }

    /// Whether the cursor cell lies inside the current viewport.
    pub fn cursor_visible(&self) -> bool {
        !self.cursor.hidden && self.grid().in_view(self.cursor_abs(), self.rows)
    }

    /// Scrolls a logical row region `[region.start, region.end)` up by
    /// `lines`, recording the pixel move for the next frame.
    ///
    /// A full-viewport scroll on the normal screen rotates the ring so
    /// the departing rows become scrollback.
    pub fn scroll_up(&mut self, region: std::ops::Range<usize>, lines: usize) {
        let lines = lines.min(region.len());
        if lines == 0 {
            return;
        }
        let full = region.start == 0 && region.end == self.rows;
        if full && self.screen == Screen::Normal && self.scrollback > 0 {
            let pinned = self.normal.view == self.normal.offset;
            self.normal.rotate(lines);
            if pinned {
                self.normal.view = self.normal.offset;
            }
            self.sb_filled = (self.sb_filled + lines).min(self.scrollback);
            for r in self.rows - lines..self.rows {
                let idx = self.normal.wrap(self.normal.offset + r);
                self.normal.free_row(idx);
                self.normal.row_abs_mut(idx);
            }
        } else {
            let grid = self.grid_mut();
            for r in region.start..region.end - lines {
                let src = grid.wrap(grid.offset + r + lines);
                let src_row = grid.row_abs_mut(src);
                let cells = src_row.cells.clone();
                let linebreak = src_row.linebreak;
                let dst = grid.row_logical_mut(r);
                dst.cells = cells;
                dst.linebreak = linebreak;
            }
            for r in region.end - lines..region.end {
                let cols = grid.num_cols();
                *grid.row_logical_mut(r) = Row::new(cols);
            }
        }
        // The record is a viewport pixel move; while the user views
        // scrollback the visible rows did not change.
        if self.view_at_bottom() {
            self.damage.push(ScrollDamage::Scroll { region, lines });
        }
    }

    /// Scrolls a logical row region down by `lines` (reverse scroll).
    pub fn scroll_down(&mut self, region: std::ops::Range<usize>, lines: usize) {
        let lines = lines.min(region.len());
        if lines == 0 {
            return;
        }
        let grid = self.grid_mut();
        for r in (region.start + lines..region.end).rev() {
            let src = grid.wrap(grid.offset + r - lines);
            let src_row = grid.row_abs_mut(src);
            let cells = src_row.cells.clone();
            let linebreak = src_row.linebreak;
            let dst = grid.row_logical_mut(r);
            dst.cells = cells;
            dst.linebreak = linebreak;
        }
        for r in region.start..region.start + lines {
            let cols = grid.num_cols();
            *grid.row_logical_mut(r) = Row::new(cols);
        }
        if self.view_at_bottom() {
            self.damage.push(ScrollDamage::ScrollReverse { region, lines });
        }
    }

    /// Rows the view currently sits behind the write head.
    fn view_behind(&self) -> usize {
        let grid = self.grid();
        (grid.offset + grid.num_rows() - grid.view) % grid.num_rows()
    }

    /// Moves the view up into scrollback. The whole viewport repaints.
    pub fn view_up(&mut self, n: usize) {
        if self.screen == Screen::Alt {
            return;
        }
        let behind = (self.view_behind() + n).min(self.sb_filled);
        self.set_view_behind(behind);
    }

    /// Moves the view back toward the live screen.
    pub fn view_down(&mut self, n: usize) {
        let behind = self.view_behind().saturating_sub(n);
        self.set_view_behind(behind);
    }

    /// Snaps the view to the live screen.
    pub fn view_to_bottom(&mut self) {
        self.set_view_behind(0);
    }

    fn set_view_behind(&mut self, behind: usize) {
        let rows = self.rows;
        let grid = self.grid_mut();
        let new_view = (grid.offset + grid.num_rows() - behind) % grid.num_rows();
        if new_view != grid.view {
            grid.view = new_view;
            grid.invalidate_view(rows);
        }
    }

    /// True when the view is pinned to the live screen.
    pub fn view_at_bottom(&self) -> bool {
        self.grid().view == self.grid().offset
    }

    /// Replaces the selection, invalidating rows leaving and entering it.
    pub fn set_selection(&mut self, start: SelCoord, end: SelCoord) {
        let old = self.selection;
        self.selection = Selection::new(start, end);
        self.invalidate_selection_rows(old);
        self.invalidate_selection_rows(self.selection);
    }

    /// Drops the selection, invalidating the rows it covered.
    pub fn clear_selection(&mut self) {
        let old = self.selection;
        self.selection = Selection::NONE;
        self.invalidate_selection_rows(old);
    }

    fn invalidate_selection_rows(&mut self, sel: Selection) {
        if !sel.is_active() {
            return;
        }
        let num_rows = self.grid().num_rows();
        let span = (sel.end.row + num_rows - sel.start.row) % num_rows + 1;
        for i in 0..span {
            let idx = (sel.start.row + i) % num_rows;
            let grid = self.grid_mut();
            if grid.row_abs(idx).is_some() {
                grid.row_abs_mut(idx).invalidate();
            }
        }
    }

    /// Requests the visual-bell tint on the next frames.
    pub fn trigger_flash(&mut self) {
        self.flash = true;
    }

    pub fn clear_flash(&mut self) {
        self.flash = false;
    }

    /// Invalidates every viewport cell, forcing a full repaint.
    pub fn damage_view(&mut self) {
        let rows = self.rows;
        self.grid_mut().invalidate_view(rows);
    }

    /// Invalidates every viewport cell carrying the blink attribute,
    /// called when the blink phase toggles.
    pub fn invalidate_blink_cells(&mut self) {
        let rows = self.rows;
        let grid = self.grid_mut();
        for r in 0..rows {
            let idx = grid.wrap(grid.view + r);
            let Some(row) = grid.row_abs(idx) else {
                continue;
            };
            if !row
                .cells
                .iter()
                .any(|cell| cell.attrs.contains(CellAttrs::BLINK))
            {
                continue;
            }
            let row = grid.row_abs_mut(idx);
            for cell in &mut row.cells {
                if cell.attrs.contains(CellAttrs::BLINK) {
                    cell.invalidate();
                }
            }
            row.dirty = true;
        }
    }

    /// True if any viewport cell carries the blink attribute.
    pub fn any_visible_blink(&self) -> bool {
        let grid = self.grid();
        (0..self.rows).any(|r| {
            grid.row_in_view(r)
                .map(|row| {
                    row.cells
                        .iter()
                        .any(|cell| cell.attrs.contains(CellAttrs::BLINK))
                })
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term() -> Terminal {
        Terminal::new(10, 4, 6, 8, 16, 1, Palette::default())
    }

    #[test]
    fn put_char_dirties_cell_and_row() {
        let mut t = term();
        t.damage_view();
        // Pretend a frame ran: mark everything clean.
        for r in 0..4 {
            let row = t.grid_mut().row_in_view_mut(r);
            for cell in &mut row.cells {
                cell.attrs.insert(CellAttrs::CLEAN);
            }
            row.dirty = false;
        }
        t.put_char(1, 3, 'x');
        let row = t.grid().row_in_view(1).unwrap();
        assert!(row.dirty);
        assert!(!row.cells[3].is_clean());
        assert_eq!(row.cells[3].wc, 'x');
    }

    #[test]
    fn wide_char_clears_spacer() {
        let mut t = term();
        t.put_char(0, 2, '宽');
        let row = t.grid().row_in_view(0).unwrap();
        assert_eq!(row.cells[2].wc, '宽');
        assert_eq!(row.cells[3].wc, '\0');
    }

    #[test]
    fn full_scroll_rotates_into_scrollback() {
        let mut t = term();
        t.put_str(0, 0, "top");
        t.scroll_up(0..4, 1);
        // Old logical row 0 is now one behind the offset.
        let grid = t.grid();
        let behind = (grid.offset + grid.num_rows() - 1) % grid.num_rows();
        assert_eq!(grid.row_abs(behind).unwrap().cells[0].wc, 't');
        // The fresh bottom row is dirty and empty.
        let bottom = grid.row_in_view(3).unwrap();
        assert!(bottom.dirty);
        assert_eq!(bottom.cells[0].wc, '\0');
        assert_eq!(t.damage.len(), 1);
        assert!(t.view_at_bottom());
    }

    #[test]
    fn partial_scroll_moves_rows_in_place() {
        let mut t = term();
        t.put_str(1, 0, "aa");
        t.put_str(2, 0, "bb");
        t.scroll_up(1..3, 1);
        let grid = t.grid();
        assert_eq!(grid.row_in_view(1).unwrap().cells[0].wc, 'b');
        assert_eq!(grid.row_in_view(2).unwrap().cells[0].wc, '\0');
        assert!(matches!(
            t.damage.drain().next().unwrap(),
            ScrollDamage::Scroll { region, lines: 1 } if region == (1..3)
        ));
    }

    #[test]
    fn reverse_scroll_moves_rows_down() {
        let mut t = term();
        t.put_str(0, 0, "aa");
        t.scroll_down(0..4, 2);
        let grid = t.grid();
        assert_eq!(grid.row_in_view(2).unwrap().cells[0].wc, 'a');
        assert_eq!(grid.row_in_view(0).unwrap().cells[0].wc, '\0');
    }

    #[test]
    fn view_scrolling_clamps_to_filled_scrollback() {
        let mut t = term();
        for _ in 0..3 {
            t.scroll_up(0..4, 1);
        }
        t.view_up(100);
        assert_eq!(
            (t.grid().offset + t.grid().num_rows() - t.grid().view) % t.grid().num_rows(),
            3
        );
        assert!(!t.view_at_bottom());
        t.view_down(1);
        t.view_to_bottom();
        assert!(t.view_at_bottom());
    }

    #[test]
    fn alt_screen_has_no_scrollback_view() {
        let mut t = term();
        t.enter_alt();
        t.scroll_up(0..4, 1);
        t.view_up(5);
        assert!(t.view_at_bottom());
        t.leave_alt();
        assert_eq!(t.screen(), Screen::Normal);
    }

    #[test]
    fn selection_change_invalidates_covered_rows() {
        let mut t = term();
        t.damage_view();
        for r in 0..4 {
            let row = t.grid_mut().row_in_view_mut(r);
            for cell in &mut row.cells {
                cell.attrs.insert(CellAttrs::CLEAN);
            }
            row.dirty = false;
        }
        let view = t.grid().view;
        t.set_selection(
            SelCoord { row: view, col: 1 },
            SelCoord {
                row: view + 1,
                col: 2,
            },
        );
        assert!(t.grid().row_in_view(0).unwrap().dirty);
        assert!(t.grid().row_in_view(1).unwrap().dirty);
        assert!(!t.grid().row_in_view(3).unwrap().dirty);

        t.clear_selection();
        assert!(!t.selection.is_active());
        assert!(t.grid().row_in_view(0).unwrap().dirty);
    }

    #[test]
    fn blink_scan_sees_viewport_only() {
        let mut t = term();
        assert!(!t.any_visible_blink());
        let row = t.grid_mut().row_in_view_mut(2);
        let mut attrs = row.cells[0].attrs;
        attrs.insert(CellAttrs::BLINK);
        row.cells[0].set_attrs(attrs);
        assert!(t.any_visible_blink());
    }
}
