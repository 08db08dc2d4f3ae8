//! Cells and rows of the character grid.

use bitflags::bitflags;

use crate::render::color::Rgb;

bitflags! {
    /// Per-cell display attributes.
    ///
    /// `CLEAN` asserts that the cell's pixel region matches the current
    /// attributes; any mutation of the character or another attribute must
    /// clear it so the next frame repaints the cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellAttrs: u16 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const UNDERLINE = 1 << 2;
        const STRIKETHROUGH = 1 << 3;
        const BLINK = 1 << 4;
        const REVERSE = 1 << 5;
        const DIM = 1 << 6;
        const CONCEAL = 1 << 7;
        /// `fg` holds a real color (otherwise the palette default applies).
        const HAVE_FG = 1 << 8;
        /// `bg` holds a real color.
        const HAVE_BG = 1 << 9;
        /// Pixel region matches the current attributes.
        const CLEAN = 1 << 10;
        const URL = 1 << 11;
    }
}

/// One character slot in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Code point, `'\0'` for an empty slot.
    pub wc: char,
    pub attrs: CellAttrs,
    pub fg: Rgb,
    pub bg: Rgb,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            wc: '\0',
            attrs: CellAttrs::empty(),
            fg: Rgb::default(),
            bg: Rgb::default(),
        }
    }
}

impl Cell {
    /// Replaces the character, invalidating the pixel region.
    pub fn set_char(&mut self, wc: char) {
        self.wc = wc;
        self.attrs.remove(CellAttrs::CLEAN);
    }

    /// Replaces all non-clean attributes, invalidating the pixel region.
    pub fn set_attrs(&mut self, attrs: CellAttrs) {
        self.attrs = attrs - CellAttrs::CLEAN;
    }

    /// Sets an explicit foreground color.
    pub fn set_fg(&mut self, fg: Rgb) {
        self.fg = fg;
        self.attrs.insert(CellAttrs::HAVE_FG);
        self.attrs.remove(CellAttrs::CLEAN);
    }

    /// Sets an explicit background color.
    pub fn set_bg(&mut self, bg: Rgb) {
        self.bg = bg;
        self.attrs.insert(CellAttrs::HAVE_BG);
        self.attrs.remove(CellAttrs::CLEAN);
    }

    /// Marks the pixel region stale without touching content.
    pub fn invalidate(&mut self) {
        self.attrs.remove(CellAttrs::CLEAN);
    }

    pub fn is_clean(&self) -> bool {
        self.attrs.contains(CellAttrs::CLEAN)
    }
}

/// One grid row.
#[derive(Debug, Clone)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Dispatcher hint: some cell may have `CLEAN` unset. May
    /// over-approximate; the painter still honors per-cell `CLEAN`.
    pub dirty: bool,
    /// Hard line break, kept for a future wrap-aware reflow.
    pub linebreak: bool,
}

impl Row {
    pub fn new(num_cols: usize) -> Self {
        Self {
            cells: vec![Cell::default(); num_cols],
            dirty: true,
            linebreak: false,
        }
    }

    /// Clears `CLEAN` on every cell and flags the row for dispatch.
    pub fn invalidate(&mut self) {
        for cell in &mut self.cells {
            cell.invalidate();
        }
        self.dirty = true;
    }

    /// True when every cell's pixel region is up to date.
    pub fn all_clean(&self) -> bool {
        self.cells.iter().all(Cell::is_clean)
    }
}
