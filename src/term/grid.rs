//! Fixed-capacity ring buffer of rows.
//!
//! Logical row `r` of the emulator lives at ring index
//! `(offset + r) % num_rows`; the viewport starts at `view`. The ring is
//! never grown in place: capacity changes only through a full rebuild on
//! resize. Rows allocate lazily, a slot stays `None` until first touched.

use super::cell::Row;

#[derive(Debug)]
pub struct Grid {
    rows: Vec<Option<Row>>,
    /// Write head: ring index of logical row 0.
    pub offset: usize,
    /// Scroll position: ring index of the top visible row.
    pub view: usize,
    num_rows: usize,
    num_cols: usize,
}

impl Grid {
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        assert!(num_rows > 0 && num_cols > 0);
        Self {
            rows: (0..num_rows).map(|_| None).collect(),
            offset: 0,
            view: 0,
            num_rows,
            num_cols,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Wraps an index into the ring.
    pub fn wrap(&self, idx: usize) -> usize {
        idx % self.num_rows
    }

    /// Row at an absolute ring index, if allocated.
    pub fn row_abs(&self, idx: usize) -> Option<&Row> {
        self.rows[idx % self.num_rows].as_ref()
    }

    /// Row at an absolute ring index, allocating on first touch.
    pub fn row_abs_mut(&mut self, idx: usize) -> &mut Row {
        let idx = idx % self.num_rows;
        let cols = self.num_cols;
        self.rows[idx].get_or_insert_with(|| Row::new(cols))
    }

    /// Row `r` of the viewport, if allocated.
    pub fn row_in_view(&self, r: usize) -> Option<&Row> {
        self.row_abs(self.view + r)
    }

    /// Row `r` of the viewport, allocating on first touch.
    pub fn row_in_view_mut(&mut self, r: usize) -> &mut Row {
        self.row_abs_mut(self.view + r)
    }

    /// Logical emulator row `r` (relative to `offset`), allocating.
    pub fn row_logical_mut(&mut self, r: usize) -> &mut Row {
        self.row_abs_mut(self.offset + r)
    }

    /// Ring index of the last viewport row.
    pub fn view_end(&self, term_rows: usize) -> usize {
        (self.view + term_rows - 1) % self.num_rows
    }

    /// True when the viewport wraps past the top of the ring.
    pub fn view_wraps(&self, term_rows: usize) -> bool {
        self.view_end(term_rows) < self.view
    }

    /// Wrap-aware membership of an absolute ring index in the viewport.
    pub fn in_view(&self, abs: usize, term_rows: usize) -> bool {
        let end = self.view_end(term_rows);
        if end < self.view {
            abs >= self.view || abs <= end
        } else {
            abs >= self.view && abs <= end
        }
    }

    /// Advances the write head by `n` rows (a full-screen scroll).
    pub fn rotate(&mut self, n: usize) {
        self.offset = (self.offset + n) % self.num_rows;
    }

    /// Rewinds the write head by `n` rows (reverse scroll).
    pub fn rotate_back(&mut self, n: usize) {
        self.offset = (self.offset + self.num_rows - n % self.num_rows) % self.num_rows;
    }

    /// Drops the row at an absolute ring index back to unallocated.
    pub fn free_row(&mut self, idx: usize) {
        let idx = idx % self.num_rows;
        self.rows[idx] = None;
    }

    /// Clears `CLEAN` on every viewport row, allocating rows that were
    /// never touched so fresh buffers get their background painted.
    pub fn invalidate_view(&mut self, term_rows: usize) {
        for r in 0..term_rows {
            self.row_abs_mut(self.view + r).invalidate();
        }
    }

    /// Viewport row showing the absolute ring index, if visible.
    pub fn view_row_of(&self, abs: usize, term_rows: usize) -> Option<usize> {
        if self.in_view(abs, term_rows) {
            Some((abs + self.num_rows - self.view) % self.num_rows)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_rows_follow_offset() {
        let mut grid = Grid::new(10, 4);
        grid.offset = 8;
        grid.row_logical_mut(0).linebreak = true;
        grid.row_logical_mut(3).linebreak = true;
        assert!(grid.row_abs(8).unwrap().linebreak);
        assert!(grid.row_abs(1).unwrap().linebreak, "logical 3 wraps to ring 1");
    }

    #[test]
    fn rows_allocate_lazily() {
        let mut grid = Grid::new(5, 3);
        assert!(grid.row_abs(2).is_none());
        grid.row_abs_mut(2);
        assert!(grid.row_abs(2).is_some());
        grid.free_row(2);
        assert!(grid.row_abs(2).is_none());
    }

    #[test]
    fn view_wrap_detection() {
        let mut grid = Grid::new(10, 2);
        grid.view = 3;
        assert_eq!(grid.view_end(4), 6);
        assert!(!grid.view_wraps(4));

        grid.view = 8;
        assert_eq!(grid.view_end(4), 1);
        assert!(grid.view_wraps(4));
    }

    #[test]
    fn in_view_handles_wrap() {
        let mut grid = Grid::new(10, 2);
        grid.view = 8;
        // Viewport rows are ring 8, 9, 0, 1.
        for abs in [8, 9, 0, 1] {
            assert!(grid.in_view(abs, 4), "ring {} should be visible", abs);
        }
        for abs in [2, 5, 7] {
            assert!(!grid.in_view(abs, 4), "ring {} should be hidden", abs);
        }
    }

    #[test]
    fn view_row_of_inverts_wrapped_indexing() {
        let mut grid = Grid::new(10, 2);
        grid.view = 8;
        assert_eq!(grid.view_row_of(8, 4), Some(0));
        assert_eq!(grid.view_row_of(0, 4), Some(2));
        assert_eq!(grid.view_row_of(1, 4), Some(3));
        assert_eq!(grid.view_row_of(5, 4), None);
    }

    #[test]
    fn rotate_wraps_offset() {
        let mut grid = Grid::new(6, 2);
        grid.rotate(4);
        assert_eq!(grid.offset, 4);
        grid.rotate(4);
        assert_eq!(grid.offset, 2);
        grid.rotate_back(3);
        assert_eq!(grid.offset, 5);
    }
}
