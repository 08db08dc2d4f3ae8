//! Grid rebuild on window resize or scale change.
//!
//! Both rings are reallocated at the new dimensions and surviving content
//! is copied across by ring index, truncated column-wise. The inner
//! per-row copy is isolated in [`reflow_rows`] so a wrap-aware reflow can
//! replace it without touching the orchestration around it.

use std::io;
use std::os::fd::RawFd;

use log::{debug, warn};

use crate::render::RenderError;

use super::{Grid, Terminal};

impl Terminal {
    /// Applies a new buffer size (physical pixels) and scale.
    ///
    /// The scale is adopted before any dimension math; cell metrics are
    /// expected to already be rasterized for it. Returns `false` when the
    /// grid dimensions come out unchanged (nothing was rebuilt).
    ///
    /// `pty` is the PTY master to notify; a failed winsize signal is
    /// logged and otherwise ignored, the emulator recovers on its own.
    pub fn resize(
        &mut self,
        width_px: u32,
        height_px: u32,
        scale: u32,
        pty: Option<RawFd>,
    ) -> bool {
        self.scale = scale.max(1);
        let cols = (width_px as usize / self.cell_width).max(1);
        let rows = (height_px as usize / self.cell_height).max(1);
        if cols == self.cols() && rows == self.rows() {
            return false;
        }
        debug!(
            "resizing grid {}x{} -> {}x{} (scale {})",
            self.cols(),
            self.rows(),
            cols,
            rows,
            self.scale
        );

        let mut normal = Grid::new(rows + self.scrollback(), cols);
        let mut alt = Grid::new(rows, cols);
        {
            let (old_normal, old_alt) = self.grids_mut();
            reflow_rows(old_normal, &mut normal);
            reflow_rows(old_alt, &mut alt);
        }
        self.replace_grids(normal, alt);
        self.set_dimensions(cols, rows);

        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.damage_view();

        if let Some(fd) = pty
            && let Err(err) = signal_winsize(fd, cols, rows, width_px, height_px)
        {
            warn!("{}", err);
        }
        true
    }
}

/// Copies surviving rows from `old` into `new` at the same ring index,
/// truncating to the narrower column count and zero-filling the tail.
///
/// Copied cells are invalidated: the new buffer has no pixels for them
/// yet, whatever their previous clean state said.
fn reflow_rows(old: &Grid, new: &mut Grid) {
    let rows = new.num_rows().min(old.num_rows());
    let cols = new.num_cols().min(old.num_cols());
    for idx in 0..rows {
        if let Some(old_row) = old.row_abs(idx) {
            let new_row = new.row_abs_mut(idx);
            new_row.cells[..cols].copy_from_slice(&old_row.cells[..cols]);
            new_row.linebreak = old_row.linebreak;
            new_row.invalidate();
        }
    }
    new.offset = old.offset % new.num_rows();
    new.view = old.view % new.num_rows();
}

/// Reports the new geometry to the PTY via the kernel's window-size ioctl.
pub fn signal_winsize(
    pty: RawFd,
    cols: usize,
    rows: usize,
    width_px: u32,
    height_px: u32,
) -> Result<(), RenderError> {
    let ws = libc::winsize {
        ws_row: rows as u16,
        ws_col: cols as u16,
        ws_xpixel: width_px as u16,
        ws_ypixel: height_px as u16,
    };
    // SAFETY: ws is a valid winsize and the ioctl only reads it; pty is a
    // caller-supplied descriptor.
    let rc = unsafe { libc::ioctl(pty, libc::TIOCSWINSZ, &ws) };
    if rc < 0 {
        return Err(RenderError::WindowSizeSignalFailed(
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}
