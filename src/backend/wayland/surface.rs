//! The terminal's toplevel surface: the xdg window handle plus the shm
//! slot pool backing it.
//!
//! The pool is sized from the terminal's physical geometry and rebuilt
//! whenever that geometry changes; [`TermSurface::acquire`] hands out
//! one buffer per frame, or nothing while every slot is still attached
//! to the compositor.

use anyhow::{Context, Result};
use log::{debug, info};
use smithay_client_toolkit::{
    shell::{WaylandSurface, xdg::window::Window},
    shm::{
        Shm,
        slot::{Buffer, SlotPool},
    },
};
use wayland_client::protocol::{wl_shm, wl_surface};

use crate::render::RenderError;

pub(super) struct TermSurface {
    window: Option<Window>,
    pool: Option<SlotPool>,
    /// Byte size the pool was built for; a mismatch forces a rebuild.
    pool_size: usize,
    logical: (u32, u32),
    scale: i32,
}

impl TermSurface {
    pub(super) fn new() -> Self {
        Self {
            window: None,
            pool: None,
            pool_size: 0,
            logical: (0, 0),
            scale: 1,
        }
    }

    pub(super) fn attach_window(&mut self, window: Window) {
        self.window = Some(window);
    }

    pub(super) fn wl_surface(&self) -> Option<&wl_surface::WlSurface> {
        self.window.as_ref().map(|window| window.wl_surface())
    }

    /// Adopts a logical size and scale from the compositor. Returns the
    /// new physical geometry when it differs from the current one; the
    /// stale pool is rebuilt lazily on the next [`TermSurface::acquire`].
    pub(super) fn reconfigure(
        &mut self,
        width: u32,
        height: u32,
        scale: i32,
    ) -> Option<(u32, u32)> {
        let before = self.buffer_geometry();
        self.logical = (width, height);
        self.scale = scale.max(1);
        let after = self.buffer_geometry();
        (after != before).then_some(after)
    }

    pub(super) fn scale(&self) -> i32 {
        self.scale
    }

    pub(super) fn logical_size(&self) -> (u32, u32) {
        self.logical
    }

    /// Physical buffer geometry: logical size times scale.
    pub(super) fn buffer_geometry(&self) -> (u32, u32) {
        (
            self.logical.0.saturating_mul(self.scale as u32),
            self.logical.1.saturating_mul(self.scale as u32),
        )
    }

    /// One shm buffer for the coming frame, with its canvas bytes.
    ///
    /// `Ok(None)` means no frame can be drawn right now: the surface has
    /// no area yet, or no slot is free of the compositor. The caller
    /// skips the frame and retries on a later wakeup; the pending paint
    /// state survives in the cell clean bits. Pool creation failures are
    /// hard errors.
    pub(super) fn acquire(
        &mut self,
        shm: &Shm,
        buffer_count: usize,
    ) -> Result<Option<(Buffer, &mut [u8])>> {
        let (width, height) = self.buffer_geometry();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let stride = width * 4;
        let needed = (stride * height) as usize * buffer_count;
        if self.pool_size != needed {
            self.pool = None;
        }
        if self.pool.is_none() {
            info!(
                "allocating {} shm buffers of {}x{} (scale {}, {} bytes)",
                buffer_count, width, height, self.scale, needed
            );
            let pool = SlotPool::new(needed, shm).context("failed to create shm pool")?;
            self.pool = Some(pool);
            self.pool_size = needed;
        }
        let pool = self
            .pool
            .as_mut()
            .context("shm pool missing after creation")?;
        match pool.create_buffer(
            width as i32,
            height as i32,
            stride as i32,
            wl_shm::Format::Argb8888,
        ) {
            Ok(pair) => Ok(Some(pair)),
            Err(err) => {
                debug!("{}: {}", RenderError::BufferAcquireFailed, err);
                Ok(None)
            }
        }
    }
}
