//! Live Wayland protocol state shared by the event loop and the handler
//! impls: the terminal, the renderer, and the surface plumbing between
//! them.

use std::os::fd::RawFd;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;
use smithay_client_toolkit::{
    compositor::CompositorState, output::OutputState, registry::RegistryState,
    shell::xdg::XdgShell, shm::Shm,
};
use wayland_client::QueueHandle;

use crate::config::Config;
use crate::font::Font;
use crate::render::Renderer;
use crate::render::blink::BlinkClock;
use crate::term::{BlinkState, Terminal};

use super::setup::SetupGlobals;
use super::surface::TermSurface;

/// Grid dimensions before the first configure.
const INITIAL_COLS: usize = 80;
const INITIAL_ROWS: usize = 24;

pub(super) struct WaylandState {
    // Wayland protocol objects
    pub(super) registry_state: RegistryState,
    pub(super) compositor_state: CompositorState,
    pub(super) xdg_shell: XdgShell,
    pub(super) shm: Shm,
    pub(super) output_state: OutputState,

    // Surface and buffer management
    pub(super) surface: TermSurface,
    pub(super) configured: bool,
    pub(super) frame_callback_pending: bool,

    // The terminal being rendered
    pub(super) term: Terminal,
    pub(super) renderer: Renderer,
    pub(super) font: Arc<dyn Font>,

    pub(super) buffer_count: usize,
    pub(super) needs_redraw: bool,
    pub(super) should_exit: bool,
    pub(super) pty: Option<RawFd>,
}

impl WaylandState {
    pub(super) fn new(
        setup: SetupGlobals,
        config: &Config,
        font: Arc<dyn Font>,
        pty: Option<RawFd>,
    ) -> Self {
        let extents = font.extents();
        let cell_width = extents.max_advance.max(1) as usize;
        let cell_height = extents.height.max(1) as usize;

        let mut term = Terminal::new(
            INITIAL_COLS,
            INITIAL_ROWS,
            config.scrollback.lines,
            cell_width,
            cell_height,
            1,
            config.palette(),
        );
        term.cursor.style = config.cursor_style();
        term.blink = BlinkState::new(match BlinkClock::new() {
            Ok(clock) => Some(clock),
            Err(err) => {
                warn!("blink timer unavailable: {}", err);
                None
            }
        });

        let renderer = Renderer::new(config.performance.render_workers as usize);

        Self {
            registry_state: setup.registry_state,
            compositor_state: setup.compositor_state,
            xdg_shell: setup.xdg_shell,
            shm: setup.shm,
            output_state: setup.output_state,
            surface: TermSurface::new(),
            configured: false,
            frame_callback_pending: false,
            term,
            renderer,
            font,
            buffer_count: config.performance.buffer_count as usize,
            needs_redraw: true,
            should_exit: false,
            pty,
        }
    }

    /// Renders one frame and commits it, honoring the frame-callback
    /// pacing contract: callers only invoke this when no callback is
    /// outstanding.
    pub(super) fn render(&mut self, qh: &QueueHandle<Self>) -> Result<()> {
        let scale = self.surface.scale();
        let (phys_w, phys_h) = self.surface.buffer_geometry();
        // No free slot (or no area yet): skip the frame. The clean bits
        // keep the pending paint state for the next wakeup.
        let Some((buffer, canvas)) = self.surface.acquire(&self.shm, self.buffer_count)? else {
            return Ok(());
        };

        let outcome = self.renderer.render_frame(
            &mut self.term,
            &self.font,
            canvas,
            phys_w as i32,
            phys_h as i32,
        );
        self.needs_redraw = false;

        if !outcome.committed {
            // Dropping the buffer handle releases the slot back to the
            // pool without the compositor ever seeing it.
            drop(buffer);
            return Ok(());
        }

        let wl_surface = self
            .surface
            .wl_surface()
            .context("window not created")?
            .clone();
        wl_surface.set_buffer_scale(scale);
        wl_surface.attach(Some(buffer.wl_buffer()), 0, 0);
        for rect in &outcome.damage {
            wl_surface.damage_buffer(rect.x, rect.y, rect.width, rect.height);
        }
        wl_surface.frame(qh, wl_surface.clone());
        wl_surface.commit();
        self.frame_callback_pending = true;
        Ok(())
    }

    /// Applies a logical size/scale change to the surface and, when the
    /// physical geometry moved, to the grid.
    pub(super) fn apply_geometry(&mut self, width: u32, height: u32, scale: i32) {
        if let Some((phys_w, phys_h)) = self.surface.reconfigure(width, height, scale) {
            self.term
                .resize(phys_w, phys_h, self.surface.scale() as u32, self.pty);
            self.needs_redraw = true;
        }
    }

    /// Consumes blink timer expirations, toggling the phase once per
    /// elapsed tick batch.
    pub(super) fn handle_blink_tick(&mut self) {
        let Some(clock) = self.term.blink.clock() else {
            return;
        };
        let ticks = clock.drain();
        if ticks == 0 || !self.term.blink.armed {
            return;
        }
        if ticks % 2 == 1 {
            self.term.blink.toggle();
        }
        self.term.invalidate_blink_cells();
        self.needs_redraw = true;
    }
}
