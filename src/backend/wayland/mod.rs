//! Wayland backend: an xdg toplevel window whose shm buffers the
//! rendering core paints into, committed in lockstep with the
//! compositor's frame callbacks.

mod event_loop;
mod handlers;
mod setup;
mod state;
mod surface;

use std::os::fd::RawFd;
use std::sync::Arc;

use anyhow::Result;
use log::info;
use smithay_client_toolkit::shell::WaylandSurface;
use smithay_client_toolkit::shell::xdg::window::WindowDecorations;

use crate::config::Config;
use crate::font::Font;

use self::state::WaylandState;

/// Connects to the compositor and runs the render loop until the window
/// is closed.
///
/// `pty` is the PTY master to keep informed of grid size changes; the
/// emulator feeding the grid owns it.
pub fn run(config: &Config, font: Arc<dyn Font>, pty: Option<RawFd>) -> Result<()> {
    info!("starting Wayland backend");

    let setup = setup::setup_wayland()?;
    let setup::WaylandSetup {
        conn: _conn,
        mut event_queue,
        qh,
        globals,
    } = setup;

    let mut state = WaylandState::new(globals, config, font, pty);

    let wl_surface = state.compositor_state.create_surface(&qh);
    let window = state
        .xdg_shell
        .create_window(wl_surface, WindowDecorations::ServerDefault, &qh);
    window.set_title("wayterm");
    window.set_app_id("org.wayterm.wayterm");
    window.commit();
    state.surface.attach_window(window);
    info!("xdg toplevel created");

    event_loop::run_event_loop(&mut event_queue, &qh, &mut state)
}
