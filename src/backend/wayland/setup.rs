//! Connection bootstrap: registry init and global binding.

use anyhow::{Context, Result};
use log::debug;
use smithay_client_toolkit::{
    compositor::CompositorState, output::OutputState, registry::RegistryState,
    shell::xdg::XdgShell, shm::Shm,
};
use wayland_client::{Connection, EventQueue, globals::registry_queue_init};

use super::state::WaylandState;

/// Bound globals handed to `WaylandState`.
pub(super) struct SetupGlobals {
    pub(super) registry_state: RegistryState,
    pub(super) compositor_state: CompositorState,
    pub(super) xdg_shell: XdgShell,
    pub(super) shm: Shm,
    pub(super) output_state: OutputState,
}

pub(super) struct WaylandSetup {
    pub(super) conn: Connection,
    pub(super) event_queue: EventQueue<WaylandState>,
    pub(super) qh: wayland_client::QueueHandle<WaylandState>,
    pub(super) globals: SetupGlobals,
}

pub(super) fn setup_wayland() -> Result<WaylandSetup> {
    let conn = Connection::connect_to_env().context("failed to connect to Wayland compositor")?;
    debug!("connected to Wayland display");

    let (globals, event_queue) =
        registry_queue_init(&conn).context("failed to initialize Wayland registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("wl_compositor not available")?;
    debug!("bound compositor");

    let xdg_shell = XdgShell::bind(&globals, &qh).context("xdg-shell not available")?;
    debug!("bound xdg-shell");

    let shm = Shm::bind(&globals, &qh).context("wl_shm not available")?;
    debug!("bound shared memory");

    let output_state = OutputState::new(&globals, &qh);
    let registry_state = RegistryState::new(&globals);

    Ok(WaylandSetup {
        conn,
        event_queue,
        qh,
        globals: SetupGlobals {
            registry_state,
            compositor_state,
            xdg_shell,
            shm,
            output_state,
        },
    })
}
