//! The main dispatch loop.
//!
//! A manual read/poll cycle over two descriptors: the Wayland connection
//! and the blink timerfd. Rendering happens between dispatches whenever
//! the surface is configured, something is dirty, and no frame callback
//! is outstanding; otherwise the loop blocks until an event (or blink
//! tick) arrives.

use std::os::fd::AsRawFd;

use anyhow::Result;
use log::{info, warn};
use wayland_client::{EventQueue, backend::WaylandError};

use super::state::WaylandState;

pub(super) fn run_event_loop(
    event_queue: &mut EventQueue<WaylandState>,
    qh: &wayland_client::QueueHandle<WaylandState>,
    state: &mut WaylandState,
) -> Result<()> {
    loop {
        if state.should_exit {
            info!("exit requested, breaking event loop");
            break;
        }

        // Frame pacing: the callback is the only clock. While one is
        // outstanding the dirty state waits in the cell clean bits.
        let can_render =
            state.configured && state.needs_redraw && !state.frame_callback_pending;
        if can_render
            && let Err(err) = state.render(qh)
        {
            warn!("rendering error: {}", err);
        }

        dispatch_events(event_queue, state)?;
    }
    Ok(())
}

fn dispatch_events(
    event_queue: &mut EventQueue<WaylandState>,
    state: &mut WaylandState,
) -> Result<()> {
    event_queue
        .dispatch_pending(state)
        .map_err(|e| anyhow::anyhow!("Wayland event queue error: {}", e))?;
    event_queue
        .flush()
        .map_err(|e| anyhow::anyhow!("Wayland flush error: {}", e))?;

    let Some(guard) = event_queue.prepare_read() else {
        // Events already queued locally; dispatch them next iteration.
        return Ok(());
    };

    let mut fds = [
        libc::pollfd {
            fd: guard.connection_fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: state.term.blink.clock().map(|c| c.fd()).unwrap_or(-1),
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        // SAFETY: fds points to valid pollfd memory and both descriptors
        // outlive this call (the read guard and the blink clock are held
        // by the caller).
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if ready >= 0 {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(anyhow::anyhow!("poll failed: {}", err));
        }
    }

    if fds[0].revents & libc::POLLIN != 0 {
        match guard.read() {
            Ok(_) => {
                event_queue
                    .dispatch_pending(state)
                    .map_err(|e| anyhow::anyhow!("Wayland event queue error: {}", e))?;
            }
            Err(WaylandError::Io(err)) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(anyhow::anyhow!("Wayland read error: {}", err)),
        }
    }
    // Dropping the guard cancels a read we never started.

    if fds[1].revents & libc::POLLIN != 0 {
        state.handle_blink_tick();
    }

    Ok(())
}
