//! The 2 Hz blink timer.
//!
//! A non-blocking timerfd the event loop polls next to the Wayland
//! connection fd. The renderer arms it when a visible cell blinks and
//! disarms it when none does, so an idle terminal holds no ticking timer.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Half a blink period: the phase toggles on every expiry.
pub const BLINK_INTERVAL_MS: i64 = 500;

pub struct BlinkClock {
    fd: OwnedFd,
}

impl BlinkClock {
    pub fn new() -> io::Result<Self> {
        // SAFETY: timerfd_create returns a fresh descriptor on success;
        // ownership transfers to the OwnedFd immediately.
        let fd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd is valid and owned by no one else.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    fn settime(&self, ms: i64) -> io::Result<()> {
        let ts = libc::timespec {
            tv_sec: ms / 1000,
            tv_nsec: (ms % 1000) * 1_000_000,
        };
        let spec = libc::itimerspec {
            it_interval: ts,
            it_value: ts,
        };
        // SAFETY: spec is a valid itimerspec and the fd is a live timerfd.
        let rc = unsafe {
            libc::timerfd_settime(self.fd.as_raw_fd(), 0, &spec, std::ptr::null_mut())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Starts the periodic 500 ms cycle.
    pub fn arm(&self) -> io::Result<()> {
        self.settime(BLINK_INTERVAL_MS)
    }

    /// Stops the timer without closing the fd.
    pub fn disarm(&self) -> io::Result<()> {
        self.settime(0)
    }

    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Consumes pending expirations, returning how many elapsed.
    ///
    /// Returns 0 when the timer has not fired (the fd is non-blocking).
    pub fn drain(&self) -> u64 {
        let mut buf = [0u8; 8];
        // SAFETY: buf is 8 writable bytes, the contract of timerfd reads.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n == 8 {
            u64::from_ne_bytes(buf)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn arm_disarm_round_trip() {
        let clock = BlinkClock::new().unwrap();
        assert_eq!(clock.drain(), 0);
        clock.arm().unwrap();
        clock.disarm().unwrap();
        // A disarmed timer never fires.
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.drain(), 0);
    }

    #[test]
    fn fd_is_valid() {
        let clock = BlinkClock::new().unwrap();
        assert!(clock.fd() >= 0);
    }
}
