//! The rendering pipeline: color math, the per-cell compositor, the
//! frame driver, the worker pool, and the blink clock.

pub mod blink;
pub mod color;
pub mod frame;
pub mod painter;
pub mod workers;

pub use frame::{FrameOutcome, Renderer};
pub use workers::WorkerPool;

use thiserror::Error;

/// Typed failures of the rendering core.
///
/// Each maps to a degrade-gracefully policy rather than an abort: a
/// failed timer leaves blinking always on, an exhausted pool skips the
/// frame (the next callback retries), a failed winsize signal is logged
/// and the emulator recovers on its own.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to arm blink timer: {0}")]
    TimerArmFailed(std::io::Error),

    #[error("buffer pool exhausted, skipping frame")]
    BufferAcquireFailed,

    #[error("failed to signal PTY window size: {0}")]
    WindowSizeSignalFailed(std::io::Error),
}
