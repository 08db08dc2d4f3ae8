//! Configuration for the rendering core.
//!
//! Embedders load a TOML file (default
//! `~/.config/wayterm/wayterm.toml`) covering the palette, cursor
//! style, scrollback depth and render performance knobs. Missing files
//! and missing fields fall back to defaults; out-of-range values are
//! clamped with a warning rather than rejected.

mod io;
pub mod types;
mod validate;


pub use io::{ConfigSource, LoadedConfig};
pub use types::{
    ColorsConfig, Config, CursorColors, CursorConfig, CursorStyleConfig, HexColor,
    PerformanceConfig, ScrollbackConfig,
};
