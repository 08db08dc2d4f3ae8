//! Range clamping for loaded configurations.

use log::warn;

use super::Config;

const SCROLLBACK_MAX: usize = 100_000;
const RENDER_WORKERS_MAX: u32 = 16;

impl Config {
    /// Clamps out-of-range values in place, warning about each.
    pub(crate) fn validate(&mut self) {
        if !(0.0..=1.0).contains(&self.colors.alpha) {
            warn!(
                "colors.alpha {} out of range, clamping to 0.0 - 1.0",
                self.colors.alpha
            );
            self.colors.alpha = self.colors.alpha.clamp(0.0, 1.0);
        }

        if self.scrollback.lines > SCROLLBACK_MAX {
            warn!(
                "scrollback.lines {} too large, clamping to {}",
                self.scrollback.lines, SCROLLBACK_MAX
            );
            self.scrollback.lines = SCROLLBACK_MAX;
        }

        if self.performance.render_workers > RENDER_WORKERS_MAX {
            warn!(
                "performance.render_workers {} too large, clamping to {}",
                self.performance.render_workers, RENDER_WORKERS_MAX
            );
            self.performance.render_workers = RENDER_WORKERS_MAX;
        }

        if !(2..=4).contains(&self.performance.buffer_count) {
            warn!(
                "performance.buffer_count {} out of range, using 3",
                self.performance.buffer_count
            );
            self.performance.buffer_count = 3;
        }
    }
}
