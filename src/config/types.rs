use std::fmt;

use serde::Deserialize;
use serde::de::{self, Deserializer};

use crate::render::color::{ALPHA_OPAQUE, ColorWord, Palette, Rgb};
use crate::term::CursorStyle;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub colors: ColorsConfig,
    #[serde(default)]
    pub cursor: CursorConfig,
    #[serde(default)]
    pub scrollback: ScrollbackConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

impl Config {
    /// The palette the renderer paints with.
    pub fn palette(&self) -> Palette {
        let (cursor_text, cursor_cursor) = match &self.colors.cursor {
            Some(pair) => (ColorWord::set(pair.text.0), ColorWord::set(pair.cursor.0)),
            None => (ColorWord::unset(), ColorWord::unset()),
        };
        Palette {
            fg: self.colors.foreground.0,
            bg: self.colors.background.0,
            alpha: (self.colors.alpha.clamp(0.0, 1.0) * ALPHA_OPAQUE as f32) as u16,
            cursor_text,
            cursor_cursor,
        }
    }

    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor.style.into()
    }
}

/// A 24-bit color parsed from `rrggbb` or `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Rgb);

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = HexColor;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an RGB color like \"dcdccc\" or \"#dcdccc\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<HexColor, E> {
                let hex = value.strip_prefix('#').unwrap_or(value);
                if hex.len() != 6 {
                    return Err(E::custom(format!("invalid color '{}'", value)));
                }
                u32::from_str_radix(hex, 16)
                    .map(|raw| HexColor(Rgb(raw)))
                    .map_err(|_| E::custom(format!("invalid color '{}'", value)))
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorsConfig {
    #[serde(default = "default_foreground")]
    pub foreground: HexColor,
    #[serde(default = "default_background")]
    pub background: HexColor,

    /// Background opacity, 0.0 - 1.0. Applies to every cell not under a
    /// block cursor, which always paints opaque.
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Optional block-cursor color pair. When set, a block cursor
    /// ignores the cell colors entirely.
    #[serde(default)]
    pub cursor: Option<CursorColors>,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            foreground: default_foreground(),
            background: default_background(),
            alpha: default_alpha(),
            cursor: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CursorColors {
    pub text: HexColor,
    pub cursor: HexColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyleConfig {
    #[default]
    Block,
    Underline,
    Bar,
}

impl From<CursorStyleConfig> for CursorStyle {
    fn from(style: CursorStyleConfig) -> Self {
        match style {
            CursorStyleConfig::Block => CursorStyle::Block,
            CursorStyleConfig::Underline => CursorStyle::Underline,
            CursorStyleConfig::Bar => CursorStyle::Bar,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CursorConfig {
    #[serde(default)]
    pub style: CursorStyleConfig,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            style: CursorStyleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollbackConfig {
    /// Scrollback depth in rows (valid range: 0 - 100000).
    #[serde(default = "default_scrollback_lines")]
    pub lines: usize,
}

impl Default for ScrollbackConfig {
    fn default() -> Self {
        Self {
            lines: default_scrollback_lines(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Render worker threads (valid range: 0 - 16).
    /// 0 renders on the main thread; the default matches the CPU count.
    #[serde(default = "default_render_workers")]
    pub render_workers: u32,

    /// Number of shm buffers (valid range: 2 - 4)
    /// - 2 = double buffering (lower memory, potential stalls)
    /// - 3 = triple buffering (balanced, recommended)
    /// - 4 = quad buffering (highest memory, smoothest)
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            render_workers: default_render_workers(),
            buffer_count: default_buffer_count(),
        }
    }
}

fn default_foreground() -> HexColor {
    HexColor(Rgb(0xdcdccc))
}

fn default_background() -> HexColor {
    HexColor(Rgb(0x111111))
}

fn default_alpha() -> f32 {
    1.0
}

fn default_scrollback_lines() -> usize {
    1000
}

fn default_render_workers() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn default_buffer_count() -> u32 {
    3
}
