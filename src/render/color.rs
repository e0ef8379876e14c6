//! 24-bit ANSI colors for level tags, messages and property blocks.

use crate::level::Level;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`; malformed input falls back to white so a config typo never breaks rendering.
    #[must_use]
    pub fn from_hex(hex: &str) -> Self {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Self::white();
        }

        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);

        Self { r, g, b }
    }

    #[must_use]
    pub fn fg_ansi(self) -> String {
        format!("\x1b[38;2;{};{};{}m", self.r, self.g, self.b)
    }

    pub const RESET: &'static str = "\x1b[0m";

    #[must_use]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    #[must_use]
    pub const fn gray() -> Self {
        Self::new(128, 128, 128)
    }

    #[must_use]
    pub const fn green() -> Self {
        Self::new(80, 250, 123)
    }

    #[must_use]
    pub const fn yellow() -> Self {
        Self::new(241, 250, 140)
    }

    #[must_use]
    pub const fn red() -> Self {
        Self::new(255, 85, 85)
    }

    #[must_use]
    pub const fn magenta() -> Self {
        Self::new(255, 121, 198)
    }

    #[must_use]
    pub const fn blue() -> Self {
        Self::new(98, 114, 164)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Wraps `text` in the color's escape sequence and a reset.
#[must_use]
pub fn colorize(text: &str, color: Color) -> String {
    format!("{}{text}{}", color.fg_ansi(), Color::RESET)
}

#[must_use]
pub const fn tag_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::gray(),
        Level::Debug => Color::blue(),
        Level::Info => Color::green(),
        Level::Warn => Color::yellow(),
        Level::Error => Color::red(),
        Level::Special => Color::magenta(),
    }
}

#[must_use]
pub const fn message_color(level: Level) -> Color {
    match level {
        Level::Trace | Level::Debug | Level::Info => Color::white(),
        Level::Warn => Color::yellow(),
        Level::Error => Color::red(),
        Level::Special => Color::magenta(),
    }
}

#[must_use]
pub const fn property_color(level: Level) -> Color {
    match level {
        Level::Special => Color::white(),
        _ => Color::gray(),
    }
}
