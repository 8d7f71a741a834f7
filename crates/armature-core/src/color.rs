//! Color representation and named/hex color parsing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColorParseError {
    #[error("Invalid hex color: {0}")]
    InvalidHex(String),
    #[error("Unknown color name: {0}")]
    UnknownName(String),
}

/// RGBA color with components in the [0, 1] range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    #[serde(default)]
    pub r: f32,
    #[serde(default)]
    pub g: f32,
    #[serde(default)]
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    }
}

impl ColorRgba {
    pub const WHITE: ColorRgba = ColorRgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// A color given either as a named/hex string or as an explicit RGB triple
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Name(String),
    Rgb(ColorRgba),
}

impl ColorSpec {
    /// Resolve to an RGBA value, branching on representation
    pub fn resolve(&self) -> Result<ColorRgba, ColorParseError> {
        match self {
            ColorSpec::Rgb(c) => Ok(*c),
            ColorSpec::Name(s) => {
                if s.starts_with('#') || s.len() == 6 && s.chars().all(|c| c.is_ascii_hexdigit()) {
                    parse_hex_color(s)
                } else {
                    named_color(s).ok_or_else(|| ColorParseError::UnknownName(s.clone()))
                }
            }
        }
    }
}

impl From<ColorRgba> for ColorSpec {
    fn from(c: ColorRgba) -> Self {
        ColorSpec::Rgb(c)
    }
}

/// Parse a `#rrggbb` (or bare `rrggbb`) hex color string
pub fn parse_hex_color(s: &str) -> Result<ColorRgba, ColorParseError> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorParseError::InvalidHex(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| ColorParseError::InvalidHex(s.to_string()))
    };
    Ok(ColorRgba::rgb(
        channel(0..2)?,
        channel(2..4)?,
        channel(4..6)?,
    ))
}

/// Look up a CSS-style color name
fn named_color(name: &str) -> Option<ColorRgba> {
    let c = match name.to_ascii_lowercase().as_str() {
        "black" => ColorRgba::rgb(0.0, 0.0, 0.0),
        "white" => ColorRgba::rgb(1.0, 1.0, 1.0),
        "red" => ColorRgba::rgb(1.0, 0.0, 0.0),
        "green" => ColorRgba::rgb(0.0, 0.5, 0.0),
        "lime" => ColorRgba::rgb(0.0, 1.0, 0.0),
        "blue" => ColorRgba::rgb(0.0, 0.0, 1.0),
        "yellow" => ColorRgba::rgb(1.0, 1.0, 0.0),
        "cyan" => ColorRgba::rgb(0.0, 1.0, 1.0),
        "magenta" => ColorRgba::rgb(1.0, 0.0, 1.0),
        "orange" => ColorRgba::rgb(1.0, 0.65, 0.0),
        "purple" => ColorRgba::rgb(0.5, 0.0, 0.5),
        "gray" | "grey" => ColorRgba::rgb(0.5, 0.5, 0.5),
        _ => return None,
    };
    Some(c)
}
