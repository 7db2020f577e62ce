use anyhow::anyhow;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// 24-bit Red-Green-Blue color. Serializes/deserializes as HTML format
/// (#rrggbb), so the config file can use the same notation as a stylesheet.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Perceived brightness, 0-255 (ITU-R BT.601 weights)
    pub fn luma(self) -> u8 {
        let luma = 299 * self.red as u32
            + 587 * self.green as u32
            + 114 * self.blue as u32;
        (luma / 1000) as u8
    }
}

impl From<Color> for Rgb888 {
    fn from(color: Color) -> Self {
        Rgb888::new(color.red, color.green, color.blue)
    }
}

impl From<Rgb888> for Color {
    fn from(color: Rgb888) -> Self {
        Self::new(color.r(), color.g(), color.b())
    }
}

// This is lossy, since we throw away the first 8 bits. Hope it wasn't RGBA!
impl From<u32> for Color {
    fn from(value: u32) -> Self {
        // Casting will truncate the 24 most significant bits
        let red = (value >> 16) as u8;
        let green = (value >> 8) as u8;
        let blue = value as u8;
        Self { red, green, blue }
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('#') {
            Some(hex) if hex.len() == 6 => {
                let value = u32::from_str_radix(hex, 16)?;
                Ok(value.into())
            }
            _ => Err(anyhow!("Invalid color string: {}", s)),
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:0>2x}{:0>2x}{:0>2x}", self.red, self.green, self.blue)
    }
}

// These impls are needed for serde
impl TryFrom<String> for Color {
    type Error = <Color as FromStr>::Err;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Resample a row-major pixel grid to new dimensions, picking the nearest
/// source pixel for each destination pixel (no filtering)
pub fn scale_nearest<T: Copy>(
    pixels: &[T],
    (width, height): (u32, u32),
    (new_width, new_height): (u32, u32),
) -> Vec<T> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut scaled = Vec::with_capacity((new_width * new_height) as usize);
    for y in 0..new_height {
        let src_y = (y as u64 * height as u64 / new_height as u64) as u32;
        for x in 0..new_width {
            let src_x = (x as u64 * width as u64 / new_width as u64) as u32;
            scaled.push(pixels[(src_y * width + src_x) as usize]);
        }
    }
    scaled
}
