//! Weather condition codes, and the bundled icons that illustrate them

use crate::util;
use anyhow::{anyhow, bail, Context};
use itertools::Itertools;
use log::{error, trace};
use std::ops::RangeInclusive;

/// Icons are shown smaller than their source assets
const ICON_SCALE: f32 = 0.70;

/// Category of weather, each with its own icon
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WeatherIcon {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Cloudy,
}

/// Which codes a row in [ICON_TABLE] applies to
#[derive(Clone, Debug)]
enum CodeMatch {
    Exact(i64),
    Range(RangeInclusive<i64>),
}

impl CodeMatch {
    fn matches(&self, code: i64) -> bool {
        match self {
            Self::Exact(value) => *value == code,
            Self::Range(range) => range.contains(&code),
        }
    }
}

/// Condition code → icon, evaluated top to bottom. 761 and 781 are storms,
/// so those rows sit above the fog range that would otherwise claim 761.
const ICON_TABLE: &[(CodeMatch, WeatherIcon)] = &[
    (CodeMatch::Range(200..=232), WeatherIcon::Storm),
    (CodeMatch::Range(300..=321), WeatherIcon::LightRain),
    (CodeMatch::Range(500..=504), WeatherIcon::Rain),
    (CodeMatch::Exact(511), WeatherIcon::Snow),
    (CodeMatch::Range(520..=531), WeatherIcon::Rain),
    (CodeMatch::Range(600..=622), WeatherIcon::Snow),
    (CodeMatch::Exact(761), WeatherIcon::Storm),
    (CodeMatch::Exact(781), WeatherIcon::Storm),
    (CodeMatch::Range(701..=761), WeatherIcon::Fog),
    (CodeMatch::Exact(800), WeatherIcon::Clear),
    (CodeMatch::Exact(801), WeatherIcon::LightClouds),
    (CodeMatch::Range(802..=804), WeatherIcon::Cloudy),
];

impl WeatherIcon {
    /// Map a condition code to an icon. 0 means "no data", and codes outside
    /// every known range get no icon either.
    pub fn from_code(code: i64) -> Option<Self> {
        ICON_TABLE
            .iter()
            .find(|(code_match, _)| code_match.matches(code))
            .map(|(_, icon)| *icon)
    }

    /// Raw PBM bytes for this icon, bundled into the binary
    fn asset(self) -> &'static [u8] {
        match self {
            Self::Storm => include_bytes!("../assets/icons/ic_storm.pbm"),
            Self::LightRain => {
                include_bytes!("../assets/icons/ic_light_rain.pbm")
            }
            Self::Rain => include_bytes!("../assets/icons/ic_rain.pbm"),
            Self::Snow => include_bytes!("../assets/icons/ic_snow.pbm"),
            Self::Fog => include_bytes!("../assets/icons/ic_fog.pbm"),
            Self::Clear => include_bytes!("../assets/icons/ic_clear.pbm"),
            Self::LightClouds => {
                include_bytes!("../assets/icons/ic_light_clouds.pbm")
            }
            Self::Cloudy => include_bytes!("../assets/icons/ic_cloudy.pbm"),
        }
    }

    /// Decode the bundled asset at full size
    pub fn bitmap(self) -> anyhow::Result<Bitmap> {
        Bitmap::from_pbm(self.asset())
            .with_context(|| format!("Error decoding icon {self:?}"))
    }
}

/// Load the display-ready icon for a condition code: decoded, then shrunk to
/// 70% of the asset size. Any decode failure just means no icon.
pub fn load_icon(code: i64) -> Option<Bitmap> {
    let icon = WeatherIcon::from_code(code)?;
    match icon.bitmap() {
        Ok(bitmap) => {
            trace!("Loaded icon {icon:?} for weather code {code}");
            Some(bitmap.scale(ICON_SCALE))
        }
        Err(err) => {
            error!("{err:?}");
            None
        }
    }
}

/// A 1-bit image. Set pixels are ink, unset pixels are transparent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    /// Row-major
    pixels: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<bool>) -> Self {
        assert_eq!(
            pixels.len(),
            (width * height) as usize,
            "Pixel count doesn't match bitmap dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode a binary (P4) portable bitmap. Rows are packed MSB-first and
    /// padded to a whole byte; a set bit is black, i.e. ink.
    pub fn from_pbm(bytes: &[u8]) -> anyhow::Result<Self> {
        let (header, data) = split_pbm_header(bytes)?;
        let Some((magic, width, height)) = header.into_iter().collect_tuple()
        else {
            bail!("Malformed PBM header");
        };
        if magic != "P4" {
            bail!("Unsupported PBM format `{magic}`, expected P4");
        }
        let width: u32 = width.parse().context("PBM width")?;
        let height: u32 = height.parse().context("PBM height")?;

        let row_bytes = width.div_ceil(8) as usize;
        let expected = row_bytes * height as usize;
        if data.len() < expected {
            bail!(
                "PBM data too short: expected {expected} bytes, got {}",
                data.len()
            );
        }

        let pixels = data
            .chunks(row_bytes)
            .take(height as usize)
            .flat_map(|row| {
                (0..width as usize)
                    .map(move |x| row[x / 8] & (0x80 >> (x % 8)) != 0)
            })
            .collect();
        Ok(Self::new(width, height, pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Resize by a factor. New dimensions are truncated, not rounded.
    pub fn scale(&self, factor: f32) -> Self {
        let width = (self.width as f32 * factor) as u32;
        let height = (self.height as f32 * factor) as u32;
        let pixels = util::scale_nearest(
            &self.pixels,
            (self.width, self.height),
            (width, height),
        );
        Self::new(width, height, pixels)
    }

    /// Coordinates of every inked pixel, relative to the top-left corner
    pub fn ink(&self) -> impl '_ + Iterator<Item = (u32, u32)> {
        self.pixels.iter().enumerate().filter(|(_, ink)| **ink).map(
            move |(i, _)| (i as u32 % self.width, i as u32 / self.width),
        )
    }
}

/// Split a PBM file into its three header tokens and the raster data.
/// Comments (`#` to end of line) may appear anywhere in the header.
fn split_pbm_header(bytes: &[u8]) -> anyhow::Result<(Vec<&str>, &[u8])> {
    let mut tokens = Vec::with_capacity(3);
    let mut i = 0;
    while tokens.len() < 3 {
        let byte = *bytes
            .get(i)
            .ok_or_else(|| anyhow!("PBM header ended early"))?;
        if byte == b'#' {
            while bytes.get(i).is_some_and(|b| *b != b'\n') {
                i += 1;
            }
        } else if byte.is_ascii_whitespace() {
            i += 1;
        } else {
            let start = i;
            while bytes.get(i).is_some_and(|b| !b.is_ascii_whitespace()) {
                i += 1;
            }
            let token = std::str::from_utf8(&bytes[start..i])
                .context("PBM header is not ASCII")?;
            tokens.push(token);
        }
    }
    // Exactly one whitespace byte separates the header from the raster
    Ok((tokens, bytes.get(i + 1..).unwrap_or_default()))
}
