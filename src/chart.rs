//! Chart configuration and rendering.
//!
//! - [`spec`]: validate a user's [`ChartRequest`] against a table and produce a [`ChartSpec`]
//! - [`render`]: the rendering collaborator that turns a spec into a PNG

pub mod render;
pub mod spec;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SpecError;

pub use render::{ChartImage, ChartRenderer, LegendEntry, PngChartRenderer};
pub use spec::{ChartFields, ChartRequest, ChartSpec, Discarded, Resolution, resolve};

/// The closed set of supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Pie,
}

impl ChartKind {
    pub const ALL: [Self; 4] = [Self::Line, Self::Bar, Self::Scatter, Self::Pie];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Scatter => "scatter",
            Self::Pie => "pie",
        }
    }

    /// Title-case name used for default chart titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Bar => "Bar",
            Self::Scatter => "Scatter",
            Self::Pie => "Pie",
        }
    }

    /// How many y series the kind can draw.
    pub fn accepts_multiple_series(self) -> bool {
        match self {
            Self::Line | Self::Bar => true,
            Self::Scatter | Self::Pie => false,
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "scatter" => Ok(Self::Scatter),
            "pie" => Ok(Self::Pie),
            _ => Err(SpecError::UnknownKind(s.to_owned())),
        }
    }
}

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

/// Series colors used when the user does not pick one, and for extra series.
pub const PALETTE: [Rgb; 8] = [
    Rgb([0x1f, 0x77, 0xb4]),
    Rgb([0xff, 0x7f, 0x0e]),
    Rgb([0x2c, 0xa0, 0x2c]),
    Rgb([0xd6, 0x27, 0x28]),
    Rgb([0x94, 0x67, 0xbd]),
    Rgb([0x8c, 0x56, 0x4b]),
    Rgb([0xe3, 0x77, 0xc2]),
    Rgb([0x7f, 0x7f, 0x7f]),
];

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", Rgb([0, 0, 0])),
    ("blue", Rgb([0x1f, 0x77, 0xb4])),
    ("orange", Rgb([0xff, 0x7f, 0x0e])),
    ("green", Rgb([0x2c, 0xa0, 0x2c])),
    ("red", Rgb([0xd6, 0x27, 0x28])),
    ("purple", Rgb([0x94, 0x67, 0xbd])),
    ("brown", Rgb([0x8c, 0x56, 0x4b])),
    ("pink", Rgb([0xe3, 0x77, 0xc2])),
    ("gray", Rgb([0x7f, 0x7f, 0x7f])),
    ("grey", Rgb([0x7f, 0x7f, 0x7f])),
];

impl Rgb {
    pub fn hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Palette color for the n-th series, cycling.
    pub fn series(n: usize) -> Self {
        PALETTE.get(n % PALETTE.len()).copied().unwrap_or(Self([0, 0, 0]))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::series(0)
    }
}

impl FromStr for Rgb {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SpecError::InvalidColor(s.to_owned());
        let trimmed = s.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).and_then(|d| u8::try_from(d).ok()))
                .collect::<Option<_>>()
                .ok_or_else(invalid)?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Self([r * 17, g * 17, b * 17])),
                [r1, r2, g1, g2, b1, b2] => Ok(Self([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2])),
                _ => Err(invalid()),
            };
        }

        let lower = trimmed.to_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| *rgb)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}
