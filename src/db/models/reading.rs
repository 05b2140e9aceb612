//! Tool-specific reading payloads and the closed set of tool kinds.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Barometer,
    Magnetometer,
    Ruler,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Barometer, ToolKind::Magnetometer, ToolKind::Ruler];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Barometer => "barometer",
            ToolKind::Magnetometer => "magnetometer",
            ToolKind::Ruler => "ruler",
        }
    }

    /// Child table holding this tool's readings.
    pub fn table(&self) -> &'static str {
        match self {
            ToolKind::Barometer => "Barometers",
            ToolKind::Magnetometer => "Magnetometers",
            ToolKind::Ruler => "Rulers",
        }
    }

    /// Localization key of the toolbar label.
    pub fn label_key(&self) -> &'static str {
        match self {
            ToolKind::Barometer => "text_barometer",
            ToolKind::Magnetometer => "text_magnetometer",
            ToolKind::Ruler => "text_ruler",
        }
    }

    /// Navigation action that carries a finished capture to the finalize step.
    pub fn save_action(&self) -> &'static str {
        match self {
            ToolKind::Barometer => "save_measure_barometer",
            ToolKind::Magnetometer => "save_measure_magnetometer",
            ToolKind::Ruler => "save_measure_ruler",
        }
    }

    pub fn from_save_action(action: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.save_action() == action)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "barometer" => Ok(ToolKind::Barometer),
            "magnetometer" => Ok(ToolKind::Magnetometer),
            "ruler" => Ok(ToolKind::Ruler),
            other => Err(anyhow!("unknown tool '{other}'")),
        }
    }
}

/// The tool-specific payload of a measure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum ToolReading {
    /// Atmospheric pressure in hPa.
    Barometer { pressure: f64 },
    /// Magnetic field components in µT.
    Magnetometer { x: f64, y: f64, z: f64 },
    /// Length in centimetres.
    Ruler { length: f64 },
}

impl ToolReading {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolReading::Barometer { .. } => ToolKind::Barometer,
            ToolReading::Magnetometer { .. } => ToolKind::Magnetometer,
            ToolReading::Ruler { .. } => ToolKind::Ruler,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            ToolReading::Barometer { pressure } if !pressure.is_finite() => {
                Err(format!("pressure {pressure} is not finite"))
            }
            ToolReading::Magnetometer { x, y, z }
                if !(x.is_finite() && y.is_finite() && z.is_finite()) =>
            {
                Err(format!("magnetic field ({x}, {y}, {z}) is not finite"))
            }
            ToolReading::Ruler { length } if !length.is_finite() || length < 0.0 => {
                Err(format!("length {length} must be finite and non-negative"))
            }
            _ => Ok(()),
        }
    }

    /// Read-only text shown to the user before the measure is committed.
    pub fn describe(&self) -> String {
        match self {
            ToolReading::Barometer { pressure } => format!("{pressure:.1} hPa"),
            ToolReading::Magnetometer { x, y, z } => {
                format!("x {x:.2} µT, y {y:.2} µT, z {z:.2} µT")
            }
            ToolReading::Ruler { length } => format!("{length:.1} cm"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_actions_map_back_to_their_tool() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_save_action(kind.save_action()), Some(kind));
        }
        assert_eq!(ToolKind::from_save_action("nav_settings"), None);
    }

    #[test]
    fn tool_names_parse_case_insensitively() {
        assert_eq!("Barometer".parse::<ToolKind>().unwrap(), ToolKind::Barometer);
        assert!("thermometer".parse::<ToolKind>().is_err());
    }

    #[test]
    fn non_finite_readings_are_invalid() {
        assert!(ToolReading::Barometer { pressure: f64::NAN }.validate().is_err());
        assert!(ToolReading::Ruler { length: -1.0 }.validate().is_err());
        assert!(ToolReading::Magnetometer { x: 1.0, y: f64::INFINITY, z: 0.0 }
            .validate()
            .is_err());
        assert!(ToolReading::Barometer { pressure: 1013.2 }.validate().is_ok());
    }

    #[test]
    fn describe_formats_units() {
        assert_eq!(ToolReading::Barometer { pressure: 1013.24 }.describe(), "1013.2 hPa");
        assert_eq!(ToolReading::Ruler { length: 12.5 }.describe(), "12.5 cm");
    }
}
