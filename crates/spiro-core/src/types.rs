//! Identification and measurement types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of physical instrument a driver fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// CO2 concentration probe (ppm).
    Co2,

    /// Air-flow meter (SCFM).
    AirFlow,

    /// Heart-rate strap (bpm + RR intervals).
    HeartRate,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Co2 => write!(f, "co2"),
            Self::AirFlow => write!(f, "air-flow"),
            Self::HeartRate => write!(f, "heart-rate"),
        }
    }
}

/// Identification metadata extracted from a sensor's free-text response to
/// the identification query.
///
/// Each field is filled independently: a pattern that does not match leaves
/// its field at `None`, and that is not an error. The whole struct is
/// replaced only by a full reconnect.
///
/// # Examples
///
/// ```
/// use spiro_core::SensorInfo;
///
/// let info = SensorInfo::default();
/// assert!(info.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Device model, e.g. `GMP343`.
    pub model: Option<String>,

    /// Vendor serial number.
    pub serial_number: Option<String>,

    /// Firmware version string.
    pub firmware_version: Option<String>,
}

impl SensorInfo {
    /// True when no identification field was extracted.
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.serial_number.is_none() && self.firmware_version.is_none()
    }
}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={} serial={} firmware={}",
            self.model.as_deref().unwrap_or("?"),
            self.serial_number.as_deref().unwrap_or("?"),
            self.firmware_version.as_deref().unwrap_or("?"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_kind_display() {
        assert_eq!(SensorKind::Co2.to_string(), "co2");
        assert_eq!(SensorKind::AirFlow.to_string(), "air-flow");
        assert_eq!(SensorKind::HeartRate.to_string(), "heart-rate");
    }

    #[test]
    fn test_sensor_info_is_empty() {
        let mut info = SensorInfo::default();
        assert!(info.is_empty());

        info.serial_number = Some("R3234317".to_string());
        assert!(!info.is_empty());
    }

    #[test]
    fn test_sensor_info_display_with_gaps() {
        let info = SensorInfo {
            model: Some("GMP343".to_string()),
            serial_number: None,
            firmware_version: Some("6.05".to_string()),
        };
        assert_eq!(info.to_string(), "model=GMP343 serial=? firmware=6.05");
    }

    #[test]
    fn test_sensor_info_serde_roundtrip() {
        let info = SensorInfo {
            model: Some("454FTB".to_string()),
            serial_number: Some("119552".to_string()),
            firmware_version: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: SensorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
