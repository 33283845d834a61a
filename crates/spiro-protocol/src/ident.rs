//! Identification field extraction.
//!
//! The wired instruments answer the identification query with one free-text
//! line whose layout differs per vendor and firmware. Rather than parse it
//! structurally, three independent capture patterns are applied; each field
//! is set only when its pattern matches with a captured group. A miss is not
//! an error, it just leaves the field unset.

use regex::Regex;
use spiro_core::{Result, SensorError, SensorInfo};

/// Compiled capture patterns for the identification response.
///
/// # Examples
///
/// ```
/// use spiro_protocol::IdentPatterns;
///
/// let patterns = IdentPatterns::new(
///     r"Device\s+:\s+(\w+)",
///     r"SNUM\s+:\s+(\w+)",
///     r"SW\s+:\s+(\w+)",
/// ).unwrap();
///
/// let info = patterns.extract("Device : GMP343  SNUM : R3234317  SW : 605");
/// assert_eq!(info.model.as_deref(), Some("GMP343"));
/// assert_eq!(info.serial_number.as_deref(), Some("R3234317"));
/// assert_eq!(info.firmware_version.as_deref(), Some("605"));
/// ```
#[derive(Debug, Clone)]
pub struct IdentPatterns {
    model: Regex,
    serial_number: Regex,
    firmware_version: Regex,
}

impl IdentPatterns {
    /// Compile the three capture patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] when a pattern does not compile.
    pub fn new(model: &str, serial_number: &str, firmware_version: &str) -> Result<Self> {
        Ok(Self {
            model: compile(model)?,
            serial_number: compile(serial_number)?,
            firmware_version: compile(firmware_version)?,
        })
    }

    /// Apply all three patterns to an identification response.
    ///
    /// Fields whose pattern does not match, or matches without a captured
    /// group, stay `None`.
    pub fn extract(&self, response: &str) -> SensorInfo {
        SensorInfo {
            model: capture(&self.model, response),
            serial_number: capture(&self.serial_number, response),
            firmware_version: capture(&self.firmware_version, response),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SensorError::config(format!("invalid identification pattern: {e}")))
}

fn capture(pattern: &Regex, response: &str) -> Option<String> {
    pattern
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
