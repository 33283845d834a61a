//! Serial device discovery.
//!
//! The wired instruments appear as persistent symlinks under
//! `/dev/serial/by-id`. Discovery shells out to a listing command and
//! matches the free-text output against a vendor signature; the listing
//! format is opaque and never parsed structurally, so an upstream format
//! change degrades to a clean `Discovery` error rather than a wrong port.
//!
//! Only the first signature match is used. Multiple same-vendor devices are
//! out of scope; the full listing is logged at trace level so a second
//! device is at least visible when debugging.

use regex::Regex;
use serde::{Deserialize, Serialize};
use spiro_core::constants::{DEV_PORT_TEMPLATE, SERIAL_LISTING_COMMAND};
use spiro_core::{Result, SensorError};
use tokio::process::Command as ProcessCommand;
use tracing::{debug, info, trace};

/// How to locate one vendor's device among the OS-visible serial links.
///
/// # Examples
///
/// ```
/// use spiro_link::DiscoveryConfig;
/// use spiro_core::constants::VAISALA_SIGNATURE;
///
/// let config = DiscoveryConfig::for_signature(VAISALA_SIGNATURE);
/// assert_eq!(config.listing_command, "ls -l /dev/serial/by-id");
/// assert_eq!(config.port_template, "/dev/{}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Shell command whose output enumerates the device symlinks.
    pub listing_command: String,

    /// Regular expression matching the full symlink line for this vendor.
    pub signature: String,

    /// Template the symlink target's final path segment is substituted into
    /// (`{}` placeholder) to build the connectable port path.
    pub port_template: String,
}

impl DiscoveryConfig {
    /// Default listing and port template with a vendor-specific signature.
    pub fn for_signature(signature: impl Into<String>) -> Self {
        Self {
            listing_command: SERIAL_LISTING_COMMAND.to_string(),
            signature: signature.into(),
            port_template: DEV_PORT_TEMPLATE.to_string(),
        }
    }
}

/// Scans the OS device listing for one vendor's serial device.
#[derive(Debug)]
pub struct PortScanner {
    config: DiscoveryConfig,
    signature: Regex,
}

impl PortScanner {
    /// Compile the signature and build a scanner.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] when the signature regex does not
    /// compile.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let signature = Regex::new(&config.signature)
            .map_err(|e| SensorError::config(format!("invalid discovery signature: {e}")))?;
        Ok(Self { config, signature })
    }

    /// Run the listing command and resolve the vendor's port path.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Discovery`] when the listing command cannot be
    /// executed, exits nonzero, or its output contains no resolvable match
    /// for the signature.
    pub async fn discover(&self) -> Result<String> {
        debug!(
            command = %self.config.listing_command,
            signature = %self.config.signature,
            "searching for sensor"
        );

        let output = ProcessCommand::new("sh")
            .arg("-c")
            .arg(&self.config.listing_command)
            .output()
            .await
            .map_err(|e| {
                SensorError::discovery(format!("failed to execute device listing: {e}"))
            })?;

        if !output.status.success() {
            return Err(SensorError::discovery(format!(
                "device listing exited with {}",
                output.status
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        trace!(%listing, "device listing output");

        resolve_port(&listing, &self.signature, &self.config.port_template)
    }
}

/// Resolve a port path from a device listing.
///
/// The first signature match is split on whitespace and its last token taken
/// as the symlink target. Only a token containing a path separator resolves:
/// its final segment is substituted into the port template. A separator-less
/// match is treated identically to no match.
pub fn resolve_port(listing: &str, signature: &Regex, template: &str) -> Result<String> {
    let matched = signature.find(listing).ok_or_else(|| {
        SensorError::discovery(format!(
            "no device matching {:?} in listing",
            signature.as_str()
        ))
    })?;

    let candidate = matched
        .as_str()
        .split_whitespace()
        .last()
        .ok_or_else(|| SensorError::discovery("matched device entry is blank"))?;

    if !candidate.contains('/') {
        return Err(SensorError::discovery(format!(
            "matched device entry has no port path: {candidate:?}"
        )));
    }

    let segment = candidate.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return Err(SensorError::discovery(format!(
            "matched device entry ends in a separator: {candidate:?}"
        )));
    }

    let port = template.replace("{}", segment);
    info!(%port, "sensor found");
    Ok(port)
}
