//! Kurz flow meter driver.
//!
//! The meter sits behind an FTDI USB-serial bridge at 9600 8N1. There is no
//! device-select step: after the link opens the driver goes straight to the
//! identification handshake, and every read is one `x` transaction answered
//! by a whitespace-delimited line whose fourth field is the flow in SCFM.
//!
//! A constant flow override can be configured at construction. When set to
//! a non-zero value it bypasses the physical device entirely: every read
//! returns the override immediately, without taking the session lock or
//! touching the link. With the default `Block` stream policy the resulting
//! stream is still paced by its consumer.

use crate::poller::{PollerConfig, StreamHandle, spawn_poller};
use crate::stream::StreamConfig;
use serde::{Deserialize, Serialize};
use spiro_core::constants::{
    DEFAULT_READ_TIMEOUT, FLOW_READ_COMMAND, IDENT_COMMAND, KURZ_BAUD_RATE,
    KURZ_FIRMWARE_PATTERN, KURZ_MODEL_PATTERN, KURZ_SERIAL_NUMBER_PATTERN, KURZ_SIGNATURE,
};
use spiro_core::{Result, SensorError, SensorInfo, SensorKind};
use spiro_link::{
    AnySensorLink, DiscoveryConfig, PortScanner, SensorSession, SerialFraming, SerialLink,
    close_replaced,
};
use spiro_protocol::{Command, IdentPatterns, parse_flow_rate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Immutable configuration for one flow meter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMeterConfig {
    /// How to locate the meter among the OS-visible serial links.
    pub discovery: DiscoveryConfig,

    /// Serial framing (vendor-fixed 9600 8N1).
    pub framing: SerialFraming,

    /// Request token for one flow-rate reading.
    pub read_command: String,

    /// Identification query token.
    pub ident_command: String,

    /// Capture pattern for the model field.
    pub model_pattern: String,

    /// Capture pattern for the serial-number field.
    pub serial_number_pattern: String,

    /// Capture pattern for the firmware-version field.
    pub firmware_pattern: String,

    /// Constant flow rate in SCFM that bypasses the physical device.
    /// `None` (or an explicit zero at construction) disables the override.
    pub constant_flow_scfm: Option<f64>,

    /// Deadline for every blocking line read.
    pub read_timeout: Duration,

    /// Retry pacing for the polling loop.
    pub poller: PollerConfig,

    /// Measurement channel capacity and overflow policy.
    pub stream: StreamConfig,
}

impl Default for FlowMeterConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::for_signature(KURZ_SIGNATURE),
            framing: SerialFraming::eight_n_one(KURZ_BAUD_RATE),
            read_command: FLOW_READ_COMMAND.to_string(),
            ident_command: IDENT_COMMAND.to_string(),
            model_pattern: KURZ_MODEL_PATTERN.to_string(),
            serial_number_pattern: KURZ_SERIAL_NUMBER_PATTERN.to_string(),
            firmware_pattern: KURZ_FIRMWARE_PATTERN.to_string(),
            constant_flow_scfm: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            poller: PollerConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl FlowMeterConfig {
    /// Set the constant flow override. A zero value means "no override",
    /// matching the convention of the external configuration source.
    pub fn with_constant_flow(mut self, scfm: f64) -> Self {
        self.constant_flow_scfm = (scfm != 0.0).then_some(scfm);
        self
    }
}

/// Driver for the Kurz flow meter.
///
/// # Examples
///
/// ```no_run
/// use spiro_drivers::{FlowMeter, FlowMeterConfig};
///
/// # async fn example() -> spiro_core::Result<()> {
/// let meter = FlowMeter::new(FlowMeterConfig::default())?;
/// meter.connect().await?;
///
/// let mut stream = meter.start();
/// while let Some(scfm) = stream.recv().await {
///     println!("flow: {scfm} SCFM");
/// }
/// # Ok(())
/// # }
/// ```
pub struct FlowMeter {
    config: FlowMeterConfig,
    scanner: PortScanner,
    ident_patterns: IdentPatterns,
    ident_command: Command,
    read_command: Command,
    session: Arc<Mutex<Option<SensorSession>>>,
}

impl FlowMeter {
    /// Validate the configuration and build the driver.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] for an invalid discovery signature or
    /// identification pattern, and [`SensorError::Protocol`] for an invalid
    /// command token.
    pub fn new(config: FlowMeterConfig) -> Result<Self> {
        let scanner = PortScanner::new(config.discovery.clone())?;
        let ident_patterns = IdentPatterns::new(
            &config.model_pattern,
            &config.serial_number_pattern,
            &config.firmware_pattern,
        )?;
        let ident_command = Command::new(config.ident_command.clone())?;
        let read_command = Command::new(config.read_command.clone())?;

        Ok(Self {
            config,
            scanner,
            ident_patterns,
            ident_command,
            read_command,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Locate the meter, open the serial link, and run the identification
    /// handshake.
    ///
    /// Any existing session is closed first; a teardown failure is logged
    /// and does not abort the new attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Discovery`] when no meter is found,
    /// [`SensorError::Connection`] when the link cannot be opened, and
    /// [`SensorError::Handshake`] when the identification I/O fails.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        close_replaced(&mut guard).await;

        let port = self.scanner.discover().await?;
        let link = SerialLink::open(&port, self.config.framing, self.config.read_timeout).await?;

        let mut session = SensorSession::new(AnySensorLink::Serial(link));
        session
            .identify(&self.ident_command, &self.ident_patterns)
            .await?;
        *guard = Some(session);
        Ok(())
    }

    /// Attach an already-open link instead of discovering one.
    pub async fn attach_link(&self, link: AnySensorLink) -> Result<()> {
        let mut guard = self.session.lock().await;
        close_replaced(&mut guard).await;

        let mut session = SensorSession::new(link);
        session
            .identify(&self.ident_command, &self.ident_patterns)
            .await?;
        *guard = Some(session);
        Ok(())
    }

    /// Identification metadata of the current session, if connected.
    pub async fn info(&self) -> Option<SensorInfo> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.info().clone())
    }

    /// One flow-rate reading.
    ///
    /// With a configured override this returns immediately without any
    /// locking or I/O. Otherwise it runs one locked read transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Closed`] when not connected,
    /// [`SensorError::Connection`]/[`SensorError::Timeout`] on link I/O
    /// failure, and [`SensorError::Protocol`] when the response does not
    /// parse.
    pub async fn read_flow_rate(&self) -> Result<f64> {
        if let Some(rate) = self.config.constant_flow_scfm {
            return Ok(rate);
        }
        read_once(&self.session, &self.read_command).await
    }

    /// Start the continuous measurement stream.
    pub fn start(&self) -> StreamHandle<f64> {
        let session = self.session.clone();
        let read_command = self.read_command.clone();
        let override_scfm = self.config.constant_flow_scfm;

        spawn_poller(
            SensorKind::AirFlow,
            self.config.poller,
            self.config.stream,
            move || {
                let session = session.clone();
                let read_command = read_command.clone();
                async move {
                    if let Some(rate) = override_scfm {
                        return Ok(rate);
                    }
                    read_once(&session, &read_command).await
                }
            },
        )
    }

    /// Close the current session, if any.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_mut() {
            session.close().await?;
        }
        *guard = None;
        Ok(())
    }
}

/// One locked read transaction parsed as a flow rate.
async fn read_once(session: &Arc<Mutex<Option<SensorSession>>>, command: &Command) -> Result<f64> {
    let mut guard = session.lock().await;
    let session = guard
        .as_mut()
        .ok_or_else(|| SensorError::closed("flow meter is not connected"))?;
    let line = session.transact(command).await?;
    parse_flow_rate(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiro_link::MockLink;

    #[tokio::test]
    async fn test_attach_identifies_without_select() {
        let meter = FlowMeter::new(FlowMeterConfig::default()).unwrap();
        let (link, handle) = MockLink::new();
        handle
            .push_line("Device:454FTB SNUM:119552 SW version: 2.1.0")
            .unwrap();

        meter.attach_link(AnySensorLink::Mock(link)).await.unwrap();

        assert_eq!(handle.commands(), vec!["?"]);
        let info = meter.info().await.unwrap();
        assert_eq!(info.model.as_deref(), Some("454FTB"));
        assert_eq!(info.firmware_version.as_deref(), Some("2.1.0"));
    }

    #[tokio::test]
    async fn test_read_flow_rate_parses_fourth_field() {
        let meter = FlowMeter::new(FlowMeterConfig::default()).unwrap();
        let (link, handle) = MockLink::new();
        handle.push_line("no ident").unwrap();
        meter.attach_link(AnySensorLink::Mock(link)).await.unwrap();

        handle.push_line("01 72.41 0.00 14.20 SCFM").unwrap();
        assert_eq!(meter.read_flow_rate().await.unwrap(), 14.20);
    }

    #[tokio::test]
    async fn test_short_response_is_protocol_error() {
        let meter = FlowMeter::new(FlowMeterConfig::default()).unwrap();
        let (link, handle) = MockLink::new();
        handle.push_line("no ident").unwrap();
        meter.attach_link(AnySensorLink::Mock(link)).await.unwrap();

        handle.push_line("14.20").unwrap();
        let err = meter.read_flow_rate().await.unwrap_err();
        assert!(matches!(err, SensorError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_override_bypasses_all_io() {
        let config = FlowMeterConfig::default().with_constant_flow(42.5);
        let meter = FlowMeter::new(config).unwrap();

        // Never connected: the override answers anyway, every call.
        assert_eq!(meter.read_flow_rate().await.unwrap(), 42.5);
        assert_eq!(meter.read_flow_rate().await.unwrap(), 42.5);
    }

    #[tokio::test]
    async fn test_override_leaves_attached_link_untouched() {
        let config = FlowMeterConfig::default().with_constant_flow(42.5);
        let meter = FlowMeter::new(config).unwrap();

        let (link, handle) = MockLink::new();
        handle.push_line("no ident").unwrap();
        meter.attach_link(AnySensorLink::Mock(link)).await.unwrap();
        let commands_after_attach = handle.command_count();

        for _ in 0..3 {
            assert_eq!(meter.read_flow_rate().await.unwrap(), 42.5);
        }
        // Zero I/O attempts beyond the handshake.
        assert_eq!(handle.command_count(), commands_after_attach);
    }

    #[tokio::test]
    async fn test_zero_override_means_disabled() {
        let config = FlowMeterConfig::default().with_constant_flow(0.0);
        assert_eq!(config.constant_flow_scfm, None);
    }
}
