//! Vaisala CO2 probe driver.
//!
//! The probe sits behind a Silicon Labs USB instrument cable at 19200 8N1.
//! After the link opens, the driver sends the addressed `open <address>`
//! device-select command, runs the identification handshake, and from then
//! on every read is one `send` transaction answered by a `CO2=  <value> ppm`
//! line.

use crate::poller::{PollerConfig, StreamHandle, spawn_poller};
use crate::stream::StreamConfig;
use serde::{Deserialize, Serialize};
use spiro_core::constants::{
    CO2_READ_COMMAND, DEFAULT_READ_TIMEOUT, IDENT_COMMAND, VAISALA_BAUD_RATE,
    VAISALA_DEFAULT_ADDRESS, VAISALA_FIRMWARE_PATTERN, VAISALA_MODEL_PATTERN,
    VAISALA_SERIAL_NUMBER_PATTERN, VAISALA_SIGNATURE,
};
use spiro_core::{Result, SensorError, SensorInfo, SensorKind};
use spiro_link::{
    AnySensorLink, DiscoveryConfig, PortScanner, SensorSession, SerialFraming, SerialLink,
    close_replaced,
};
use spiro_protocol::{Command, IdentPatterns, parse_co2};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Immutable configuration for one CO2 probe instance.
///
/// The defaults reproduce the physical deployment; tests and unusual
/// installations override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Co2ProbeConfig {
    /// How to locate the probe among the OS-visible serial links.
    pub discovery: DiscoveryConfig,

    /// Serial framing (vendor-fixed 19200 8N1).
    pub framing: SerialFraming,

    /// Probe address for the device-select command sent after open.
    pub device_address: u8,

    /// Request token for one CO2 reading.
    pub read_command: String,

    /// Identification query token.
    pub ident_command: String,

    /// Capture pattern for the model field.
    pub model_pattern: String,

    /// Capture pattern for the serial-number field.
    pub serial_number_pattern: String,

    /// Capture pattern for the firmware-version field.
    pub firmware_pattern: String,

    /// Deadline for every blocking line read.
    pub read_timeout: Duration,

    /// Retry pacing for the polling loop.
    pub poller: PollerConfig,

    /// Measurement channel capacity and overflow policy.
    pub stream: StreamConfig,
}

impl Default for Co2ProbeConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::for_signature(VAISALA_SIGNATURE),
            framing: SerialFraming::eight_n_one(VAISALA_BAUD_RATE),
            device_address: VAISALA_DEFAULT_ADDRESS,
            read_command: CO2_READ_COMMAND.to_string(),
            ident_command: IDENT_COMMAND.to_string(),
            model_pattern: VAISALA_MODEL_PATTERN.to_string(),
            serial_number_pattern: VAISALA_SERIAL_NUMBER_PATTERN.to_string(),
            firmware_pattern: VAISALA_FIRMWARE_PATTERN.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            poller: PollerConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

/// Driver for the Vaisala CO2 probe.
///
/// # Examples
///
/// ```no_run
/// use spiro_drivers::{Co2Probe, Co2ProbeConfig};
///
/// # async fn example() -> spiro_core::Result<()> {
/// let probe = Co2Probe::new(Co2ProbeConfig::default())?;
/// probe.connect().await?;
/// println!("connected to {}", probe.info().await.unwrap_or_default());
///
/// let mut stream = probe.start();
/// while let Some(ppm) = stream.recv().await {
///     println!("CO2: {ppm} ppm");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Co2Probe {
    config: Co2ProbeConfig,
    scanner: PortScanner,
    ident_patterns: IdentPatterns,
    ident_command: Command,
    read_command: Command,
    session: Arc<Mutex<Option<SensorSession>>>,
}

impl Co2Probe {
    /// Validate the configuration and build the driver.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] for an invalid discovery signature or
    /// identification pattern, and [`SensorError::Protocol`] for an invalid
    /// command token.
    pub fn new(config: Co2ProbeConfig) -> Result<Self> {
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

    /// Locate the probe, open the serial link, and run the select and
    /// identification handshakes.
    ///
    /// Any existing session is closed first; a teardown failure is logged
    /// and does not abort the new attempt. The locator is re-resolved on
    /// every call.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Discovery`] when no probe is found,
    /// [`SensorError::Connection`] when the link cannot be opened or the
    /// select command fails, and [`SensorError::Handshake`] when the
    /// identification I/O fails.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        close_replaced(&mut guard).await;

        let port = self.scanner.discover().await?;
        let link = SerialLink::open(&port, self.config.framing, self.config.read_timeout).await?;

        let mut session = SensorSession::new(AnySensorLink::Serial(link));
        self.initialize(&mut session).await?;
        *guard = Some(session);
        Ok(())
    }

    /// Attach an already-open link instead of discovering one.
    ///
    /// Runs the same select and identification handshakes as
    /// [`connect`](Self::connect). Used with the mock transport for tests
    /// and development without hardware.
    pub async fn attach_link(&self, link: AnySensorLink) -> Result<()> {
        let mut guard = self.session.lock().await;
        close_replaced(&mut guard).await;

        let mut session = SensorSession::new(link);
        self.initialize(&mut session).await?;
        *guard = Some(session);
        Ok(())
    }

    async fn initialize(&self, session: &mut SensorSession) -> Result<()> {
        let select = Command::new(format!("open {}", self.config.device_address))?;
        session.send_command(&select).await?;
        session
            .identify(&self.ident_command, &self.ident_patterns)
            .await
    }

    /// Identification metadata of the current session, if connected.
    pub async fn info(&self) -> Option<SensorInfo> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.info().clone())
    }

    /// One locked CO2 read transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Closed`] when not connected,
    /// [`SensorError::Connection`]/[`SensorError::Timeout`] on link I/O
    /// failure, and [`SensorError::Protocol`] when the response does not
    /// parse.
    pub async fn read_co2(&self) -> Result<f64> {
        read_once(&self.session, &self.read_command).await
    }

    /// Start the continuous measurement stream.
    ///
    /// The returned handle owns the polling task; failed reads are retried
    /// forever at the configured interval and surface through the handle's
    /// health channel.
    pub fn start(&self) -> StreamHandle<f64> {
        let session = self.session.clone();
        let read_command = self.read_command.clone();

        spawn_poller(
            SensorKind::Co2,
            self.config.poller,
            self.config.stream,
            move || {
                let session = session.clone();
                let read_command = read_command.clone();
                async move { read_once(&session, &read_command).await }
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

/// One locked read transaction parsed as a CO2 concentration.
async fn read_once(session: &Arc<Mutex<Option<SensorSession>>>, command: &Command) -> Result<f64> {
    let mut guard = session.lock().await;
    let session = guard
        .as_mut()
        .ok_or_else(|| SensorError::closed("CO2 probe is not connected"))?;
    let line = session.transact(command).await?;
    parse_co2(&line)
}
