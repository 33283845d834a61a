//! Polar heart-rate strap driver.
//!
//! The strap is a Bluetooth LE peripheral implementing the standard Heart
//! Rate service. There is no polling loop: the peripheral pushes
//! notification frames at its own cadence. A dedicated drain task consumes
//! the notification stream, decodes each frame, and publishes heart rate
//! and RR intervals as two independent events per notification, so a slow
//! consumer backs up the drain task's bounded channels, never the radio
//! stack's delivery context.

use crate::poller::HealthMonitor;
use crate::stream::{Publisher, StreamConfig, channel};
use btleplug::api::{BDAddr, Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use spiro_core::{Result, SensorError, SensorHealth};
use spiro_protocol::HeartRateFrame;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Heart Rate service UUID (0x180D).
pub const HEART_RATE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);

/// Heart Rate Measurement characteristic UUID (0x2A37).
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Immutable configuration for one heart-rate strap instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateConfig {
    /// Radio address of the strap, e.g. `A0:9E:1A:72:11:6F`.
    pub address: String,

    /// How long to scan for the strap before failing discovery.
    pub scan_timeout: Duration,

    /// Capacity and overflow policy for both measurement channels.
    pub stream: StreamConfig,
}

impl HeartRateConfig {
    /// Configuration for a strap at the given radio address, with default
    /// scan timeout and stream policy.
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            scan_timeout: Duration::from_secs(10),
            stream: StreamConfig::default(),
        }
    }
}

/// Driver for the Polar heart-rate strap.
///
/// # Examples
///
/// ```no_run
/// use spiro_drivers::{HeartRateConfig, HeartRateMonitor};
///
/// # async fn example() -> spiro_core::Result<()> {
/// let monitor = HeartRateMonitor::new(HeartRateConfig::for_address("A0:9E:1A:72:11:6F"))?;
/// let mut stream = monitor.start().await?;
///
/// while let Some(bpm) = stream.recv_heart_rate().await {
///     println!("heart rate: {bpm} bpm");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HeartRateMonitor {
    config: HeartRateConfig,
    address: BDAddr,
}

impl HeartRateMonitor {
    /// Validate the configuration and build the driver.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] when the radio address does not
    /// parse.
    pub fn new(config: HeartRateConfig) -> Result<Self> {
        let address = config.address.parse::<BDAddr>().map_err(|e| {
            SensorError::config(format!("invalid radio address {:?}: {e}", config.address))
        })?;
        Ok(Self { config, address })
    }

    /// Locate the strap, connect, subscribe to heart-rate notifications,
    /// and spawn the drain task.
    ///
    /// The locator is re-resolved by scanning on every call, so a strap
    /// that re-appears after a battery swap is found again.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Discovery`] when the strap is not seen within
    /// the scan timeout, and [`SensorError::Connection`] when connecting,
    /// service discovery, or the subscription fails, including the case
    /// where the heart-rate service or measurement characteristic is
    /// absent.
    pub async fn start(&self) -> Result<HeartRateStream> {
        let peripheral = self.locate_peripheral().await?;

        peripheral.connect().await.map_err(|e| {
            SensorError::connection(format!("failed to connect to heart-rate strap: {e}"))
        })?;
        peripheral.discover_services().await.map_err(|e| {
            SensorError::connection(format!("service discovery failed: {e}"))
        })?;

        if !peripheral
            .services()
            .iter()
            .any(|service| service.uuid == HEART_RATE_SERVICE_UUID)
        {
            return Err(SensorError::connection("heart-rate service not found"));
        }

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == HEART_RATE_MEASUREMENT_UUID)
            .ok_or_else(|| {
                SensorError::connection("heart-rate measurement characteristic not found")
            })?;

        peripheral.subscribe(&characteristic).await.map_err(|e| {
            SensorError::connection(format!("failed to subscribe to notifications: {e}"))
        })?;

        let notifications = peripheral.notifications().await.map_err(|e| {
            SensorError::connection(format!("failed to open notification stream: {e}"))
        })?;
        info!(address = %self.address, "subscribed to heart-rate notifications");

        // Only measurement frames feed the decoder; other characteristics
        // on the same peripheral may notify too.
        let frames = notifications.filter_map(|notification| {
            futures::future::ready(
                (notification.uuid == HEART_RATE_MEASUREMENT_UUID).then_some(notification.value),
            )
        });

        let (bpm_tx, bpm_rx) = channel(self.config.stream);
        let (rr_tx, rr_rx) = channel(self.config.stream);
        let (health, health_rx) = HealthMonitor::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(drain_frames(
            Box::pin(frames),
            bpm_tx,
            rr_tx,
            health,
            shutdown_rx,
        ));

        Ok(HeartRateStream {
            bpm_rx,
            rr_rx,
            health_rx,
            shutdown_tx,
            task,
            peripheral: Some(peripheral),
        })
    }

    /// Scan until the configured address appears, bounded by the scan
    /// timeout.
    async fn locate_peripheral(&self) -> Result<Peripheral> {
        let manager = Manager::new().await.map_err(|e| {
            SensorError::connection(format!("failed to initialize radio stack: {e}"))
        })?;
        let adapters = manager.adapters().await.map_err(|e| {
            SensorError::connection(format!("failed to enumerate radio adapters: {e}"))
        })?;
        let central = adapters
            .into_iter()
            .next()
            .ok_or_else(|| SensorError::connection("no radio adapter available"))?;

        central
            .start_scan(ScanFilter {
                services: vec![HEART_RATE_SERVICE_UUID],
            })
            .await
            .map_err(|e| SensorError::discovery(format!("failed to start scan: {e}")))?;
        debug!(address = %self.address, "scanning for heart-rate strap");

        let found = tokio::time::timeout(self.config.scan_timeout, async {
            loop {
                let peripherals = central.peripherals().await.unwrap_or_default();
                if let Some(peripheral) = peripherals
                    .into_iter()
                    .find(|p| p.address() == self.address)
                {
                    return peripheral;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
        .await;

        if let Err(e) = central.stop_scan().await {
            warn!(error = %e, "failed to stop scan");
        }

        found.map_err(|_| {
            SensorError::discovery(format!(
                "heart-rate strap {} not seen within {:?}",
                self.address, self.config.scan_timeout
            ))
        })
    }
}

/// Handle to one running heart-rate stream.
///
/// Heart rate and RR intervals arrive as two independent streams, mirroring
/// the two publishes per notification. RR items are `Some(intervals)` when
/// the notification carried RR data and `None` when it explicitly did not.
pub struct HeartRateStream {
    bpm_rx: mpsc::Receiver<u8>,
    rr_rx: mpsc::Receiver<Option<Vec<u16>>>,
    health_rx: watch::Receiver<SensorHealth>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    peripheral: Option<Peripheral>,
}

impl HeartRateStream {
    /// Receive the next heart-rate value in bpm.
    pub async fn recv_heart_rate(&mut self) -> Option<u8> {
        self.bpm_rx.recv().await
    }

    /// Receive the next RR-interval event.
    ///
    /// The outer `Option` is stream end; the inner one is the explicit
    /// presence/absence of RR data in that notification.
    pub async fn recv_rr_intervals(&mut self) -> Option<Option<Vec<u16>>> {
        self.rr_rx.recv().await
    }

    /// Snapshot of the strap's last-known health.
    pub fn health(&self) -> SensorHealth {
        self.health_rx.borrow().clone()
    }

    /// A watch receiver for observing health transitions.
    pub fn health_receiver(&self) -> watch::Receiver<SensorHealth> {
        self.health_rx.clone()
    }

    /// Disconnect from the strap, stop the drain task, and wait bounded.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Timeout`] if the drain task did not finish
    /// within the bound; the task is aborted in that case.
    pub async fn stop(mut self, timeout: Duration) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "failed to disconnect heart-rate strap");
            }
        }
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.task.abort();
                Err(SensorError::timeout(timeout.as_millis() as u64))
            }
        }
    }
}

impl Drop for HeartRateStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drain the notification stream: decode each frame and publish heart rate
/// and RR intervals independently.
///
/// Runt frames (length 1 or less) are dropped silently. The task ends when
/// the stream ends (disconnect, recorded as a health failure), the handle
/// stops it, or a consumer goes away.
async fn drain_frames<S>(
    mut frames: S,
    bpm: Publisher<u8>,
    rr: Publisher<Option<Vec<u16>>>,
    health: HealthMonitor,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Stream<Item = Vec<u8>> + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            next = frames.next() => match next {
                Some(buf) => {
                    let Some(frame) = HeartRateFrame::decode(&buf) else {
                        trace!(len = buf.len(), "dropping runt heart-rate notification");
                        continue;
                    };
                    health.record_success();
                    // Publishes can block on stalled consumers; both stay
                    // interruptible by stop.
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        published = async {
                            bpm.publish(frame.bpm).await?;
                            rr.publish(frame.rr_intervals).await
                        } => {
                            if published.is_err() {
                                break;
                            }
                        }
                    }
                }
                None => {
                    let error = SensorError::connection("notification stream ended");
                    warn!(error = %error, "heart-rate strap disconnected");
                    health.record_failure(&error);
                    break;
                }
            },
        }
    }
    debug!("heart-rate drain stopped");
}
